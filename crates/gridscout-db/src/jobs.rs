//! Job session types shared by every [`SessionStore`](crate::SessionStore)
//! implementation.

use chrono::{DateTime, Utc};
use gridscout_core::JobStatus;
use rust_decimal::Decimal;
use serde::Serialize;

/// Input for [`SessionStore::create_job`](crate::SessionStore::create_job).
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub job_id: String,
    pub total_operations: i64,
    /// Short SHA-256 prefix of the provider key. The key itself is never stored.
    pub key_fingerprint: String,
    /// Request parameters kept for later interpretation of the results
    /// (bounds, spacing, dedup scope, brand names).
    pub request_meta: serde_json::Value,
}

/// Snapshot of a running job's counters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobProgress {
    pub completed_operations: i64,
    pub total_operations: i64,
    pub current_brand: Option<String>,
    pub current_brand_index: i64,
    pub total_cost: Decimal,
    pub total_results: i64,
}

/// A stored job session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub job_id: String,
    pub status: JobStatus,
    pub total_operations: i64,
    pub completed_operations: i64,
    pub current_brand: Option<String>,
    pub current_brand_index: i64,
    pub total_cost: Decimal,
    pub total_results: i64,
    pub error_message: Option<String>,
    pub key_fingerprint: String,
    pub request_meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Completion percentage rounded down, 0 when there is nothing to do.
    #[must_use]
    pub fn percentage(&self) -> i64 {
        if self.total_operations <= 0 {
            return 0;
        }
        (self.completed_operations.saturating_mul(100) / self.total_operations).clamp(0, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(completed: i64, total: i64) -> JobRecord {
        let now = Utc::now();
        JobRecord {
            job_id: "job-1".to_owned(),
            status: JobStatus::InProgress,
            total_operations: total,
            completed_operations: completed,
            current_brand: Some("Amul".to_owned()),
            current_brand_index: 0,
            total_cost: Decimal::ZERO,
            total_results: 0,
            error_message: None,
            key_fingerprint: "abcdef123456".to_owned(),
            request_meta: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn percentage_rounds_down() {
        assert_eq!(record(1, 3).percentage(), 33);
        assert_eq!(record(40, 40).percentage(), 100);
    }

    #[test]
    fn percentage_of_empty_job_is_zero() {
        assert_eq!(record(0, 0).percentage(), 0);
    }
}
