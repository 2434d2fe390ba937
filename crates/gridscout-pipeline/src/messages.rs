//! Live progress messages, one JSON object each, tagged by `type`.

use gridscout_core::{GridPoint, ResultRecord};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProgressMessage {
    Start {
        total: u64,
    },
    #[serde(rename_all = "camelCase")]
    Progress {
        current: u64,
        total: u64,
        percentage: u8,
        message: String,
        current_brand: String,
        brand_index: usize,
        total_brands: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        grid_point: Option<GridPoint>,
    },
    #[serde(rename_all = "camelCase")]
    CostUpdate {
        cost: Decimal,
        api_calls: u64,
    },
    Result {
        result: Box<ResultRecord>,
    },
    #[serde(rename_all = "camelCase")]
    Complete {
        job_id: String,
        total_found: u64,
        total_cost: Decimal,
    },
    Error {
        message: String,
    },
}

impl ProgressMessage {
    /// Wire name of the message type, also used as the SSE event name.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressMessage::Start { .. } => "start",
            ProgressMessage::Progress { .. } => "progress",
            ProgressMessage::CostUpdate { .. } => "cost-update",
            ProgressMessage::Result { .. } => "result",
            ProgressMessage::Complete { .. } => "complete",
            ProgressMessage::Error { .. } => "error",
        }
    }

    /// `complete` and `error` end a job's stream; exactly one is sent.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressMessage::Complete { .. } | ProgressMessage::Error { .. }
        )
    }
}

/// Whole-number completion percentage, rounded down and capped at 100.
#[must_use]
pub fn percentage(current: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = current.saturating_mul(100) / total;
    u8::try_from(pct.min(100)).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn progress_serializes_camel_case_with_type_tag() {
        let msg = ProgressMessage::Progress {
            current: 3,
            total: 40,
            percentage: 7,
            message: "Searching Amul (1/2) at point 3/20".to_owned(),
            current_brand: "Amul".to_owned(),
            brand_index: 0,
            total_brands: 2,
            grid_point: Some(GridPoint { lat: 28.4, lng: 77.0 }),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "progress");
        assert_eq!(value["currentBrand"], "Amul");
        assert_eq!(value["brandIndex"], 0);
        assert_eq!(value["totalBrands"], 2);
        assert_eq!(value["gridPoint"], json!({ "lat": 28.4, "lng": 77.0 }));
    }

    #[test]
    fn progress_omits_missing_grid_point() {
        let msg = ProgressMessage::Progress {
            current: 0,
            total: 0,
            percentage: 0,
            message: String::new(),
            current_brand: String::new(),
            brand_index: 0,
            total_brands: 0,
            grid_point: None,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value.get("gridPoint").is_none());
    }

    #[test]
    fn cost_update_uses_kebab_tag_and_exact_cost() {
        let msg = ProgressMessage::CostUpdate {
            cost: Decimal::new(17, 0),
            api_calls: 1000,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "cost-update");
        assert_eq!(value["apiCalls"], 1000);
        assert_eq!(value["cost"], "17");
        assert_eq!(msg.kind(), "cost-update");
    }

    #[test]
    fn complete_carries_job_totals() {
        let msg = ProgressMessage::Complete {
            job_id: "job-1".to_owned(),
            total_found: 12,
            total_cost: Decimal::new(68, 2),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({ "type": "complete", "jobId": "job-1", "totalFound": 12, "totalCost": "0.68" })
        );
        assert!(msg.is_terminal());
    }

    #[test]
    fn only_complete_and_error_are_terminal() {
        assert!(ProgressMessage::Error {
            message: "boom".to_owned()
        }
        .is_terminal());
        assert!(!ProgressMessage::Start { total: 1 }.is_terminal());
    }

    #[test]
    fn percentage_rounds_down_and_handles_empty_jobs() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(40, 40), 100);
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(50, 40), 100);
    }
}
