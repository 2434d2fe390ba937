//! Fans orchestrator events out to live listeners and the session store.
//!
//! Live messages go out immediately and in order. Results are buffered and
//! written to storage once per brand; a failed write is logged and the
//! batch is dropped. Status writes are best-effort for the same reason: the
//! job itself must keep running while storage is degraded.

use std::sync::Arc;

use gridscout_core::{GridPoint, ResultRecord};
use gridscout_db::{JobProgress, SessionStore};
use rust_decimal::Decimal;

use crate::hub::ProgressHub;
use crate::messages::{percentage, ProgressMessage};

pub struct ProgressReporter {
    job_id: String,
    hub: Arc<ProgressHub>,
    store: Option<Arc<dyn SessionStore>>,
    pending: Vec<ResultRecord>,
    dropped_results: u64,
}

/// One grid point finished.
#[derive(Debug, Clone)]
pub struct PointReport<'a> {
    pub progress: &'a JobProgress,
    pub brand: &'a str,
    pub brand_index: usize,
    pub total_brands: usize,
    pub point_index: usize,
    pub total_points: usize,
    pub point: GridPoint,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(job_id: &str, hub: Arc<ProgressHub>, store: Option<Arc<dyn SessionStore>>) -> Self {
        hub.register(job_id);
        Self {
            job_id: job_id.to_owned(),
            hub,
            store,
            pending: Vec::new(),
            dropped_results: 0,
        }
    }

    /// Results lost to failed batch writes so far.
    #[must_use]
    pub fn dropped_results(&self) -> u64 {
        self.dropped_results
    }

    fn publish(&self, message: ProgressMessage) {
        self.hub.publish(&self.job_id, message);
    }

    pub fn start(&self, total_operations: u64) {
        self.publish(ProgressMessage::Start {
            total: total_operations,
        });
    }

    /// Publishes a progress message and records the counters in storage.
    pub async fn point_done(&self, report: PointReport<'_>) {
        let current = u64::try_from(report.progress.completed_operations).unwrap_or(0);
        let total = u64::try_from(report.progress.total_operations).unwrap_or(0);

        self.publish(ProgressMessage::Progress {
            current,
            total,
            percentage: percentage(current, total),
            message: format!(
                "Searching {} ({}/{}) at point {}/{}",
                report.brand,
                report.brand_index + 1,
                report.total_brands,
                report.point_index + 1,
                report.total_points
            ),
            current_brand: report.brand.to_owned(),
            brand_index: report.brand_index,
            total_brands: report.total_brands,
            grid_point: Some(report.point),
        });

        if let Some(store) = &self.store {
            if let Err(e) = store.update_progress(&self.job_id, report.progress).await {
                tracing::warn!(job_id = %self.job_id, error = %e, "failed to persist job progress");
            }
        }
    }

    pub fn cost_update(&self, cost: Decimal, api_calls: u64) {
        self.publish(ProgressMessage::CostUpdate { cost, api_calls });
    }

    /// Streams `record` and queues it for the next batch write.
    pub fn result(&mut self, record: ResultRecord) {
        self.publish(ProgressMessage::Result {
            result: Box::new(record.clone()),
        });
        self.pending.push(record);
    }

    /// Writes queued results in discovery order.
    pub async fn flush_results(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.pending);

        let Some(store) = &self.store else {
            return;
        };

        match store.append_results(&self.job_id, &batch).await {
            Ok(inserted) => {
                tracing::debug!(
                    job_id = %self.job_id,
                    batch = batch.len(),
                    inserted,
                    "persisted result batch"
                );
            }
            Err(e) => {
                let lost = batch.len() as u64;
                self.dropped_results += lost;
                tracing::error!(
                    job_id = %self.job_id,
                    lost,
                    error = %e,
                    "failed to persist result batch; results dropped"
                );
            }
        }
    }

    /// Flushes, marks the job complete, and sends the terminal `complete`.
    pub async fn complete(&mut self, progress: &JobProgress, total_found: u64) {
        self.flush_results().await;

        if let Some(store) = &self.store {
            if let Err(e) = store.complete_job(&self.job_id, progress).await {
                tracing::error!(job_id = %self.job_id, error = %e, "failed to mark job complete");
            }
        }

        self.publish(ProgressMessage::Complete {
            job_id: self.job_id.clone(),
            total_found,
            total_cost: progress.total_cost,
        });
    }

    /// Flushes, marks the job failed, and sends the terminal `error`.
    pub async fn fail(&mut self, progress: &JobProgress, message: &str) {
        self.flush_results().await;

        if let Some(store) = &self.store {
            if let Err(e) = store.fail_job(&self.job_id, progress, message).await {
                tracing::error!(job_id = %self.job_id, error = %e, "failed to mark job failed");
            }
        }

        self.publish(ProgressMessage::Error {
            message: message.to_owned(),
        });
    }

    /// Sends the terminal `error` for a job whose record was never created.
    pub fn setup_failed(&mut self, message: &str) {
        self.pending.clear();
        self.publish(ProgressMessage::Error {
            message: message.to_owned(),
        });
    }
}

#[cfg(test)]
#[path = "reporter_test.rs"]
mod tests;
