//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! session retention purge.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use gridscout_db::SessionStore;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Daily at 03:30 UTC.
const PURGE_SCHEDULE: &str = "0 30 3 * * *";

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    store: Option<Arc<dyn SessionStore>>,
    config: Arc<gridscout_core::AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    match store {
        Some(store) => {
            register_purge_job(&scheduler, store, config.session_retention_hours).await?;
        }
        None => tracing::info!("scheduler: storage disabled; retention purge not registered"),
    }

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_purge_job(
    scheduler: &JobScheduler,
    store: Arc<dyn SessionStore>,
    retention_hours: u64,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(PURGE_SCHEDULE, move |_uuid, _lock| {
        let store = Arc::clone(&store);
        Box::pin(async move {
            tracing::info!(retention_hours, "scheduler: starting session purge");
            if let Some(purged) = purge_expired_sessions(store.as_ref(), retention_hours).await {
                tracing::info!(purged, "scheduler: session purge complete");
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Deletes sessions last touched more than `retention_hours` ago.
///
/// Returns `None` if the store rejected the purge; the failure is logged.
pub(crate) async fn purge_expired_sessions(
    store: &dyn SessionStore,
    retention_hours: u64,
) -> Option<u64> {
    let hours = i64::try_from(retention_hours).unwrap_or(i64::MAX);
    let cutoff = ChronoDuration::try_hours(hours)
        .and_then(|age| Utc::now().checked_sub_signed(age))
        .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

    match store.purge_expired(cutoff).await {
        Ok(purged) => Some(purged),
        Err(e) => {
            tracing::error!(error = %e, backend = store.backend(), "scheduler: session purge failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridscout_db::{MemorySessionStore, NewJob};

    async fn seed(store: &MemorySessionStore, job_id: &str) {
        store
            .create_job(&NewJob {
                job_id: job_id.to_owned(),
                total_operations: 1,
                key_fingerprint: "abcdef123456".to_owned(),
                request_meta: serde_json::json!({}),
            })
            .await
            .expect("create job");
    }

    #[tokio::test]
    async fn purge_keeps_sessions_inside_retention_window() {
        let store = MemorySessionStore::new();
        seed(&store, "fresh").await;

        let purged = purge_expired_sessions(&store, 72).await;
        assert_eq!(purged, Some(0));
        assert!(store.get_job("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn zero_retention_purges_everything_older_than_now() {
        let store = MemorySessionStore::new();
        seed(&store, "old").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let purged = purge_expired_sessions(&store, 0).await;
        assert_eq!(purged, Some(1));
        assert!(store.get_job("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn huge_retention_does_not_overflow() {
        let store = MemorySessionStore::new();
        seed(&store, "kept").await;
        assert_eq!(purge_expired_sessions(&store, u64::MAX).await, Some(0));
    }
}
