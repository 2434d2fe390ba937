use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gridscout_core::JobStatus;
use gridscout_db::{DbError, JobRecord, MemorySessionStore, NewJob};

use super::*;

/// Delegates to an in-memory store but rejects every result batch.
struct RejectingResults {
    inner: MemorySessionStore,
}

#[async_trait]
impl SessionStore for RejectingResults {
    fn backend(&self) -> &'static str {
        "rejecting"
    }

    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn create_job(&self, job: &NewJob) -> Result<(), DbError> {
        self.inner.create_job(job).await
    }

    async fn update_progress(&self, job_id: &str, progress: &JobProgress) -> Result<(), DbError> {
        self.inner.update_progress(job_id, progress).await
    }

    async fn append_results(&self, _job_id: &str, _results: &[ResultRecord]) -> Result<u64, DbError> {
        Err(DbError::NotConfigured)
    }

    async fn complete_job(&self, job_id: &str, progress: &JobProgress) -> Result<(), DbError> {
        self.inner.complete_job(job_id, progress).await
    }

    async fn fail_job(
        &self,
        job_id: &str,
        progress: &JobProgress,
        error_message: &str,
    ) -> Result<(), DbError> {
        self.inner.fail_job(job_id, progress, error_message).await
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, DbError> {
        self.inner.get_job(job_id).await
    }

    async fn list_results(&self, job_id: &str) -> Result<Vec<ResultRecord>, DbError> {
        self.inner.list_results(job_id).await
    }

    async fn purge_expired(&self, older_than: DateTime<Utc>) -> Result<u64, DbError> {
        self.inner.purge_expired(older_than).await
    }
}

fn record(place_id: &str) -> ResultRecord {
    ResultRecord {
        job_id: "job-1".to_owned(),
        search_brand: "Amul".to_owned(),
        search_sku: String::new(),
        search_category: String::new(),
        gmaps_category: None,
        name: "Amul Parlour".to_owned(),
        address: None,
        latitude: None,
        longitude: None,
        business_status: None,
        place_url: format!("https://www.google.com/maps/place/?q=place_id:{place_id}"),
        place_id: place_id.to_owned(),
        is_brand_match: true,
    }
}

fn progress(completed: i64) -> JobProgress {
    JobProgress {
        completed_operations: completed,
        total_operations: 2,
        current_brand: Some("Amul".to_owned()),
        current_brand_index: 0,
        total_cost: Decimal::new(34, 3),
        total_results: 2,
    }
}

async fn created(store: &dyn SessionStore) {
    store
        .create_job(&NewJob {
            job_id: "job-1".to_owned(),
            total_operations: 2,
            key_fingerprint: "abcdef123456".to_owned(),
            request_meta: serde_json::json!({}),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn results_are_streamed_immediately_and_persisted_on_flush() {
    let hub = Arc::new(ProgressHub::default());
    let store = Arc::new(MemorySessionStore::new());
    created(store.as_ref()).await;
    let mut rx = hub.open("job-1");

    let mut reporter = ProgressReporter::new("job-1", Arc::clone(&hub), Some(store.clone()));
    reporter.result(record("p2"));
    reporter.result(record("p1"));

    assert!(matches!(rx.try_recv().unwrap(), ProgressMessage::Result { .. }));
    assert!(matches!(rx.try_recv().unwrap(), ProgressMessage::Result { .. }));
    assert!(store.list_results("job-1").await.unwrap().is_empty());

    reporter.flush_results().await;
    let ids: Vec<String> = store
        .list_results("job-1")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.place_id)
        .collect();
    assert_eq!(ids, vec!["p2", "p1"]);
}

#[tokio::test]
async fn failed_batch_is_dropped_and_job_still_completes() {
    let hub = Arc::new(ProgressHub::default());
    let store = Arc::new(RejectingResults {
        inner: MemorySessionStore::new(),
    });
    created(store.as_ref()).await;
    let mut rx = hub.open("job-1");

    let mut reporter = ProgressReporter::new("job-1", Arc::clone(&hub), Some(store.clone()));
    reporter.result(record("p1"));
    reporter.result(record("p2"));
    reporter.complete(&progress(2), 2).await;

    assert_eq!(reporter.dropped_results(), 2);
    let job = store.get_job("job-1").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Complete);

    let kinds: Vec<&str> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|m| m.kind())
        .collect();
    assert_eq!(kinds, vec!["result", "result", "complete"]);
}

#[tokio::test]
async fn point_report_updates_store_and_stream() {
    let hub = Arc::new(ProgressHub::default());
    let store = Arc::new(MemorySessionStore::new());
    created(store.as_ref()).await;
    let mut rx = hub.open("job-1");

    let reporter = ProgressReporter::new("job-1", Arc::clone(&hub), Some(store.clone()));
    reporter
        .point_done(PointReport {
            progress: &progress(1),
            brand: "Amul",
            brand_index: 0,
            total_brands: 1,
            point_index: 0,
            total_points: 2,
            point: GridPoint { lat: 28.4, lng: 77.0 },
        })
        .await;

    match rx.try_recv().unwrap() {
        ProgressMessage::Progress {
            current,
            total,
            percentage,
            current_brand,
            message,
            ..
        } => {
            assert_eq!((current, total, percentage), (1, 2, 50));
            assert_eq!(current_brand, "Amul");
            assert_eq!(message, "Searching Amul (1/1) at point 1/2");
        }
        other => panic!("expected progress, got {other:?}"),
    }

    let job = store.get_job("job-1").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::InProgress);
    assert_eq!(job.completed_operations, 1);
}

#[tokio::test]
async fn without_store_messages_still_flow() {
    let hub = Arc::new(ProgressHub::default());
    let mut rx = hub.open("job-1");

    let mut reporter = ProgressReporter::new("job-1", Arc::clone(&hub), None);
    reporter.start(2);
    reporter.result(record("p1"));
    reporter.fail(&progress(1), "provider quota exceeded").await;

    let kinds: Vec<&str> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|m| m.kind())
        .collect();
    assert_eq!(kinds, vec!["start", "result", "error"]);
    assert!(!hub.is_live("job-1"));
    assert_eq!(reporter.dropped_results(), 0);
}
