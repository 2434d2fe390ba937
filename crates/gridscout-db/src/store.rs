//! The storage contract the pipeline and HTTP layers program against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gridscout_core::ResultRecord;

use crate::jobs::{JobProgress, JobRecord, NewJob};
use crate::DbError;

/// Durable record of job sessions and the results they discovered.
///
/// Every write is scoped to one `job_id`; a job is only ever written by the
/// run that created it, so implementations need no cross-job coordination.
///
/// Status moves `starting -> in_progress -> {complete | failed}`. Terminal
/// jobs reject further status writes with [`DbError::InvalidTransition`].
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Short backend name for health output and logs.
    fn backend(&self) -> &'static str;

    /// Verifies the backend is reachable.
    async fn ping(&self) -> Result<(), DbError>;

    /// Inserts a job in `starting` status.
    ///
    /// Fails with [`DbError::DuplicateJob`] if the id is already taken.
    async fn create_job(&self, job: &NewJob) -> Result<(), DbError>;

    /// Records progress and moves the job to `in_progress`.
    async fn update_progress(&self, job_id: &str, progress: &JobProgress) -> Result<(), DbError>;

    /// Appends results in discovery order. Repeats of
    /// `(job_id, place_id, search_brand)` are ignored.
    ///
    /// Returns the number of rows actually added.
    async fn append_results(&self, job_id: &str, results: &[ResultRecord]) -> Result<u64, DbError>;

    async fn complete_job(&self, job_id: &str, progress: &JobProgress) -> Result<(), DbError>;

    async fn fail_job(
        &self,
        job_id: &str,
        progress: &JobProgress,
        error_message: &str,
    ) -> Result<(), DbError>;

    async fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, DbError>;

    /// All results of a job, oldest discovery first.
    async fn list_results(&self, job_id: &str) -> Result<Vec<ResultRecord>, DbError>;

    /// Deletes jobs last updated before `older_than`, with their results.
    ///
    /// Returns the number of jobs removed.
    async fn purge_expired(&self, older_than: DateTime<Utc>) -> Result<u64, DbError>;
}
