//! In-process session store.
//!
//! Holds every job in one map behind an async `RwLock`. Entries live until
//! [`SessionStore::purge_expired`] removes them, so a retention sweep must run
//! for long-lived processes (the server schedules one).

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gridscout_core::{JobStatus, ResultRecord};
use tokio::sync::RwLock;

use crate::jobs::{JobProgress, JobRecord, NewJob};
use crate::store::SessionStore;
use crate::DbError;

#[derive(Debug)]
struct Session {
    job: JobRecord,
    results: Vec<ResultRecord>,
    /// `(place_id, search_brand)` pairs already stored.
    keys: HashSet<(String, String)>,
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently held.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

fn apply_progress(job: &mut JobRecord, progress: &JobProgress) {
    job.completed_operations = progress.completed_operations;
    job.total_operations = progress.total_operations;
    job.current_brand.clone_from(&progress.current_brand);
    job.current_brand_index = progress.current_brand_index;
    job.total_cost = progress.total_cost;
    job.total_results = progress.total_results;
    job.updated_at = Utc::now();
}

fn ensure_open(job: &JobRecord, target: &'static str) -> Result<(), DbError> {
    if job.status.is_terminal() {
        return Err(DbError::InvalidTransition {
            job_id: job.job_id.clone(),
            target,
            expected: "starting or in_progress",
        });
    }
    Ok(())
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn create_job(&self, job: &NewJob) -> Result<(), DbError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&job.job_id) {
            return Err(DbError::DuplicateJob(job.job_id.clone()));
        }

        let now = Utc::now();
        sessions.insert(
            job.job_id.clone(),
            Session {
                job: JobRecord {
                    job_id: job.job_id.clone(),
                    status: JobStatus::Starting,
                    total_operations: job.total_operations,
                    completed_operations: 0,
                    current_brand: None,
                    current_brand_index: 0,
                    total_cost: rust_decimal::Decimal::ZERO,
                    total_results: 0,
                    error_message: None,
                    key_fingerprint: job.key_fingerprint.clone(),
                    request_meta: job.request_meta.clone(),
                    created_at: now,
                    updated_at: now,
                },
                results: Vec::new(),
                keys: HashSet::new(),
            },
        );
        Ok(())
    }

    async fn update_progress(&self, job_id: &str, progress: &JobProgress) -> Result<(), DbError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(job_id).ok_or(DbError::NotFound)?;
        ensure_open(&session.job, "in_progress")?;
        apply_progress(&mut session.job, progress);
        session.job.status = JobStatus::InProgress;
        Ok(())
    }

    async fn append_results(&self, job_id: &str, results: &[ResultRecord]) -> Result<u64, DbError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(job_id).ok_or(DbError::NotFound)?;

        let mut added = 0u64;
        for record in results {
            let key = (record.place_id.clone(), record.search_brand.clone());
            if session.keys.insert(key) {
                session.results.push(record.clone());
                added += 1;
            }
        }
        session.job.updated_at = Utc::now();
        Ok(added)
    }

    async fn complete_job(&self, job_id: &str, progress: &JobProgress) -> Result<(), DbError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(job_id).ok_or(DbError::NotFound)?;
        ensure_open(&session.job, "complete")?;
        apply_progress(&mut session.job, progress);
        session.job.status = JobStatus::Complete;
        Ok(())
    }

    async fn fail_job(
        &self,
        job_id: &str,
        progress: &JobProgress,
        error_message: &str,
    ) -> Result<(), DbError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(job_id).ok_or(DbError::NotFound)?;
        ensure_open(&session.job, "failed")?;
        apply_progress(&mut session.job, progress);
        session.job.status = JobStatus::Failed;
        session.job.error_message = Some(error_message.to_owned());
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, DbError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(job_id).map(|s| s.job.clone()))
    }

    async fn list_results(&self, job_id: &str) -> Result<Vec<ResultRecord>, DbError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(job_id)
            .map(|s| s.results.clone())
            .unwrap_or_default())
    }

    async fn purge_expired(&self, older_than: DateTime<Utc>) -> Result<u64, DbError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.job.updated_at >= older_than);
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
