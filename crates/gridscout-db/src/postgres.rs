//! Postgres-backed session store for the `scrape_jobs` and `job_results` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gridscout_core::{JobStatus, ResultRecord};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::jobs::{JobProgress, JobRecord, NewJob};
use crate::store::SessionStore;
use crate::DbError;

const JOB_COLUMNS: &str = "job_id, status, total_operations, completed_operations, \
     current_brand, current_brand_index, total_cost, total_results, error_message, \
     key_fingerprint, request_meta, created_at, updated_at";

const OPEN_STATUSES: &str = "starting or in_progress";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `scrape_jobs` table. `status` is parsed on conversion.
#[derive(Debug, Clone, sqlx::FromRow)]
struct JobRow {
    job_id: String,
    status: String,
    total_operations: i64,
    completed_operations: i64,
    current_brand: Option<String>,
    current_brand_index: i64,
    total_cost: Decimal,
    total_results: i64,
    error_message: Option<String>,
    key_fingerprint: String,
    request_meta: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = DbError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<JobStatus>()
            .map_err(|_| DbError::InvalidStatus(row.status.clone()))?;
        Ok(JobRecord {
            job_id: row.job_id,
            status,
            total_operations: row.total_operations,
            completed_operations: row.completed_operations,
            current_brand: row.current_brand,
            current_brand_index: row.current_brand_index,
            total_cost: row.total_cost,
            total_results: row.total_results,
            error_message: row.error_message,
            key_fingerprint: row.key_fingerprint,
            request_meta: row.request_meta,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row from the `job_results` table, without `seq` and `created_at`.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ResultRow {
    job_id: String,
    search_brand: String,
    search_sku: String,
    search_category: String,
    gmaps_category: Option<String>,
    name: String,
    address: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    business_status: Option<String>,
    place_url: String,
    place_id: String,
    is_brand_match: bool,
}

impl From<ResultRow> for ResultRecord {
    fn from(row: ResultRow) -> Self {
        ResultRecord {
            job_id: row.job_id,
            search_brand: row.search_brand,
            search_sku: row.search_sku,
            search_category: row.search_category,
            gmaps_category: row.gmaps_category,
            name: row.name,
            address: row.address,
            latitude: row.latitude,
            longitude: row.longitude,
            business_status: row.business_status,
            place_url: row.place_url,
            place_id: row.place_id,
            is_brand_match: row.is_brand_match,
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Resolves a zero-row status update into the right error: the job is
    /// either missing or already terminal.
    async fn transition_error(&self, job_id: &str, target: &'static str) -> DbError {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM scrape_jobs WHERE job_id = $1)",
        )
        .bind(job_id)
        .fetch_one(&self.pool)
        .await;

        match exists {
            Ok(true) => DbError::InvalidTransition {
                job_id: job_id.to_owned(),
                target,
                expected: OPEN_STATUSES,
            },
            Ok(false) => DbError::NotFound,
            Err(e) => DbError::Sqlx(e),
        }
    }

    /// Writes counters and `status` for a job that is still open.
    async fn write_status(
        &self,
        job_id: &str,
        status: JobStatus,
        progress: &JobProgress,
        error_message: Option<&str>,
    ) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE scrape_jobs SET \
                 status = $2, \
                 completed_operations = $3, \
                 total_operations = $4, \
                 current_brand = $5, \
                 current_brand_index = $6, \
                 total_cost = $7, \
                 total_results = $8, \
                 error_message = COALESCE($9, error_message), \
                 updated_at = NOW() \
             WHERE job_id = $1 AND status IN ('starting', 'in_progress')",
        )
        .bind(job_id)
        .bind(status.as_str())
        .bind(progress.completed_operations)
        .bind(progress.total_operations)
        .bind(progress.current_brand.as_deref())
        .bind(progress.current_brand_index)
        .bind(progress.total_cost)
        .bind(progress.total_results)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.transition_error(job_id, status.as_str()).await);
        }
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl SessionStore for PgSessionStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), DbError> {
        crate::health_check(&self.pool).await
    }

    async fn create_job(&self, job: &NewJob) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO scrape_jobs (job_id, status, total_operations, key_fingerprint, request_meta) \
             VALUES ($1, 'starting', $2, $3, $4)",
        )
        .bind(&job.job_id)
        .bind(job.total_operations)
        .bind(&job.key_fingerprint)
        .bind(&job.request_meta)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::DuplicateJob(job.job_id.clone())
            } else {
                DbError::Sqlx(e)
            }
        })?;

        Ok(())
    }

    async fn update_progress(&self, job_id: &str, progress: &JobProgress) -> Result<(), DbError> {
        self.write_status(job_id, JobStatus::InProgress, progress, None)
            .await
    }

    /// Uses a single `INSERT … SELECT FROM UNNEST(…) WITH ORDINALITY` so the
    /// batch lands in one round-trip and `seq` follows the slice order.
    async fn append_results(&self, job_id: &str, results: &[ResultRecord]) -> Result<u64, DbError> {
        if results.is_empty() {
            return Ok(0);
        }

        // Collect each column into a parallel Vec for UNNEST binding.
        let mut brands: Vec<String> = Vec::with_capacity(results.len());
        let mut skus: Vec<String> = Vec::with_capacity(results.len());
        let mut categories: Vec<String> = Vec::with_capacity(results.len());
        let mut gmaps_categories: Vec<Option<String>> = Vec::with_capacity(results.len());
        let mut names: Vec<String> = Vec::with_capacity(results.len());
        let mut addresses: Vec<Option<String>> = Vec::with_capacity(results.len());
        let mut latitudes: Vec<Option<f64>> = Vec::with_capacity(results.len());
        let mut longitudes: Vec<Option<f64>> = Vec::with_capacity(results.len());
        let mut statuses: Vec<Option<String>> = Vec::with_capacity(results.len());
        let mut urls: Vec<String> = Vec::with_capacity(results.len());
        let mut place_ids: Vec<String> = Vec::with_capacity(results.len());
        let mut matches: Vec<bool> = Vec::with_capacity(results.len());

        for r in results {
            brands.push(r.search_brand.clone());
            skus.push(r.search_sku.clone());
            categories.push(r.search_category.clone());
            gmaps_categories.push(r.gmaps_category.clone());
            names.push(r.name.clone());
            addresses.push(r.address.clone());
            latitudes.push(r.latitude);
            longitudes.push(r.longitude);
            statuses.push(r.business_status.clone());
            urls.push(r.place_url.clone());
            place_ids.push(r.place_id.clone());
            matches.push(r.is_brand_match);
        }

        let result = sqlx::query(
            "INSERT INTO job_results \
                 (job_id, search_brand, search_sku, search_category, gmaps_category, name, \
                  address, latitude, longitude, business_status, place_url, place_id, is_brand_match) \
             SELECT $1, t.search_brand, t.search_sku, t.search_category, t.gmaps_category, t.name, \
                    t.address, t.latitude, t.longitude, t.business_status, t.place_url, t.place_id, \
                    t.is_brand_match \
             FROM UNNEST(\
                  $2::text[], $3::text[], $4::text[], $5::text[], $6::text[], $7::text[], \
                  $8::float8[], $9::float8[], $10::text[], $11::text[], $12::text[], $13::bool[]) \
                  WITH ORDINALITY AS t(search_brand, search_sku, search_category, gmaps_category, \
                       name, address, latitude, longitude, business_status, place_url, place_id, \
                       is_brand_match, ord) \
             ORDER BY t.ord \
             ON CONFLICT (job_id, place_id, search_brand) DO NOTHING",
        )
        .bind(job_id)
        .bind(&brands)
        .bind(&skus)
        .bind(&categories)
        .bind(&gmaps_categories)
        .bind(&names)
        .bind(&addresses)
        .bind(&latitudes)
        .bind(&longitudes)
        .bind(&statuses)
        .bind(&urls)
        .bind(&place_ids)
        .bind(&matches)
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE scrape_jobs SET updated_at = NOW() WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn complete_job(&self, job_id: &str, progress: &JobProgress) -> Result<(), DbError> {
        self.write_status(job_id, JobStatus::Complete, progress, None)
            .await
    }

    async fn fail_job(
        &self,
        job_id: &str,
        progress: &JobProgress,
        error_message: &str,
    ) -> Result<(), DbError> {
        self.write_status(job_id, JobStatus::Failed, progress, Some(error_message))
            .await
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, DbError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM scrape_jobs WHERE job_id = $1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(JobRecord::try_from).transpose()
    }

    async fn list_results(&self, job_id: &str) -> Result<Vec<ResultRecord>, DbError> {
        let rows = sqlx::query_as::<_, ResultRow>(
            "SELECT job_id, search_brand, search_sku, search_category, gmaps_category, name, \
                    address, latitude, longitude, business_status, place_url, place_id, \
                    is_brand_match \
             FROM job_results \
             WHERE job_id = $1 \
             ORDER BY seq",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ResultRecord::from).collect())
    }

    async fn purge_expired(&self, older_than: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM scrape_jobs WHERE updated_at < $1")
            .bind(older_than)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
