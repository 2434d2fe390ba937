//! Scrape job handlers: start with a live stream, re-subscribe, status, results.

use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use gridscout_core::{JobStatus, ResultRecord};
use gridscout_db::JobRecord;
use gridscout_pipeline::{message_stream, ProgressMessage, ScrapeRequest, StartedJob};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::middleware::RequestId;

use super::{
    map_db_error, map_job_error, storage_not_configured, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct JobStatusData {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: ProgressData,
    pub cost: Decimal,
    pub total_results: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct ProgressData {
    pub current: i64,
    pub total: i64,
    pub percentage: i64,
    pub current_brand: Option<String>,
    pub brand_index: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct JobView {
    pub job_id: String,
    pub status: JobStatus,
    pub total_operations: i64,
    pub completed_operations: i64,
    pub total_results: i64,
    pub error_message: Option<String>,
    pub key_fingerprint: String,
    pub request: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct JobResultsData {
    pub job: JobView,
    pub results: Vec<ResultRecord>,
    pub total_cost: Decimal,
}

impl From<&JobRecord> for JobStatusData {
    fn from(job: &JobRecord) -> Self {
        Self {
            job_id: job.job_id.clone(),
            status: job.status,
            progress: ProgressData {
                current: job.completed_operations,
                total: job.total_operations,
                percentage: job.percentage(),
                current_brand: job.current_brand.clone(),
                brand_index: job.current_brand_index,
            },
            cost: job.total_cost,
            total_results: job.total_results,
            updated_at: job.updated_at,
        }
    }
}

impl From<JobRecord> for JobView {
    fn from(job: JobRecord) -> Self {
        Self {
            job_id: job.job_id,
            status: job.status,
            total_operations: job.total_operations,
            completed_operations: job.completed_operations,
            total_results: job.total_results,
            error_message: job.error_message,
            key_fingerprint: job.key_fingerprint,
            request: job.request_meta,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Live streams
// ---------------------------------------------------------------------------

/// Server-sent events for one job, ending after its terminal message.
///
/// Dropping the response (client disconnect) only drops this subscription.
fn event_stream(
    rx: broadcast::Receiver<ProgressMessage>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = message_stream(rx)
        .map(|message| Event::default().event(message.kind()).json_data(&message));
    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

pub(in crate::api) async fn start_scrape(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<ScrapeRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let StartedJob {
        job_id, receiver, ..
    } = state
        .orchestrator
        .start(request)
        .map_err(|e| map_job_error(req_id.0.clone(), &e))?;

    tracing::info!(job_id = %job_id, request_id = %req_id.0, "scrape job accepted");
    Ok(event_stream(receiver))
}

pub(in crate::api) async fn job_events(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let receiver = state.orchestrator.hub().subscribe(&job_id).ok_or_else(|| {
        ApiError::new(
            req_id.0,
            "not_found",
            format!("job {job_id} is not running; query its status or results instead"),
        )
    })?;
    Ok(event_stream(receiver))
}

// ---------------------------------------------------------------------------
// Stored sessions
// ---------------------------------------------------------------------------

async fn load_job(state: &AppState, req_id: &str, job_id: &str) -> Result<JobRecord, ApiError> {
    let store = state.store().ok_or_else(|| storage_not_configured(req_id))?;
    store
        .get_job(job_id)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?
        .ok_or_else(|| ApiError::new(req_id, "not_found", format!("job {job_id} not found")))
}

pub(in crate::api) async fn job_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<String>,
) -> Result<Json<ApiResponse<JobStatusData>>, ApiError> {
    let job = load_job(&state, &req_id.0, &job_id).await?;

    Ok(Json(ApiResponse {
        data: JobStatusData::from(&job),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(in crate::api) async fn job_results(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<String>,
) -> Result<Json<ApiResponse<JobResultsData>>, ApiError> {
    let job = load_job(&state, &req_id.0, &job_id).await?;
    let store = state
        .store()
        .ok_or_else(|| storage_not_configured(req_id.0.clone()))?;
    let results = store
        .list_results(&job_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: JobResultsData {
            total_cost: job.total_cost,
            job: JobView::from(job),
            results,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
