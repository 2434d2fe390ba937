//! Drives one scrape job: brands × grid points, strictly one call at a time.

use std::sync::Arc;
use std::time::Duration;

use gridscout_core::{
    validate_brands, BoundingBox, BrandQuery, GridPoint, JobStatus, ScrapeSettings,
};
use gridscout_db::{JobProgress, NewJob, SessionStore};
use gridscout_scraper::{
    generate_grid, key_fingerprint, to_result_record, CostTracker, Deduplicator, FetchOutcome,
    PlacesClient, PlacesError,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::JobError;
use crate::hub::ProgressHub;
use crate::messages::ProgressMessage;
use crate::reporter::{PointReport, ProgressReporter};

const MAX_JOB_ID_LEN: usize = 128;

/// Inbound job request.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequest {
    pub brands: Vec<BrandQuery>,
    pub city_bounds: BoundingBox,
    /// `[lat, lng]`; only the latitude affects the grid.
    pub city_center: [f64; 2],
    pub api_key: String,
    pub job_id: String,
}

impl std::fmt::Debug for ScrapeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrapeRequest")
            .field("brands", &self.brands)
            .field("city_bounds", &self.city_bounds)
            .field("city_center", &self.city_center)
            .field("api_key", &"[redacted]")
            .field("job_id", &self.job_id)
            .finish()
    }
}

impl ScrapeRequest {
    /// Checks everything that can be rejected before any work starts.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidRequest`] describing the first problem found.
    pub fn validate(&self) -> Result<(), JobError> {
        validate_brands(&self.brands).map_err(|e| JobError::InvalidRequest(e.to_string()))?;

        if !self.city_bounds.is_valid() {
            return Err(JobError::InvalidRequest(
                "cityBounds must have min_lat <= max_lat and min_lng <= max_lng, \
                 with latitudes in [-90, 90] and longitudes in [-180, 180]"
                    .to_owned(),
            ));
        }
        let [lat, lng] = self.city_center;
        if !(GridPoint { lat, lng }).is_valid() {
            return Err(JobError::InvalidRequest(
                "cityCenter must be [lat, lng] within coordinate range".to_owned(),
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(JobError::InvalidRequest("apiKey must not be empty".to_owned()));
        }

        let id = self.job_id.as_str();
        let id_ok = !id.is_empty()
            && id.len() <= MAX_JOB_ID_LEN
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !id_ok {
            return Err(JobError::InvalidRequest(format!(
                "jobId must be 1-{MAX_JOB_ID_LEN} characters of [A-Za-z0-9._-]"
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn center_lat(&self) -> f64 {
        self.city_center[0]
    }
}

/// A job accepted by [`JobOrchestrator::start`].
#[derive(Debug)]
pub struct StartedJob {
    pub job_id: String,
    /// Subscribed before the job began, so it sees every message.
    pub receiver: broadcast::Receiver<ProgressMessage>,
    pub handle: JoinHandle<Result<JobSummary, JobError>>,
}

/// Final counters of a finished job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSummary {
    pub job_id: String,
    pub status: JobStatus,
    pub total_operations: u64,
    pub completed_operations: u64,
    pub total_results: u64,
    pub api_calls: u64,
    pub total_cost: Decimal,
}

/// Runs scrape jobs against one provider client and one session store.
///
/// Cheap to clone; every job gets its own [`Deduplicator`] and
/// [`CostTracker`].
#[derive(Clone)]
pub struct JobOrchestrator {
    client: PlacesClient,
    settings: ScrapeSettings,
    store: Option<Arc<dyn SessionStore>>,
    hub: Arc<ProgressHub>,
}

impl JobOrchestrator {
    #[must_use]
    pub fn new(
        client: PlacesClient,
        settings: ScrapeSettings,
        store: Option<Arc<dyn SessionStore>>,
        hub: Arc<ProgressHub>,
    ) -> Self {
        Self {
            client,
            settings,
            store,
            hub,
        }
    }

    /// Builds the provider client from `settings` as well.
    ///
    /// # Errors
    ///
    /// Returns [`PlacesError`] if the HTTP client cannot be constructed.
    pub fn from_settings(
        settings: ScrapeSettings,
        store: Option<Arc<dyn SessionStore>>,
        hub: Arc<ProgressHub>,
    ) -> Result<Self, PlacesError> {
        let client = PlacesClient::new(&settings)?;
        Ok(Self::new(client, settings, store, hub))
    }

    #[must_use]
    pub fn hub(&self) -> &Arc<ProgressHub> {
        &self.hub
    }

    #[must_use]
    pub fn client(&self) -> &PlacesClient {
        &self.client
    }

    #[must_use]
    pub fn store(&self) -> Option<&Arc<dyn SessionStore>> {
        self.store.as_ref()
    }

    /// Grid for `request` under the configured spacing and point limit.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidRequest`] when the grid cannot be built or
    /// would exceed `max_grid_points`.
    pub fn plan_grid(&self, request: &ScrapeRequest) -> Result<Vec<GridPoint>, JobError> {
        generate_grid(
            &request.city_bounds,
            self.settings.grid_spacing_km,
            request.center_lat(),
            self.settings.max_grid_points,
        )
        .map_err(|e| JobError::InvalidRequest(e.to_string()))
    }

    /// Validates `request`, subscribes to its progress, and runs it on its
    /// own task so the job outlives whoever started it.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidRequest`] for a malformed request or an
    /// oversized grid, and
    /// [`JobError::AlreadyRunning`] if a job with the same id is live.
    pub fn start(&self, request: ScrapeRequest) -> Result<StartedJob, JobError> {
        request.validate()?;
        self.plan_grid(&request)?;
        let receiver = self
            .hub
            .open_new(&request.job_id)
            .ok_or_else(|| JobError::AlreadyRunning(request.job_id.clone()))?;
        let job_id = request.job_id.clone();
        let handle = self.spawn(request);
        Ok(StartedJob {
            job_id,
            receiver,
            handle,
        })
    }

    /// If the job task panics the job is marked failed and listeners get a
    /// terminal `error`.
    fn spawn(&self, request: ScrapeRequest) -> JoinHandle<Result<JobSummary, JobError>> {
        let this = self.clone();
        let job_id = request.job_id.clone();
        let inner = tokio::spawn({
            let this = this.clone();
            async move { this.run(request).await }
        });

        tokio::spawn(async move {
            match inner.await {
                Ok(result) => result,
                Err(join_err) => {
                    tracing::error!(job_id = %job_id, error = %join_err, "scrape job task aborted");
                    let message = "internal error: job task aborted";
                    this.abandon(&job_id, message).await;
                    Err(JobError::Aborted(message.to_owned()))
                }
            }
        })
    }

    /// Marks a job failed after its run loop died without reaching a
    /// terminal state.
    async fn abandon(&self, job_id: &str, message: &str) {
        if let Some(store) = &self.store {
            let progress = match store.get_job(job_id).await {
                Ok(Some(job)) => JobProgress {
                    completed_operations: job.completed_operations,
                    total_operations: job.total_operations,
                    current_brand: job.current_brand,
                    current_brand_index: job.current_brand_index,
                    total_cost: job.total_cost,
                    total_results: job.total_results,
                },
                _ => JobProgress::default(),
            };
            if let Err(e) = store.fail_job(job_id, &progress, message).await {
                tracing::warn!(job_id, error = %e, "could not mark abandoned job failed");
            }
        }
        self.hub.publish(
            job_id,
            ProgressMessage::Error {
                message: message.to_owned(),
            },
        );
    }

    /// Runs one job to a terminal state.
    ///
    /// # Errors
    ///
    /// - [`JobError::InvalidRequest`]: rejected before anything was created.
    /// - [`JobError::JobSetup`]: the job record could not be created.
    /// - [`JobError::QuotaExceeded`] / [`JobError::CostLimitExceeded`]: the
    ///   job was stopped and marked failed.
    #[allow(clippy::too_many_lines)]
    pub async fn run(&self, request: ScrapeRequest) -> Result<JobSummary, JobError> {
        let job_id = request.job_id.clone();
        let mut reporter = ProgressReporter::new(&job_id, Arc::clone(&self.hub), self.store.clone());

        if let Err(e) = request.validate() {
            reporter.setup_failed(&e.to_string());
            return Err(e);
        }

        let grid = match self.plan_grid(&request) {
            Ok(grid) => grid,
            Err(e) => {
                reporter.setup_failed(&e.to_string());
                return Err(e);
            }
        };

        let brand_count = request.brands.len();
        let total_operations = (brand_count * grid.len()) as u64;
        let total_ops_i64 = i64::try_from(total_operations).unwrap_or(i64::MAX);

        if let Some(store) = &self.store {
            let new_job = NewJob {
                job_id: job_id.clone(),
                total_operations: total_ops_i64,
                key_fingerprint: key_fingerprint(&request.api_key),
                request_meta: serde_json::json!({
                    "brands": request.brands.iter().map(|b| &b.brand).collect::<Vec<_>>(),
                    "city_bounds": request.city_bounds,
                    "city_center": request.city_center,
                    "grid_points": grid.len(),
                    "grid_spacing_km": self.settings.grid_spacing_km,
                    "search_radius_m": self.settings.search_radius_m,
                    "dedup_scope": self.settings.dedup_scope,
                }),
            };
            if let Err(e) = store.create_job(&new_job).await {
                tracing::error!(job_id = %job_id, error = %e, "failed to create job record");
                let err = JobError::JobSetup(e);
                reporter.setup_failed(&err.to_string());
                return Err(err);
            }
        }

        reporter.start(total_operations);
        tracing::info!(
            job_id = %job_id,
            brands = brand_count,
            grid_points = grid.len(),
            total_operations,
            dedup_scope = %self.settings.dedup_scope,
            key = %key_fingerprint(&request.api_key),
            "scrape job started"
        );

        let mut dedup = Deduplicator::new(self.settings.dedup_scope);
        let mut cost = CostTracker::new(self.settings.cost_per_call);
        let inter_request_delay = Duration::from_millis(self.settings.inter_request_delay_ms);
        let mut progress = JobProgress {
            total_operations: total_ops_i64,
            ..JobProgress::default()
        };
        let mut total_found = 0u64;

        for (brand_index, brand) in request.brands.iter().enumerate() {
            dedup.begin_brand();
            progress.current_brand = Some(brand.brand.clone());
            progress.current_brand_index = i64::try_from(brand_index).unwrap_or(i64::MAX);

            for (point_index, point) in grid.iter().enumerate() {
                if progress.completed_operations > 0 && !inter_request_delay.is_zero() {
                    tokio::time::sleep(inter_request_delay).await;
                }

                let fetched = self
                    .client
                    .fetch_places(
                        *point,
                        &brand.brand,
                        self.settings.search_radius_m,
                        &request.api_key,
                    )
                    .await;
                progress.completed_operations += 1;

                let total_cost = cost.add_calls(u64::from(fetched.api_call_count));
                progress.total_cost = total_cost;
                reporter.cost_update(total_cost, cost.total_calls());

                if cost.exceeds(self.settings.cost_ceiling) {
                    let err = JobError::CostLimitExceeded {
                        cost: total_cost,
                        ceiling: self.settings.cost_ceiling,
                    };
                    tracing::error!(
                        job_id = %job_id,
                        cost = %total_cost,
                        ceiling = %self.settings.cost_ceiling,
                        api_calls = cost.total_calls(),
                        "cost ceiling exceeded, stopping job"
                    );
                    reporter.fail(&progress, &err.to_string()).await;
                    return Err(err);
                }

                for place in &fetched.places {
                    let Some(record) = to_result_record(&job_id, brand, place) else {
                        tracing::debug!(job_id = %job_id, name = %place.name, "dropping place without place_id");
                        continue;
                    };
                    if !dedup.accept(&record.place_id) {
                        continue;
                    }
                    total_found += 1;
                    reporter.result(record);
                }
                progress.total_results = i64::try_from(total_found).unwrap_or(i64::MAX);

                reporter
                    .point_done(PointReport {
                        progress: &progress,
                        brand: &brand.brand,
                        brand_index,
                        total_brands: brand_count,
                        point_index,
                        total_points: grid.len(),
                        point: *point,
                    })
                    .await;

                match fetched.outcome {
                    FetchOutcome::Complete => {}
                    FetchOutcome::Partial { reason } => {
                        tracing::warn!(
                            job_id = %job_id,
                            brand = %brand.brand,
                            lat = point.lat,
                            lng = point.lng,
                            reason = %reason,
                            "grid point incomplete, continuing"
                        );
                    }
                    FetchOutcome::QuotaExceeded => {
                        let err = JobError::QuotaExceeded;
                        tracing::error!(
                            job_id = %job_id,
                            brand = %brand.brand,
                            api_calls = cost.total_calls(),
                            "provider quota exceeded, stopping job"
                        );
                        reporter.fail(&progress, &err.to_string()).await;
                        return Err(err);
                    }
                }
            }

            reporter.flush_results().await;
        }

        reporter.complete(&progress, total_found).await;
        tracing::info!(
            job_id = %job_id,
            total_found,
            api_calls = cost.total_calls(),
            cost = %cost.cost(),
            dropped_results = reporter.dropped_results(),
            "scrape job complete"
        );

        Ok(JobSummary {
            job_id,
            status: JobStatus::Complete,
            total_operations,
            completed_operations: u64::try_from(progress.completed_operations).unwrap_or(0),
            total_results: total_found,
            api_calls: cost.total_calls(),
            total_cost: cost.cost(),
        })
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
