//! HTTP client for the places Nearby Search endpoint.

mod search;
mod validate;

use std::time::Duration;

use gridscout_core::{GridPoint, ScrapeSettings};
use reqwest::{Client, Url};

use crate::error::PlacesError;
use crate::retry::RetryPolicy;
use crate::types::{is_rate_limit_status, is_success_status, NearbySearchResponse};

pub use search::{FetchOutcome, FetchResult};
pub use validate::{KeyRejection, KeyValidation};

/// Upper bound on pages requested for one grid point. The provider stops
/// issuing continuation tokens after three pages; this guards against a
/// token that keeps cycling.
pub(super) const MAX_PAGES: usize = 5;

/// Client for the places provider.
///
/// Each call is bounded by a per-request timeout. Rate limiting and transport
/// failures are retried per [`RetryPolicy`]; provider error statuses are not.
#[derive(Debug, Clone)]
pub struct PlacesClient {
    pub(super) client: Client,
    pub(super) base_url: Url,
    pub(super) retry: RetryPolicy,
    pub(super) page_settle_delay: Duration,
}

impl PlacesClient {
    /// Builds a client from the pipeline settings.
    ///
    /// # Errors
    ///
    /// Returns [`PlacesError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`PlacesError::InvalidBaseUrl`] if the
    /// configured base URL does not parse.
    pub fn new(settings: &ScrapeSettings) -> Result<Self, PlacesError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .connect_timeout(Duration::from_secs(settings.request_timeout_secs.min(10)))
            .user_agent(&settings.user_agent)
            .build()?;

        // Exactly one trailing slash so `join` appends instead of replacing
        // the last path segment.
        let normalised = format!("{}/", settings.places_base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| PlacesError::InvalidBaseUrl {
            url: settings.places_base_url.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            retry: RetryPolicy {
                max_retries: settings.max_retries,
                backoff_base_ms: settings.backoff_base_ms,
            },
            page_settle_delay: Duration::from_millis(settings.page_settle_delay_ms),
        })
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// URL for the first page of a search around `point`.
    pub(super) fn nearby_url(
        &self,
        point: GridPoint,
        keyword: &str,
        radius_m: u32,
        api_key: &str,
    ) -> Result<Url, PlacesError> {
        let mut url = self.endpoint()?;
        url.query_pairs_mut()
            .append_pair("location", &format!("{},{}", point.lat, point.lng))
            .append_pair("radius", &radius_m.to_string())
            .append_pair("keyword", keyword)
            .append_pair("key", api_key);
        Ok(url)
    }

    /// URL for a continuation page. The provider ignores every other
    /// parameter when `pagetoken` is present.
    pub(super) fn next_page_url(&self, token: &str, api_key: &str) -> Result<Url, PlacesError> {
        let mut url = self.endpoint()?;
        url.query_pairs_mut()
            .append_pair("pagetoken", token)
            .append_pair("key", api_key);
        Ok(url)
    }

    fn endpoint(&self) -> Result<Url, PlacesError> {
        self.base_url
            .join("nearbysearch/json")
            .map_err(|e| PlacesError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }

    /// Issues one HTTP request and maps the response to a page or a typed error.
    ///
    /// # Errors
    ///
    /// - [`PlacesError::RateLimited`]: HTTP 429 or `OVER_QUERY_LIMIT`.
    /// - [`PlacesError::ServerError`]: HTTP 5xx.
    /// - [`PlacesError::UnexpectedStatus`]: any other non-2xx status.
    /// - [`PlacesError::ProviderStatus`]: provider status other than `OK` / `ZERO_RESULTS`.
    /// - [`PlacesError::Http`]: transport failure or timeout.
    /// - [`PlacesError::Deserialize`]: body is not a search response.
    pub(super) async fn request_page(&self, url: &Url) -> Result<NearbySearchResponse, PlacesError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(PlacesError::RateLimited {
                status: "HTTP 429".to_owned(),
            });
        }
        if status.is_server_error() {
            return Err(PlacesError::ServerError {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(PlacesError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let page = serde_json::from_str::<NearbySearchResponse>(&body).map_err(|e| {
            PlacesError::Deserialize {
                context: "nearby search page".to_owned(),
                source: e,
            }
        })?;

        if is_success_status(&page.status) {
            Ok(page)
        } else if is_rate_limit_status(&page.status) {
            Err(PlacesError::RateLimited {
                status: page.status,
            })
        } else {
            Err(PlacesError::ProviderStatus {
                status: page.status,
                message: page.error_message,
            })
        }
    }
}
