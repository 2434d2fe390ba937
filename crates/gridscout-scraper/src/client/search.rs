//! Paginated search for one grid point and keyword.

use gridscout_core::GridPoint;

use crate::error::PlacesError;
use crate::retry::retry_with_backoff;
use crate::types::RawPlace;

use super::{PlacesClient, MAX_PAGES};

/// How a single point's search ended.
///
/// Only `QuotaExceeded` should stop a job; `Partial` means the point was
/// abandoned after keeping what earlier pages returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Complete,
    Partial { reason: String },
    QuotaExceeded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    /// Places in provider order, page by page.
    pub places: Vec<RawPlace>,
    /// Every HTTP attempt made, retries included.
    pub api_call_count: u32,
    pub outcome: FetchOutcome,
}

impl PlacesClient {
    /// Searches around `point` for `keyword`, following continuation tokens.
    ///
    /// After a page carrying a continuation token the client waits the
    /// configured settle delay before requesting the next page; the provider
    /// rejects tokens used too early.
    ///
    /// Never returns an error: failures are folded into [`FetchOutcome`] so the
    /// caller's continue/abort decision is a match on the outcome.
    pub async fn fetch_places(
        &self,
        point: GridPoint,
        keyword: &str,
        radius_m: u32,
        api_key: &str,
    ) -> FetchResult {
        let mut places: Vec<RawPlace> = Vec::new();
        let mut api_call_count = 0u32;
        let mut page_token: Option<String> = None;
        let mut page_count = 0usize;

        loop {
            page_count += 1;
            if page_count > MAX_PAGES {
                tracing::warn!(
                    lat = point.lat,
                    lng = point.lng,
                    keyword,
                    max_pages = MAX_PAGES,
                    "page limit reached, keeping collected places"
                );
                return FetchResult {
                    places,
                    api_call_count,
                    outcome: FetchOutcome::Partial {
                        reason: format!("page limit of {MAX_PAGES} reached"),
                    },
                };
            }

            let url = match page_token.as_deref() {
                None => self.nearby_url(point, keyword, radius_m, api_key),
                Some(token) => self.next_page_url(token, api_key),
            };
            let url = match url {
                Ok(url) => url,
                Err(err) => {
                    return FetchResult {
                        places,
                        api_call_count,
                        outcome: FetchOutcome::Partial {
                            reason: err.to_string(),
                        },
                    }
                }
            };

            let attempted = retry_with_backoff(self.retry, || self.request_page(&url)).await;
            api_call_count = api_call_count.saturating_add(attempted.attempts);

            let page = match attempted.result {
                Ok(page) => page,
                Err(PlacesError::QuotaExceeded { attempts }) => {
                    tracing::error!(
                        lat = point.lat,
                        lng = point.lng,
                        keyword,
                        attempts,
                        "provider quota exhausted"
                    );
                    return FetchResult {
                        places,
                        api_call_count,
                        outcome: FetchOutcome::QuotaExceeded,
                    };
                }
                Err(err) => {
                    tracing::warn!(
                        lat = point.lat,
                        lng = point.lng,
                        keyword,
                        page = page_count,
                        error = %err,
                        "search page failed, keeping collected places"
                    );
                    return FetchResult {
                        places,
                        api_call_count,
                        outcome: FetchOutcome::Partial {
                            reason: err.to_string(),
                        },
                    };
                }
            };

            places.extend(page.results);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => {
                    tokio::time::sleep(self.page_settle_delay).await;
                    page_token = Some(token);
                }
                None => {
                    return FetchResult {
                        places,
                        api_call_count,
                        outcome: FetchOutcome::Complete,
                    }
                }
            }
        }
    }
}
