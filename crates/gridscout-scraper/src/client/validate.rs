//! Single-call credential check.

use gridscout_core::GridPoint;
use serde::Serialize;

use crate::error::PlacesError;

use super::PlacesClient;

/// Why a key was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRejection {
    InvalidOrNotEnabled,
    QuotaExceeded,
    TransientFailure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyValidation {
    Valid,
    Invalid {
        reason: KeyRejection,
        message: String,
    },
}

impl KeyValidation {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, KeyValidation::Valid)
    }
}

impl PlacesClient {
    /// Makes one minimal search with `api_key` and classifies the answer.
    ///
    /// Not retried: a rate limit here is reported as `QuotaExceeded` rather
    /// than waited out.
    pub async fn validate_key(&self, api_key: &str) -> KeyValidation {
        if api_key.trim().is_empty() {
            return KeyValidation::Invalid {
                reason: KeyRejection::InvalidOrNotEnabled,
                message: "API key is empty".to_owned(),
            };
        }

        let probe = GridPoint { lat: 0.0, lng: 0.0 };
        let result = match self.nearby_url(probe, "store", 1, api_key) {
            Ok(url) => self.request_page(&url).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(_) => KeyValidation::Valid,
            Err(err) => {
                let reason = classify_rejection(&err);
                tracing::info!(?reason, error = %err, "API key validation failed");
                KeyValidation::Invalid {
                    reason,
                    message: err.to_string(),
                }
            }
        }
    }
}

fn classify_rejection(err: &PlacesError) -> KeyRejection {
    match err {
        PlacesError::RateLimited { .. } | PlacesError::QuotaExceeded { .. } => {
            KeyRejection::QuotaExceeded
        }
        PlacesError::ProviderStatus { status, .. }
            if status == "REQUEST_DENIED" || status == "INVALID_REQUEST" =>
        {
            KeyRejection::InvalidOrNotEnabled
        }
        PlacesError::UnexpectedStatus { status } if *status == 401 || *status == 403 => {
            KeyRejection::InvalidOrNotEnabled
        }
        _ => KeyRejection::TransientFailure,
    }
}
