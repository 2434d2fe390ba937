use axum::{extract::State, http::StatusCode, Extension, Json};
use gridscout_scraper::{KeyRejection, KeyValidation};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{ApiResponse, AppState, ResponseMeta};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct ValidateKeyRequest {
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct KeyValidationData {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<KeyRejection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One provider call with the submitted key; 400 with a reason if rejected.
pub(in crate::api) async fn validate_key(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ValidateKeyRequest>,
) -> (StatusCode, Json<ApiResponse<KeyValidationData>>) {
    let (status, data) = match state.orchestrator.client().validate_key(&body.api_key).await {
        KeyValidation::Valid => (
            StatusCode::OK,
            KeyValidationData {
                valid: true,
                reason: None,
                message: None,
            },
        ),
        KeyValidation::Invalid { reason, message } => (
            StatusCode::BAD_REQUEST,
            KeyValidationData {
                valid: false,
                reason: Some(reason),
                message: Some(message),
            },
        ),
    };

    (
        status,
        Json(ApiResponse {
            data,
            meta: ResponseMeta::new(req_id.0),
        }),
    )
}
