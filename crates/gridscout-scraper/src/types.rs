//! Wire types for the places Nearby Search endpoint.

use serde::{Deserialize, Serialize};

/// One page of a Nearby Search response.
#[derive(Debug, Clone, Deserialize)]
pub struct NearbySearchResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<RawPlace>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// A place as returned by the provider. Only `name` is guaranteed; records
/// without a `place_id` are dropped before they become results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPlace {
    #[serde(default)]
    pub place_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub vicinity: Option<String>,
    #[serde(default)]
    pub formatted_address: Option<String>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    /// Ordered; the first entry is treated as the primary category.
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub business_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Provider status strings that count as a successful page.
pub(crate) fn is_success_status(status: &str) -> bool {
    matches!(status, "OK" | "ZERO_RESULTS")
}

pub(crate) fn is_rate_limit_status(status: &str) -> bool {
    status == "OVER_QUERY_LIMIT"
}
