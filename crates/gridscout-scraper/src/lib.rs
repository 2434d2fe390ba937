pub mod client;
pub mod cost;
pub mod dedup;
pub mod error;
pub mod grid;
pub mod normalize;
pub mod retry;
pub mod types;

pub use client::{FetchOutcome, FetchResult, KeyRejection, KeyValidation, PlacesClient};
pub use cost::CostTracker;
pub use dedup::Deduplicator;
pub use error::PlacesError;
pub use grid::{generate_grid, GridError, KM_PER_LAT_DEGREE, KM_PER_LNG_DEGREE_AT_EQUATOR};
pub use normalize::{key_fingerprint, place_url, to_result_record};
pub use retry::RetryPolicy;
pub use types::{Geometry, LatLng, NearbySearchResponse, RawPlace};
