pub mod app_config;
pub mod brands;
pub mod config;
pub mod geo;
pub mod records;

pub use app_config::{AppConfig, Environment, ScrapeSettings, StorageBackend};
pub use brands::{load_brands, validate_brands, BrandQuery, BrandsFile};
pub use config::{load_app_config, load_app_config_from_env};
pub use geo::{BoundingBox, GridPoint};
pub use records::{DedupScope, JobStatus, ResultRecord};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read brands file {path}: {source}")]
    BrandsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse brands file: {0}")]
    BrandsFileParse(#[from] serde_yaml::Error),

    #[error("brand validation failed: {0}")]
    Validation(String),
}
