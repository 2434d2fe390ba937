use std::net::SocketAddr;

use rust_decimal::Decimal;

use crate::records::DedupScope;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Where job sessions and results are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// Process-wide store with time-boxed retention; lost on restart.
    Memory,
    /// Live streaming only. Status and results queries are unavailable.
    None,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Postgres => write!(f, "postgres"),
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::None => write!(f, "none"),
        }
    }
}

/// Knobs consumed by the grid-search pipeline for a single job run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeSettings {
    pub places_base_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Total attempts per page request, the first one included.
    pub max_retries: u32,
    /// Backoff unit: failed attempt n waits `backoff_base_ms * 2^n`.
    pub backoff_base_ms: u64,
    /// Provider-mandated wait before a continuation token becomes valid.
    pub page_settle_delay_ms: u64,
    pub inter_request_delay_ms: u64,
    pub grid_spacing_km: f64,
    /// Jobs whose grid would exceed this many points are rejected up front.
    pub max_grid_points: usize,
    pub search_radius_m: u32,
    pub cost_per_call: Decimal,
    pub cost_ceiling: Decimal,
    pub dedup_scope: DedupScope,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            places_base_url: "https://maps.googleapis.com/maps/api/place/".to_string(),
            request_timeout_secs: 10,
            user_agent: "gridscout/0.1 (brand-presence)".to_string(),
            max_retries: 3,
            backoff_base_ms: 1_000,
            page_settle_delay_ms: 2_000,
            inter_request_delay_ms: 100,
            grid_spacing_km: 10.0,
            max_grid_points: 10_000,
            search_radius_m: 5_000,
            cost_per_call: Decimal::new(17, 3),
            cost_ceiling: Decimal::new(20_000, 0),
            dedup_scope: DedupScope::Job,
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub session_retention_hours: u64,
    pub scrape: ScrapeSettings,
}

impl AppConfig {
    #[must_use]
    pub fn scrape_settings(&self) -> ScrapeSettings {
        self.scrape.clone()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("storage", &self.storage)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("session_retention_hours", &self.session_retention_hours)
            .field("scrape", &self.scrape)
            .finish()
    }
}
