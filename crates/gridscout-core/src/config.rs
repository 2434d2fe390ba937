use std::net::SocketAddr;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::app_config::{AppConfig, Environment, ScrapeSettings, StorageBackend};
use crate::records::DedupScope;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_as = |var: &str, default: &str| -> Result<String, ConfigError> {
        let raw = or_default(var, default);
        if raw.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "value is empty".to_string(),
            });
        }
        Ok(raw)
    };

    let env = parse_environment(&or_default("GRIDSCOUT_ENV", "development"))?;
    let bind_addr: SocketAddr = parse_value(
        "GRIDSCOUT_BIND_ADDR",
        &parse_as("GRIDSCOUT_BIND_ADDR", "0.0.0.0:3000")?,
    )?;
    let log_level = or_default("GRIDSCOUT_LOG_LEVEL", "info");

    let storage = parse_storage(&or_default("GRIDSCOUT_STORAGE", "postgres"))?;
    let database_url = match storage {
        StorageBackend::Postgres => Some(
            lookup("DATABASE_URL")
                .map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?,
        ),
        StorageBackend::Memory | StorageBackend::None => lookup("DATABASE_URL").ok(),
    };

    let db_max_connections = parse_value(
        "GRIDSCOUT_DB_MAX_CONNECTIONS",
        &or_default("GRIDSCOUT_DB_MAX_CONNECTIONS", "10"),
    )?;
    let db_min_connections = parse_value(
        "GRIDSCOUT_DB_MIN_CONNECTIONS",
        &or_default("GRIDSCOUT_DB_MIN_CONNECTIONS", "1"),
    )?;
    let db_acquire_timeout_secs = parse_value(
        "GRIDSCOUT_DB_ACQUIRE_TIMEOUT_SECS",
        &or_default("GRIDSCOUT_DB_ACQUIRE_TIMEOUT_SECS", "10"),
    )?;
    let session_retention_hours = parse_value(
        "GRIDSCOUT_SESSION_RETENTION_HOURS",
        &or_default("GRIDSCOUT_SESSION_RETENTION_HOURS", "72"),
    )?;

    let defaults = ScrapeSettings::default();

    let places_base_url = parse_as("GRIDSCOUT_PLACES_BASE_URL", &defaults.places_base_url)?;
    let request_timeout_secs: u64 = parse_value(
        "GRIDSCOUT_REQUEST_TIMEOUT_SECS",
        &or_default("GRIDSCOUT_REQUEST_TIMEOUT_SECS", "10"),
    )?;
    let user_agent = or_default("GRIDSCOUT_USER_AGENT", &defaults.user_agent);
    let max_retries = parse_value(
        "GRIDSCOUT_MAX_RETRIES",
        &or_default("GRIDSCOUT_MAX_RETRIES", "3"),
    )?;
    let backoff_base_ms = parse_value(
        "GRIDSCOUT_BACKOFF_BASE_MS",
        &or_default("GRIDSCOUT_BACKOFF_BASE_MS", "1000"),
    )?;
    let page_settle_delay_ms = parse_value(
        "GRIDSCOUT_PAGE_SETTLE_DELAY_MS",
        &or_default("GRIDSCOUT_PAGE_SETTLE_DELAY_MS", "2000"),
    )?;
    let inter_request_delay_ms = parse_value(
        "GRIDSCOUT_INTER_REQUEST_DELAY_MS",
        &or_default("GRIDSCOUT_INTER_REQUEST_DELAY_MS", "100"),
    )?;
    let grid_spacing_km: f64 = parse_value(
        "GRIDSCOUT_GRID_SPACING_KM",
        &or_default("GRIDSCOUT_GRID_SPACING_KM", "10"),
    )?;
    if !grid_spacing_km.is_finite() || grid_spacing_km <= 0.0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "GRIDSCOUT_GRID_SPACING_KM".to_string(),
            reason: "must be a positive number".to_string(),
        });
    }
    let max_grid_points: usize = parse_value(
        "GRIDSCOUT_MAX_GRID_POINTS",
        &or_default("GRIDSCOUT_MAX_GRID_POINTS", "10000"),
    )?;
    if max_grid_points == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "GRIDSCOUT_MAX_GRID_POINTS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let search_radius_m = parse_value(
        "GRIDSCOUT_SEARCH_RADIUS_M",
        &or_default("GRIDSCOUT_SEARCH_RADIUS_M", "5000"),
    )?;
    let cost_per_call: Decimal = parse_value(
        "GRIDSCOUT_COST_PER_CALL",
        &or_default("GRIDSCOUT_COST_PER_CALL", "0.017"),
    )?;
    let cost_ceiling: Decimal = parse_value(
        "GRIDSCOUT_COST_CEILING",
        &or_default("GRIDSCOUT_COST_CEILING", "20000"),
    )?;
    if cost_per_call.is_sign_negative() || cost_ceiling.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar {
            var: "GRIDSCOUT_COST_PER_CALL/GRIDSCOUT_COST_CEILING".to_string(),
            reason: "cost values must not be negative".to_string(),
        });
    }
    let dedup_scope = parse_dedup_scope(&or_default("GRIDSCOUT_DEDUP_SCOPE", "job"))?;

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        storage,
        database_url,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        session_retention_hours,
        scrape: ScrapeSettings {
            places_base_url,
            request_timeout_secs,
            user_agent,
            max_retries,
            backoff_base_ms,
            page_settle_delay_ms,
            inter_request_delay_ms,
            grid_spacing_km,
            max_grid_points,
            search_radius_m,
            cost_per_call,
            cost_ceiling,
            dedup_scope,
        },
    })
}

fn parse_value<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

/// Parse a string into an `Environment` variant.
///
/// Returns an error for unrecognized values so typos in deployment config
/// fail at startup instead of silently running as development.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "GRIDSCOUT_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

fn parse_storage(s: &str) -> Result<StorageBackend, ConfigError> {
    match s {
        "postgres" => Ok(StorageBackend::Postgres),
        "memory" => Ok(StorageBackend::Memory),
        "none" => Ok(StorageBackend::None),
        other => Err(ConfigError::InvalidEnvVar {
            var: "GRIDSCOUT_STORAGE".to_string(),
            reason: format!("expected postgres, memory or none, got '{other}'"),
        }),
    }
}

fn parse_dedup_scope(s: &str) -> Result<DedupScope, ConfigError> {
    s.parse::<DedupScope>()
        .map_err(|reason| ConfigError::InvalidEnvVar {
            var: "GRIDSCOUT_DEDUP_SCOPE".to_string(),
            reason,
        })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
