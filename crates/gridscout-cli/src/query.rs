//! Read-only session queries and retention purge.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use gridscout_core::{AppConfig, ResultRecord, StorageBackend};
use gridscout_db::{JobRecord, SessionStore};

/// Status and results only exist across processes with Postgres storage.
async fn persistent_store(config: &AppConfig) -> anyhow::Result<Arc<dyn SessionStore>> {
    if config.storage != StorageBackend::Postgres {
        anyhow::bail!(
            "GRIDSCOUT_STORAGE={} keeps no sessions between runs; use postgres",
            config.storage
        );
    }
    gridscout_db::open_session_store(config)
        .await?
        .ok_or_else(|| anyhow::anyhow!("session storage is not configured"))
}

async fn load_job(store: &dyn SessionStore, job_id: &str) -> anyhow::Result<JobRecord> {
    store
        .get_job(job_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("job '{job_id}' not found"))
}

pub(crate) fn format_status(job: &JobRecord) -> Vec<String> {
    let mut lines = vec![
        format!("Job: {}", job.job_id),
        format!("Status: {}", job.status),
        format!(
            "Progress: {}/{} ({}%)",
            job.completed_operations,
            job.total_operations,
            job.percentage()
        ),
        format!(
            "Brand: {} (index {})",
            job.current_brand.as_deref().unwrap_or("\u{2014}"),
            job.current_brand_index
        ),
        format!("Results: {}", job.total_results),
        format!("Cost: {}", job.total_cost),
        format!("Updated: {}", job.updated_at.format("%Y-%m-%d %H:%M:%S UTC")),
    ];
    if let Some(error) = &job.error_message {
        lines.push(format!("Error: {error}"));
    }
    lines
}

/// # Errors
///
/// Returns an error if storage is unavailable or the job is unknown.
pub(crate) async fn run_status(config: &AppConfig, job_id: &str) -> anyhow::Result<()> {
    let store = persistent_store(config).await?;
    let job = load_job(store.as_ref(), job_id).await?;
    for line in format_status(&job) {
        println!("{line}");
    }
    Ok(())
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() > max {
        format!("{}...", value.chars().take(max).collect::<String>())
    } else {
        value.to_string()
    }
}

pub(crate) fn format_result_row(record: &ResultRecord) -> String {
    format!(
        "{:<16}{:<36}{:<44}{}",
        truncate(&record.search_brand, 14),
        truncate(&record.name, 34),
        truncate(record.address.as_deref().unwrap_or("\u{2014}"), 40),
        record.place_id
    )
}

/// # Errors
///
/// Returns an error if storage is unavailable or the job is unknown.
pub(crate) async fn run_results(config: &AppConfig, job_id: &str, json: bool) -> anyhow::Result<()> {
    let store = persistent_store(config).await?;
    let job = load_job(store.as_ref(), job_id).await?;
    let results = store.list_results(job_id).await?;

    if json {
        let body = serde_json::json!({
            "job": job,
            "results": results,
            "totalCost": job.total_cost,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("job '{job_id}' ({}) has no results", job.status);
        return Ok(());
    }

    println!("{:<16}{:<36}{:<44}PLACE ID", "BRAND", "NAME", "ADDRESS");
    for record in &results {
        println!("{}", format_result_row(record));
    }
    println!();
    println!(
        "{} results, status {}, cost {}",
        results.len(),
        job.status,
        job.total_cost
    );
    Ok(())
}

/// # Errors
///
/// Returns an error if storage is unavailable or the delete fails.
pub(crate) async fn run_purge(config: &AppConfig, older_than_hours: u64) -> anyhow::Result<()> {
    let store = persistent_store(config).await?;
    let hours = i64::try_from(older_than_hours).unwrap_or(i64::MAX);
    let Some(cutoff) = ChronoDuration::try_hours(hours).and_then(|age| Utc::now().checked_sub_signed(age))
    else {
        println!("retention of {older_than_hours}h reaches before any stored session; nothing to purge");
        return Ok(());
    };

    let purged = store.purge_expired(cutoff).await?;
    tracing::info!(purged, older_than_hours, "purged expired sessions");
    println!("purged {purged} sessions older than {older_than_hours}h");
    Ok(())
}
