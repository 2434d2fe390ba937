//! `scrape` and `validate-key` command handlers.
//!
//! A CLI scrape runs the same orchestrator as the server, against whatever
//! storage `GRIDSCOUT_STORAGE` selects, and prints the live progress stream.

use std::sync::Arc;

use futures::StreamExt;
use gridscout_core::{load_brands, AppConfig, BoundingBox, GridPoint};
use gridscout_pipeline::{message_stream, JobOrchestrator, ProgressHub, ProgressMessage, ScrapeRequest};
use gridscout_scraper::{KeyValidation, PlacesClient};

use crate::ScrapeArgs;

/// Builds the job request from command-line arguments.
///
/// # Errors
///
/// Returns an error if the brand file cannot be read or parsed.
pub(crate) fn build_request(args: ScrapeArgs) -> anyhow::Result<ScrapeRequest> {
    let brands = load_brands(&args.brands)?.brands;
    let bounds = BoundingBox {
        min_lat: args.min_lat,
        max_lat: args.max_lat,
        min_lng: args.min_lng,
        max_lng: args.max_lng,
    };
    let GridPoint { lat, lng } = bounds.center();
    let job_id = args
        .job_id
        .unwrap_or_else(|| chrono::Utc::now().format("cli-%Y%m%dT%H%M%SZ").to_string());

    Ok(ScrapeRequest {
        brands,
        city_bounds: bounds,
        city_center: [args.center_lat.unwrap_or(lat), args.center_lng.unwrap_or(lng)],
        api_key: args.api_key,
        job_id,
    })
}

/// Runs one job to completion, printing each progress message.
///
/// # Errors
///
/// Returns an error if the request is invalid, storage cannot be opened, or
/// the job ends failed.
pub(crate) async fn run_scrape(config: &AppConfig, args: ScrapeArgs) -> anyhow::Result<()> {
    let request = build_request(args)?;
    let store = gridscout_db::open_session_store(config).await?;
    let orchestrator = JobOrchestrator::from_settings(
        config.scrape_settings(),
        store,
        Arc::new(ProgressHub::default()),
    )?;

    let started = orchestrator.start(request)?;
    println!("job {}", started.job_id);

    let mut messages = std::pin::pin!(message_stream(started.receiver));
    while let Some(message) = messages.next().await {
        let Some(line) = describe(&message) else {
            continue;
        };
        if matches!(message, ProgressMessage::Error { .. }) {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }

    let summary = started.handle.await??;
    tracing::info!(
        job_id = %summary.job_id,
        api_calls = summary.api_calls,
        cost = %summary.total_cost,
        "scrape finished"
    );
    Ok(())
}

/// One human-readable line per message; cost updates are folded into the
/// progress lines and not printed on their own.
pub(crate) fn describe(message: &ProgressMessage) -> Option<String> {
    match message {
        ProgressMessage::Start { total } => Some(format!("{total} searches planned")),
        ProgressMessage::Progress {
            percentage,
            message,
            ..
        } => Some(format!("[{percentage:>3}%] {message}")),
        ProgressMessage::CostUpdate { .. } => None,
        ProgressMessage::Result { result } => Some(format!(
            "  + {} | {}",
            result.name,
            result.address.as_deref().unwrap_or("\u{2014}")
        )),
        ProgressMessage::Complete {
            total_found,
            total_cost,
            ..
        } => Some(format!("complete: {total_found} places, cost {total_cost}")),
        ProgressMessage::Error { message } => Some(format!("failed: {message}")),
    }
}

/// # Errors
///
/// Returns an error if the client cannot be built or the key is rejected.
pub(crate) async fn run_validate_key(config: &AppConfig, api_key: &str) -> anyhow::Result<()> {
    let client = PlacesClient::new(&config.scrape_settings())?;
    match client.validate_key(api_key).await {
        KeyValidation::Valid => {
            println!("key is valid");
            Ok(())
        }
        KeyValidation::Invalid { reason, message } => {
            anyhow::bail!("key rejected ({reason:?}): {message}")
        }
    }
}
