mod query;
mod scrape;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gridscout-cli")]
#[command(about = "Grid-search brand presence scraper")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one scrape job in-process and print its progress
    Scrape(ScrapeArgs),
    /// Show the stored status of a job
    Status {
        job_id: String,
    },
    /// List the stored results of a job
    Results {
        job_id: String,
        /// Print the results as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Check a provider API key with one minimal search
    ValidateKey {
        #[arg(long, env = "GRIDSCOUT_PLACES_API_KEY", hide_env_values = true)]
        api_key: String,
    },
    /// Delete stored sessions older than the retention window
    Purge {
        /// Overrides GRIDSCOUT_SESSION_RETENTION_HOURS
        #[arg(long)]
        older_than_hours: Option<u64>,
    },
}

#[derive(Debug, clap::Args)]
pub(crate) struct ScrapeArgs {
    /// YAML brand list (`brands: [{brand, sku, category}]`)
    #[arg(long)]
    brands: PathBuf,
    #[arg(long, allow_negative_numbers = true)]
    min_lat: f64,
    #[arg(long, allow_negative_numbers = true)]
    max_lat: f64,
    #[arg(long, allow_negative_numbers = true)]
    min_lng: f64,
    #[arg(long, allow_negative_numbers = true)]
    max_lng: f64,
    /// Defaults to the middle of the bounds
    #[arg(long, allow_negative_numbers = true)]
    center_lat: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    center_lng: Option<f64>,
    /// Defaults to a timestamped id
    #[arg(long)]
    job_id: Option<String>,
    #[arg(long, env = "GRIDSCOUT_PLACES_API_KEY", hide_env_values = true)]
    api_key: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("gridscout-cli ready; run with --help for commands");
        return Ok(());
    };

    let config = gridscout_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match command {
        Commands::Scrape(args) => scrape::run_scrape(&config, args).await,
        Commands::Status { job_id } => query::run_status(&config, &job_id).await,
        Commands::Results { job_id, json } => query::run_results(&config, &job_id, json).await,
        Commands::ValidateKey { api_key } => scrape::run_validate_key(&config, &api_key).await,
        Commands::Purge { older_than_hours } => {
            let hours = older_than_hours.unwrap_or(config.session_retention_hours);
            query::run_purge(&config, hours).await
        }
    }
}
