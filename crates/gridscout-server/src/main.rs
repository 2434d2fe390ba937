mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use gridscout_pipeline::{JobOrchestrator, ProgressHub};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(gridscout_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let store = gridscout_db::open_session_store(&config).await?;
    tracing::info!(
        storage = %config.storage,
        env = %config.env,
        dedup_scope = %config.scrape.dedup_scope,
        "session storage ready"
    );

    let orchestrator = JobOrchestrator::from_settings(
        config.scrape_settings(),
        store.clone(),
        Arc::new(ProgressHub::default()),
    )?;

    let _scheduler = scheduler::build_scheduler(store, Arc::clone(&config)).await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        gridscout_core::Environment::Development
    ))?;
    let app = build_app(AppState::new(orchestrator), auth, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown; running jobs are dropped");
}
