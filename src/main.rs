// src/main.rs
// mnemos: tiered memory service for conversational agents

use std::time::Duration;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mnemos::api::http_router;
use mnemos::config::Config;
use mnemos::state::AppState;

/// How long in-flight HTTP requests get to drain after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    let default_level = if config.server.mode == "release" { "info" } else { "debug" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let prometheus = PrometheusBuilder::new().install_recorder()?;
    let state = AppState::from_config(&config, prometheus).await?;

    let app = http_router(state).layer(TraceLayer::new_for_http());

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 mnemos listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("⏳ shutdown signal received, draining in-flight requests");

    // Force-close anything still running once the grace period elapses.
    tokio::spawn(async {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
        warn!("grace period elapsed, forcing exit");
        std::process::exit(0);
    });
}
