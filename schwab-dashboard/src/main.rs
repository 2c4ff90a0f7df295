//! Schwab dashboard server
//!
//! Run with: cargo run -p schwab-dashboard
//!
//! Needs tokens from the `authenticate` binary first.

use anyhow::{bail, Context, Result};
use schwab_auth::TokenProvider;
use schwab_dashboard::{routes, DashboardConfig, DashboardState};
use schwab_data::DataManager;
use schwab_rest::{SchwabRestClient, TokenSource};
use schwab_stream::{RestStreamerAuth, Streamer};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = DashboardConfig::from_env().context("invalid dashboard configuration")?;

    info!("Initializing Schwab authentication");
    let provider = TokenProvider::from_env().context("missing Schwab app credentials")?;
    if !provider.check_authentication().await {
        error!("Failed to authenticate with Schwab API; run the authenticate binary first");
        bail!("not authenticated");
    }
    info!("Successfully authenticated with Schwab API");

    let tokens: Arc<dyn TokenSource> = Arc::new(provider);
    let rest = SchwabRestClient::new(Arc::clone(&tokens))?;
    let streamer = Streamer::get_instance(Arc::new(RestStreamerAuth::new(rest.clone(), tokens)));

    info!("Initializing data manager");
    let manager = Arc::new(DataManager::new(rest, streamer, config.data_dir.clone())?);
    let state = Arc::new(DashboardState::new(manager, &config));

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!("Dashboard listening on http://{}", config.bind_address());

    axum::serve(listener, routes::router(Arc::clone(&state)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    let realtime_state = Arc::clone(&state);
    tokio::task::spawn_blocking(move || {
        if realtime_state.realtime().is_active() {
            realtime_state.realtime().stop_streaming();
        }
        realtime_state.manager().stop_streaming();
    })
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
