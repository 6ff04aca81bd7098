//! mockwire
//!
//! Serves the base handler set over HTTP so tools outside the test process
//! can talk to the same deterministic API.

use anyhow::{Context, Result};
use mockwire_server::{Config, InterceptServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mockwire_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting mockwire...");

    let config = Config::from_env()?;
    let server = InterceptServer::with_default_handlers(config.intercept())
        .context("Failed to build base handlers")?;
    server
        .start()
        .await
        .context("Failed to start interception server")?;

    for handler in server.list_handlers() {
        tracing::info!(method = %handler.method, pattern = %handler.pattern, "Handler registered");
    }
    if let Some(url) = server.base_url() {
        tracing::info!("Listening on {}", url);
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutting down");
    server.stop().await.context("Failed to stop interception server")?;
    Ok(())
}
