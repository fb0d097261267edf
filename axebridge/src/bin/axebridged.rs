//! The axebridge daemon.
//!
//! Serves the uniform miner API over HTTP, talking to devices through
//! the espminer gateway.

use std::env;
use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use axebridge::api::{self, SharedState};
use axebridge::gateway::esp::EspGateway;

const DEFAULT_LISTEN: &str = "127.0.0.1:7810";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let listen = env::var("AXEBRIDGE_LISTEN").unwrap_or_else(|_| DEFAULT_LISTEN.to_string());
    let state = SharedState::new(Arc::new(EspGateway::new()));

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            signal.cancel();
        }
    });

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    info!(%listen, "axebridge listening");

    axum::serve(listener, api::app(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}
