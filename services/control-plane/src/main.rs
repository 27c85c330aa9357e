//! orca control plane server.
//!
//! Standalone entry point: loads configuration from the environment,
//! opens the store, and runs the API server plus all controllers until
//! interrupted.

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use orca_control_plane::{config::Config, server};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting orca control plane");

    let config = Config::from_env()?;
    info!(listen_addr = %config.listen_addr, data_dir = %config.data_dir.display(), "configuration loaded");

    let store = server::open_store(&config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
            let _ = shutdown_tx.send(true);
        }
    });

    server::run(config, store, shutdown_rx).await
}
