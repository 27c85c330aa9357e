//! `orca serve` - run the control plane in the foreground.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use orca_control_plane::config::Config;
use orca_control_plane::server;

#[derive(Debug, Args)]
pub struct ServeCommand {
    /// API server port.
    #[arg(long, default_value_t = 7117)]
    port: u16,

    /// API server host.
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Data directory (default: ~/.orca/data).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Keep all state in memory (no database file).
    #[arg(long)]
    in_memory: bool,
}

impl ServeCommand {
    pub async fn run(self) -> Result<()> {
        tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
            .with(tracing_subscriber::fmt::layer())
            .init();

        let mut config = Config::from_env().context("loading configuration")?;
        config.listen_addr = SocketAddr::new(self.host, self.port);
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        config.in_memory = self.in_memory;

        let store = server::open_store(&config)?;

        println!("{}", "Orca Control Plane".cyan().bold());
        println!("   API Server: http://{}", config.listen_addr);
        if config.in_memory {
            println!("   Store:      in-memory");
        } else {
            println!("   Data Dir:   {}", config.data_dir.display());
            println!("   DB Path:    {}", config.db_path().display());
        }
        println!();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received shutdown signal");
                let _ = shutdown_tx.send(true);
            }
        });

        server::run(config, store, shutdown_rx).await
    }
}
