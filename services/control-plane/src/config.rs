//! Configuration for the control plane.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Control plane configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to listen on for HTTP connections.
    pub listen_addr: SocketAddr,

    /// Directory holding the embedded database file.
    pub data_dir: PathBuf,

    /// Use the in-memory store instead of the database file.
    pub in_memory: bool,

    /// Downstream executor binary (resolved via PATH when bare).
    pub executor_bin: String,

    /// Model used when a pod does not name one.
    pub default_model: String,

    /// Max tokens used when a pod does not set one.
    pub default_max_tokens: u32,

    /// Task timeout applied when `timeoutSeconds` is zero.
    pub default_timeout_secs: u64,

    /// Expected heartbeat frequency; pods are unhealthy after 3x this.
    pub health_check_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 7117)),
            data_dir: default_data_dir(),
            in_memory: false,
            executor_bin: "claude".to_string(),
            default_model: "claude-sonnet-4-20250514".to_string(),
            default_max_tokens: 8192,
            default_timeout_secs: 300,
            health_check_interval_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("ORCA_LISTEN_ADDR") {
            config.listen_addr = addr
                .parse()
                .with_context(|| format!("invalid ORCA_LISTEN_ADDR {addr:?}"))?;
        }
        if let Ok(dir) = std::env::var("ORCA_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(bin) = std::env::var("ORCA_EXECUTOR_BIN") {
            if !bin.is_empty() {
                config.executor_bin = bin;
            }
        }
        if let Ok(model) = std::env::var("ORCA_DEFAULT_MODEL") {
            config.default_model = model;
        }
        if let Ok(secs) = std::env::var("ORCA_HEALTH_INTERVAL_SECS") {
            config.health_check_interval_secs = secs
                .parse()
                .with_context(|| format!("invalid ORCA_HEALTH_INTERVAL_SECS {secs:?}"))?;
        }
        if let Ok(secs) = std::env::var("ORCA_TASK_TIMEOUT_SECS") {
            config.default_timeout_secs = secs
                .parse()
                .with_context(|| format!("invalid ORCA_TASK_TIMEOUT_SECS {secs:?}"))?;
        }

        Ok(config)
    }

    /// Full path of the embedded database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("orca.db")
    }
}

fn default_data_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".orca").join("data"),
        None => PathBuf::from("/tmp/orca/data"),
    }
}
