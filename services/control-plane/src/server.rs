//! Control-plane wiring: store, runtime, scheduler, controllers, HTTP.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use orca_api::{KIND_AGENT_POD, KIND_AGENT_POOL, KIND_DEV_TASK};
use orca_store::Store;

use crate::api;
use crate::config::Config;
use crate::controller::{AgentPoolController, DevTaskController, HealthController, Manager};
use crate::runtime::{AgentRuntime, CliExecutor, RuntimeDefaults};
use crate::scheduler::Scheduler;
use crate::state::AppState;

/// Open the store named by the configuration, creating the data directory
/// as needed.
pub fn open_store(config: &Config) -> Result<Arc<Store>> {
    if config.in_memory {
        return Ok(Arc::new(Store::in_memory()));
    }
    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!("creating data directory {}", config.data_dir.display())
    })?;
    let db_path = config.db_path();
    let store = Store::open(&db_path)
        .with_context(|| format!("opening store at {}", db_path.display()))?;
    Ok(Arc::new(store))
}

/// How long in-flight HTTP requests get to finish after shutdown.
const DRAIN_DEADLINE: Duration = Duration::from_secs(10);

/// Run the control plane until the shutdown signal fires: start all
/// controllers, serve the HTTP API, then drain and stop.
pub async fn run(
    config: Config,
    store: Arc<Store>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let executor = Arc::new(CliExecutor::new(config.executor_bin.clone()));
    let runtime = Arc::new(AgentRuntime::new(
        store.clone(),
        executor,
        RuntimeDefaults {
            max_tokens: config.default_max_tokens,
            task_timeout: Duration::from_secs(config.default_timeout_secs),
            heartbeat_interval: Duration::from_secs(config.health_check_interval_secs),
        },
    ));
    let scheduler = Arc::new(Scheduler::new(store.clone()));

    let mut manager = Manager::new(store.clone());
    manager.register(
        "AgentPoolController",
        Arc::new(AgentPoolController::new(store.clone(), runtime.clone())),
        vec![KIND_AGENT_POOL, KIND_AGENT_POD],
    );
    manager.register(
        "DevTaskController",
        Arc::new(DevTaskController::new(
            store.clone(),
            scheduler,
            runtime.clone(),
        )),
        vec![KIND_DEV_TASK, KIND_AGENT_POD],
    );
    manager.register(
        "HealthController",
        Arc::new(HealthController::new(
            store.clone(),
            runtime.clone(),
            Duration::from_secs(config.health_check_interval_secs),
        )),
        vec![KIND_AGENT_POD],
    );
    manager.start();

    let state = AppState::new(store.clone(), runtime);
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "listening for connections");

    let mut graceful = shutdown.clone();
    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = graceful.changed().await;
    });

    // Drain with a bounded deadline: once shutdown fires, in-flight
    // requests get DRAIN_DEADLINE before the server is dropped.
    let drain_deadline = {
        let mut rx = shutdown.clone();
        async move {
            let _ = rx.changed().await;
            tokio::time::sleep(DRAIN_DEADLINE).await;
        }
    };
    tokio::select! {
        result = serve => result.context("serving HTTP")?,
        _ = drain_deadline => warn!("http drain deadline exceeded"),
    }

    manager.stop().await;
    store.close();
    info!("control plane stopped");
    Ok(())
}
