//! Shared harness: an in-memory cluster with all controllers running and
//! a scripted executor in place of the real CLI.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use orca_api::{KIND_AGENT_POD, KIND_AGENT_POOL, KIND_DEV_TASK};
use orca_control_plane::controller::{
    AgentPoolController, DevTaskController, HealthController, Manager,
};
use orca_control_plane::runtime::{AgentRuntime, RuntimeDefaults, TaskExecutor};
use orca_control_plane::scheduler::Scheduler;
use orca_store::Store;

/// Health threshold is 3x this; keep it short so expiry tests are quick.
pub const HEALTH_INTERVAL: Duration = Duration::from_millis(200);

pub struct TestCluster {
    pub store: Arc<Store>,
    pub runtime: Arc<AgentRuntime>,
    manager: Manager,
}

impl TestCluster {
    pub fn start(executor: Arc<dyn TaskExecutor>) -> Self {
        let store = Arc::new(Store::in_memory());
        let runtime = Arc::new(AgentRuntime::new(
            store.clone(),
            executor,
            RuntimeDefaults {
                max_tokens: 1024,
                task_timeout: Duration::from_secs(5),
                heartbeat_interval: Duration::from_millis(100),
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
                HEALTH_INTERVAL,
            )),
            vec![KIND_AGENT_POD],
        );
        manager.start();

        Self {
            store,
            runtime,
            manager,
        }
    }

    pub async fn stop(mut self) {
        self.manager.stop().await;
    }
}

/// Poll `check` until it returns true or the timeout expires.
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
