//! Agent runtime: owns pod lifecycle transitions and task execution.
//!
//! All state mutations go through the store. Counter updates (activeTasks,
//! completedTasks, failedTasks) are read-modify-write pairs, so the
//! runtime serializes them behind a mutex to preserve the phase/counter
//! invariants: `activeTasks <= max(1, maxConcurrency)` and
//! `Busy ⇔ activeTasks > 0`.

pub mod executor;

pub use executor::{
    CliExecutor, ExecutionRequest, ExecutionResult, ExecutorError, MockExecutor, TaskExecutor,
};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use orca_api::{
    resource_key, AgentPod, AgentPodPhase, DevTask, DevTaskPhase, KIND_AGENT_POD, KIND_DEV_TASK,
};
use orca_store::Store;

/// Defaults applied when a pod or task leaves a knob unset.
#[derive(Debug, Clone)]
pub struct RuntimeDefaults {
    pub max_tokens: u32,
    pub task_timeout: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for RuntimeDefaults {
    fn default() -> Self {
        Self {
            max_tokens: 8192,
            task_timeout: Duration::from_secs(300),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

/// Drives pod lifecycle state machines and runs tasks on pods.
pub struct AgentRuntime {
    store: Arc<Store>,
    executor: Arc<dyn TaskExecutor>,
    defaults: RuntimeDefaults,
    // Serializes pod counter read-modify-write pairs.
    counters: tokio::sync::Mutex<()>,
    // Cancel handle per started pod, keyed by pod name.
    active: parking_lot::Mutex<HashMap<String, watch::Sender<bool>>>,
}

impl AgentRuntime {
    pub fn new(
        store: Arc<Store>,
        executor: Arc<dyn TaskExecutor>,
        defaults: RuntimeDefaults,
    ) -> Self {
        Self {
            store,
            executor,
            defaults,
            counters: tokio::sync::Mutex::new(()),
            active: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Whether this runtime currently manages the named pod.
    pub fn is_active(&self, pod_name: &str) -> bool {
        self.active.lock().contains_key(pod_name)
    }

    /// Drop the runtime's claim on a pod, cancelling its heartbeat loop.
    /// Used when a pod is declared Failed so a later restart can re-claim
    /// it.
    pub fn release_pod(&self, pod_name: &str) {
        if let Some(cancel) = self.active.lock().remove(pod_name) {
            let _ = cancel.send(true);
        }
    }

    /// Drive a pod `Pending → Starting → Ready`, recording the start time
    /// and the first heartbeat, and spawn its heartbeat loop.
    pub async fn start_pod(&self, pod: &AgentPod) -> Result<()> {
        let key = resource_key(KIND_AGENT_POD, &pod.metadata.project, &pod.metadata.name);

        // Re-read: the pod may have moved on since the caller saw it.
        let mut pod: AgentPod = match self.store.get(&key) {
            Ok(pod) => pod,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err).context("loading pod to start"),
        };
        if pod.status.phase != AgentPodPhase::Pending {
            debug!(pod = %pod.metadata.name, phase = %pod.status.phase, "pod not pending, skipping start");
            return Ok(());
        }

        // Claim the pod before touching its phase so concurrent start
        // requests (pool creation vs. health reconcile) cannot race.
        let (cancel_tx, cancel_rx) = watch::channel(false);
        {
            let mut active = self.active.lock();
            if active.contains_key(&pod.metadata.name) {
                return Ok(());
            }
            active.insert(pod.metadata.name.clone(), cancel_tx);
        }

        info!(pod = %pod.metadata.name, project = %pod.metadata.project, "starting pod");

        pod.status.phase = AgentPodPhase::Starting;
        pod.status.message = "initializing agent context".to_string();
        pod.metadata.updated_at = Some(Utc::now());
        self.store
            .update(&key, &pod)
            .context("setting pod Starting")?;

        let now = Utc::now();
        pod.status.phase = AgentPodPhase::Ready;
        pod.status.message = String::new();
        pod.status.started_at = Some(now);
        pod.status.last_heartbeat = Some(now);
        pod.metadata.updated_at = Some(now);
        self.store.update(&key, &pod).context("setting pod Ready")?;

        info!(pod = %pod.metadata.name, model = %pod.spec.model, "pod is ready");

        self.spawn_heartbeat_loop(key, pod.metadata.name.clone(), cancel_rx);
        Ok(())
    }

    /// Gracefully terminate a pod: `→ Terminating`, cancel its context,
    /// `→ Terminated`.
    pub async fn stop_pod(&self, pod_name: &str, project: &str) -> Result<()> {
        let key = resource_key(KIND_AGENT_POD, project, pod_name);

        let mut pod: AgentPod = match self.store.get(&key) {
            Ok(pod) => pod,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err).context("loading pod to stop"),
        };
        if pod.status.phase == AgentPodPhase::Terminated {
            return Ok(());
        }

        info!(pod = %pod_name, project = %project, "stopping pod");

        pod.status.phase = AgentPodPhase::Terminating;
        pod.status.message = "shutting down".to_string();
        pod.metadata.updated_at = Some(Utc::now());
        self.store
            .update(&key, &pod)
            .context("setting pod Terminating")?;

        if let Some(cancel) = self.active.lock().remove(pod_name) {
            let _ = cancel.send(true);
        }

        pod.status.phase = AgentPodPhase::Terminated;
        pod.status.message = "stopped".to_string();
        pod.metadata.updated_at = Some(Utc::now());
        self.store
            .update(&key, &pod)
            .context("setting pod Terminated")?;

        info!(pod = %pod_name, "pod terminated");
        Ok(())
    }

    /// Run a task on a pod: task `→ Running`, pod counters up, invoke the
    /// executor (bounded by the task timeout), then record the outcome and
    /// release the pod. The runtime owns every transition after
    /// `Scheduled`.
    pub async fn execute_task(&self, task: &DevTask, pod: &AgentPod) -> Result<()> {
        let task_key = resource_key(KIND_DEV_TASK, &task.metadata.project, &task.metadata.name);
        let pod_key = resource_key(KIND_AGENT_POD, &pod.metadata.project, &pod.metadata.name);

        info!(task = %task.metadata.name, pod = %pod.metadata.name, "executing task");

        let now = Utc::now();
        let mut task: DevTask = self.store.get(&task_key).context("loading task to run")?;
        if task.status.phase != DevTaskPhase::Scheduled {
            debug!(task = %task.metadata.name, phase = %task.status.phase, "task not scheduled, skipping run");
            return Ok(());
        }
        task.status.phase = DevTaskPhase::Running;
        task.status.assigned_pod = Some(pod.metadata.name.clone());
        task.status.started_at = Some(now);
        task.metadata.updated_at = Some(now);
        self.store
            .update(&task_key, &task)
            .context("setting task Running")?;

        // Counter pair: activeTasks++ and the Busy flip happen atomically
        // relative to other counter updates.
        {
            let _guard = self.counters.lock().await;
            let mut pod: AgentPod = self.store.get(&pod_key).context("loading pod for run")?;
            pod.status.active_tasks += 1;
            pod.status.phase = AgentPodPhase::Busy;
            pod.metadata.updated_at = Some(Utc::now());
            self.store
                .update(&pod_key, &pod)
                .context("setting pod Busy")?;
        }

        // Pod defaults overridden by task preferences.
        let model = task
            .spec
            .preferred_model
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| pod.spec.model.clone());
        let max_tokens = if pod.spec.max_tokens > 0 {
            pod.spec.max_tokens
        } else {
            self.defaults.max_tokens
        };
        let request = ExecutionRequest {
            model,
            system_prompt: pod.spec.system_prompt.clone(),
            prompt: task.spec.prompt.clone(),
            max_tokens,
        };

        let timeout = if task.spec.timeout_seconds > 0 {
            Duration::from_secs(task.spec.timeout_seconds)
        } else {
            self.defaults.task_timeout
        };

        let outcome = match tokio::time::timeout(timeout, self.executor.execute(request)).await {
            Ok(result) => result,
            Err(_) => Err(ExecutorError::Failed(format!(
                "task timed out after {}s",
                timeout.as_secs()
            ))),
        };

        let finished_at = Utc::now();
        let failed = outcome.is_err();
        match outcome {
            Ok(result) => {
                info!(
                    task = %task.metadata.name,
                    tokens_in = result.tokens_in,
                    tokens_out = result.tokens_out,
                    "task execution succeeded"
                );
                task.status.phase = DevTaskPhase::Succeeded;
                task.status.output = result.output;
            }
            Err(err) => {
                error!(task = %task.metadata.name, error = %err, "task execution failed");
                task.status.phase = DevTaskPhase::Failed;
                task.status.error = err.to_string();
            }
        }
        task.status.finished_at = Some(finished_at);
        task.metadata.updated_at = Some(finished_at);
        self.store
            .update(&task_key, &task)
            .context("recording task result")?;

        // Counter pair: activeTasks--, outcome counters, phase back to
        // Ready only when the pod is idle again.
        {
            let _guard = self.counters.lock().await;
            let mut pod: AgentPod = self
                .store
                .get(&pod_key)
                .context("loading pod to release")?;
            pod.status.active_tasks = pod.status.active_tasks.saturating_sub(1);
            if failed {
                pod.status.failed_tasks += 1;
            } else {
                pod.status.completed_tasks += 1;
            }
            // Leave terminating/failed pods alone; only flip the busy bit.
            if matches!(
                pod.status.phase,
                AgentPodPhase::Busy | AgentPodPhase::Ready
            ) {
                pod.status.phase = if pod.status.active_tasks > 0 {
                    AgentPodPhase::Busy
                } else {
                    AgentPodPhase::Ready
                };
            }
            pod.metadata.updated_at = Some(finished_at);
            self.store
                .update(&pod_key, &pod)
                .context("releasing pod")?;
        }

        Ok(())
    }

    /// Record a heartbeat for a pod.
    pub fn heartbeat(&self, pod_name: &str, project: &str) -> Result<()> {
        let key = resource_key(KIND_AGENT_POD, project, pod_name);
        let mut pod: AgentPod = self.store.get(&key).context("loading pod for heartbeat")?;

        let now = Utc::now();
        pod.status.last_heartbeat = Some(now);
        pod.metadata.updated_at = Some(now);
        self.store.update(&key, &pod).context("writing heartbeat")?;
        Ok(())
    }

    /// Periodically refresh `lastHeartbeat` until the pod's context is
    /// cancelled or the pod reaches a terminal phase.
    fn spawn_heartbeat_loop(
        &self,
        pod_key: String,
        pod_name: String,
        mut cancel: watch::Receiver<bool>,
    ) {
        let store = self.store.clone();
        let interval = self.defaults.heartbeat_interval;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.changed() => {
                        if *cancel.borrow() {
                            return;
                        }
                    }
                    _ = tokio::time::sleep(interval) => {
                        let mut pod: AgentPod = match store.get(&pod_key) {
                            Ok(pod) => pod,
                            Err(_) => return, // pod deleted
                        };
                        if pod.status.phase.is_terminal() {
                            return;
                        }
                        let now = Utc::now();
                        pod.status.last_heartbeat = Some(now);
                        pod.metadata.updated_at = Some(now);
                        if let Err(err) = store.update(&pod_key, &pod) {
                            warn!(pod = %pod_name, error = %err, "heartbeat write failed");
                        }
                    }
                }
            }
        });
    }
}
