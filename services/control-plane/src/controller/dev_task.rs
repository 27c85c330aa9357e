//! Task reconciler: dependency gating, scheduling, dispatch and retry.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use orca_api::{
    kind_prefix, project_from_key, project_prefix, resource_key, AgentPod, AgentPodPhase, DevTask,
    DevTaskPhase, KIND_AGENT_POD, KIND_DEV_TASK,
};
use orca_store::Store;

use crate::runtime::AgentRuntime;
use crate::scheduler::{ScheduleError, Scheduler};

use super::Reconcile;

pub struct DevTaskController {
    store: Arc<Store>,
    scheduler: Arc<Scheduler>,
    runtime: Arc<AgentRuntime>,
}

impl DevTaskController {
    pub fn new(store: Arc<Store>, scheduler: Arc<Scheduler>, runtime: Arc<AgentRuntime>) -> Self {
        Self {
            store,
            scheduler,
            runtime,
        }
    }

    async fn reconcile_task(&self, key: &str) -> Result<()> {
        let task: DevTask = match self.store.get(key) {
            Ok(task) => task,
            Err(err) if err.is_not_found() => {
                debug!(key, "task not found, possibly deleted");
                return Ok(());
            }
            Err(err) => return Err(err).context("loading task"),
        };

        debug!(task = %task.metadata.name, phase = %task.status.phase, "reconciling task");

        match task.status.phase {
            DevTaskPhase::Pending => self.reconcile_pending(key, task).await,
            DevTaskPhase::Scheduled => self.reconcile_scheduled(key, task).await,
            DevTaskPhase::Running => self.reconcile_running(key, task).await,
            DevTaskPhase::Failed => self.reconcile_failed(key, task).await,
            DevTaskPhase::Succeeded => Ok(()),
        }
    }

    /// Gate on dependencies, then schedule. A missing or unfinished
    /// dependency parks the task until a later event; an unschedulable
    /// task is returned as an error so the queue retries with backoff.
    async fn reconcile_pending(&self, key: &str, mut task: DevTask) -> Result<()> {
        for dep_name in &task.spec.depends_on {
            let dep_key = resource_key(KIND_DEV_TASK, &task.metadata.project, dep_name);
            let dep: DevTask = match self.store.get(&dep_key) {
                Ok(dep) => dep,
                Err(err) if err.is_not_found() => {
                    debug!(
                        task = %task.metadata.name,
                        dependency = %dep_name,
                        "dependency not found, waiting"
                    );
                    return Ok(());
                }
                Err(err) => return Err(err).context("checking dependency"),
            };
            if dep.status.phase != DevTaskPhase::Succeeded {
                debug!(
                    task = %task.metadata.name,
                    dependency = %dep_name,
                    dep_phase = %dep.status.phase,
                    "dependency not yet succeeded"
                );
                return Ok(());
            }
        }

        let pod = match self.scheduler.schedule(&task) {
            Ok(pod) => pod,
            Err(err @ ScheduleError::NoFeasiblePod { .. }) => {
                warn!(task = %task.metadata.name, error = %err, "scheduling failed, will retry");
                return Err(err).context("scheduling task");
            }
            Err(err) => return Err(err).context("scheduling task"),
        };

        task.status.phase = DevTaskPhase::Scheduled;
        task.status.assigned_pod = Some(pod.metadata.name.clone());
        task.metadata.updated_at = Some(Utc::now());
        self.store
            .update(key, &task)
            .context("setting task Scheduled")?;

        info!(task = %task.metadata.name, pod = %pod.metadata.name, "task scheduled");
        Ok(())
    }

    /// Launch execution on the assigned pod without blocking the worker;
    /// the runtime owns every transition from here.
    async fn reconcile_scheduled(&self, key: &str, mut task: DevTask) -> Result<()> {
        let Some(pod_name) = task.status.assigned_pod.clone() else {
            // Scheduled without a pod violates the phase invariant; recover
            // by rescheduling.
            task.status.phase = DevTaskPhase::Pending;
            task.metadata.updated_at = Some(Utc::now());
            return self
                .store
                .update(key, &task)
                .context("resetting podless task");
        };

        let pod_key = resource_key(KIND_AGENT_POD, &task.metadata.project, &pod_name);
        let pod: AgentPod = match self.store.get(&pod_key) {
            Ok(pod) => pod,
            Err(err) if err.is_not_found() => {
                warn!(
                    task = %task.metadata.name,
                    pod = %pod_name,
                    "assigned pod not found, resetting to Pending"
                );
                task.status.phase = DevTaskPhase::Pending;
                task.status.assigned_pod = None;
                task.metadata.updated_at = Some(Utc::now());
                return self
                    .store
                    .update(key, &task)
                    .context("resetting orphaned scheduled task");
            }
            Err(err) => return Err(err).context("loading assigned pod"),
        };

        info!(task = %task.metadata.name, pod = %pod.metadata.name, "launching task execution");

        let runtime = self.runtime.clone();
        tokio::spawn(async move {
            if let Err(err) = runtime.execute_task(&task, &pod).await {
                warn!(task = %task.metadata.name, error = %err, "task execution returned error");
            }
        });

        Ok(())
    }

    /// A running task whose assigned pod vanished can never complete; fail
    /// it so the retry policy takes over.
    async fn reconcile_running(&self, key: &str, mut task: DevTask) -> Result<()> {
        let Some(pod_name) = task.status.assigned_pod.clone() else {
            return Ok(());
        };
        let pod_key = resource_key(KIND_AGENT_POD, &task.metadata.project, &pod_name);
        match self.store.get::<AgentPod>(&pod_key) {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => {
                warn!(
                    task = %task.metadata.name,
                    pod = %pod_name,
                    "assigned pod deleted while task was running"
                );
                let now = Utc::now();
                task.status.phase = DevTaskPhase::Failed;
                task.status.error = format!("assigned pod {pod_name} no longer exists");
                task.status.finished_at = Some(now);
                task.metadata.updated_at = Some(now);
                self.store
                    .update(key, &task)
                    .context("failing orphaned running task")
            }
            Err(err) => Err(err).context("checking assigned pod"),
        }
    }

    /// Reset a failed task to Pending while retry budget remains.
    async fn reconcile_failed(&self, key: &str, mut task: DevTask) -> Result<()> {
        let max_retries = task.spec.max_retries;
        if max_retries == 0 {
            return Ok(());
        }
        if task.status.retries >= max_retries {
            info!(
                task = %task.metadata.name,
                retries = task.status.retries,
                max_retries,
                "task exhausted retries"
            );
            return Ok(());
        }

        task.status.phase = DevTaskPhase::Pending;
        task.status.retries += 1;
        task.status.assigned_pod = None;
        task.status.error = String::new();
        task.metadata.updated_at = Some(Utc::now());
        self.store
            .update(key, &task)
            .context("resetting task for retry")?;

        info!(
            task = %task.metadata.name,
            retry = task.status.retries,
            max_retries,
            "task reset for retry"
        );
        Ok(())
    }

    /// A pod turning Ready may unblock pending tasks in its project, so
    /// run the pending branch over all of them.
    async fn reconcile_from_pod_event(&self, pod_key: &str) -> Result<()> {
        let project = project_from_key(pod_key).to_string();
        if project.is_empty() {
            return Ok(());
        }

        let pod: AgentPod = match self.store.get(pod_key) {
            Ok(pod) => pod,
            Err(_) => return Ok(()), // pod gone, nothing to do
        };
        if pod.status.phase != AgentPodPhase::Ready {
            return Ok(());
        }

        let tasks: Vec<DevTask> = self
            .store
            .list(&project_prefix(KIND_DEV_TASK, &project))
            .context("listing tasks for pod event")?;

        for task in tasks {
            if task.status.phase != DevTaskPhase::Pending {
                continue;
            }
            let task_key = resource_key(KIND_DEV_TASK, &project, &task.metadata.name);
            if let Err(err) = self.reconcile_pending(&task_key, task).await {
                // Unschedulable tasks stay pending; their own key will be
                // retried when something changes.
                debug!(key = %task_key, error = %err, "pending task not yet schedulable");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Reconcile for DevTaskController {
    async fn reconcile(&self, key: &str) -> Result<()> {
        if key.starts_with(&kind_prefix(KIND_AGENT_POD)) {
            return self.reconcile_from_pod_event(key).await;
        }
        self.reconcile_task(key).await
    }
}
