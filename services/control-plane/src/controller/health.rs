//! Health reconciler: heartbeat expiry detection and restart policy.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use orca_api::{AgentPod, AgentPodPhase};
use orca_store::Store;

use crate::runtime::AgentRuntime;

use super::Reconcile;

/// A pod is unhealthy when its last heartbeat (or, failing that, its start
/// time) is older than three intervals.
pub struct HealthController {
    store: Arc<Store>,
    runtime: Arc<AgentRuntime>,
    interval: Duration,
}

impl HealthController {
    pub fn new(store: Arc<Store>, runtime: Arc<AgentRuntime>, interval: Duration) -> Self {
        Self {
            store,
            runtime,
            interval,
        }
    }

    fn check_heartbeat(&self, key: &str, pod: AgentPod) -> Result<()> {
        let threshold = chrono::Duration::from_std(self.interval * 3)
            .unwrap_or_else(|_| chrono::Duration::seconds(90));
        let deadline = Utc::now() - threshold;

        match pod.status.last_heartbeat {
            None => {
                // No heartbeat recorded yet: fall back to the start time.
                if let Some(started_at) = pod.status.started_at {
                    if started_at < deadline {
                        return self.mark_failed(key, pod, "no heartbeat received since start");
                    }
                }
                Ok(())
            }
            Some(last) if last < deadline => {
                let elapsed = Utc::now() - last;
                warn!(
                    pod = %pod.metadata.name,
                    elapsed_secs = elapsed.num_seconds(),
                    threshold_secs = threshold.num_seconds(),
                    "pod heartbeat expired"
                );
                let message = format!(
                    "heartbeat expired: last seen {}s ago",
                    elapsed.num_seconds()
                );
                self.mark_failed(key, pod, &message)
            }
            Some(last) => {
                debug!(pod = %pod.metadata.name, last_heartbeat = %last, "pod healthy");
                Ok(())
            }
        }
    }

    fn mark_failed(&self, key: &str, mut pod: AgentPod, message: &str) -> Result<()> {
        pod.status.phase = AgentPodPhase::Failed;
        pod.status.message = message.to_string();
        pod.metadata.updated_at = Some(Utc::now());
        self.store
            .update(key, &pod)
            .context("marking pod Failed")?;
        // Release the runtime's claim so a restart can re-start the pod.
        self.runtime.release_pod(&pod.metadata.name);
        info!(pod = %pod.metadata.name, reason = %message, "pod marked as failed");
        Ok(())
    }

    /// Failed pods with `restartPolicy: Always` go back to Pending; the
    /// reconciliation of the reset state starts them again.
    fn check_restart(&self, key: &str, mut pod: AgentPod) -> Result<()> {
        if pod.spec.restart_policy != "Always" {
            debug!(
                pod = %pod.metadata.name,
                restart_policy = %pod.spec.restart_policy,
                "pod failed but restart policy is not Always"
            );
            return Ok(());
        }

        info!(pod = %pod.metadata.name, "restarting failed pod");

        pod.status.phase = AgentPodPhase::Pending;
        pod.status.message = "restarting after failure".to_string();
        pod.status.active_tasks = 0;
        pod.metadata.updated_at = Some(Utc::now());
        self.store
            .update(key, &pod)
            .context("resetting pod to Pending")?;
        Ok(())
    }

    /// Pending pods not yet managed by the runtime get started here. This
    /// covers both restarted pods and pods created directly through the
    /// API.
    fn start_pending(&self, pod: AgentPod) {
        if self.runtime.is_active(&pod.metadata.name) {
            return;
        }
        let runtime = self.runtime.clone();
        tokio::spawn(async move {
            if let Err(err) = runtime.start_pod(&pod).await {
                warn!(pod = %pod.metadata.name, error = %err, "background pod start failed");
            }
        });
    }
}

#[async_trait]
impl Reconcile for HealthController {
    async fn reconcile(&self, key: &str) -> Result<()> {
        let pod: AgentPod = match self.store.get(key) {
            Ok(pod) => pod,
            Err(err) if err.is_not_found() => {
                debug!(key, "pod not found, possibly deleted");
                return Ok(());
            }
            Err(err) => return Err(err).context("loading pod for health check"),
        };

        match pod.status.phase {
            AgentPodPhase::Ready | AgentPodPhase::Busy => self.check_heartbeat(key, pod),
            AgentPodPhase::Failed => self.check_restart(key, pod),
            AgentPodPhase::Pending => {
                self.start_pending(pod);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
