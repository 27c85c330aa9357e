//! Pool reconciler: drives the observed pod count toward the declared
//! replica count and keeps the pool's status current.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use orca_api::{
    kind_prefix, project_prefix, resource_key, AgentPod, AgentPodPhase, AgentPodStatus, AgentPool,
    ObjectMeta, TypeMeta, KIND_AGENT_POD, KIND_AGENT_POOL,
};
use orca_store::Store;

use crate::runtime::AgentRuntime;

use super::Reconcile;

pub struct AgentPoolController {
    store: Arc<Store>,
    runtime: Arc<AgentRuntime>,
}

impl AgentPoolController {
    pub fn new(store: Arc<Store>, runtime: Arc<AgentRuntime>) -> Self {
        Self { store, runtime }
    }

    /// Pod events are routed to the owner pool so scaling decisions and the
    /// status update always run against the latest pool spec.
    async fn reconcile_from_pod_event(&self, pod_key: &str) -> Result<()> {
        let pod: AgentPod = match self.store.get(pod_key) {
            Ok(pod) => pod,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err).context("loading pod for pool reconcile"),
        };
        let Some(owner) = pod.spec.owner_pool.clone() else {
            return Ok(()); // standalone pod, not managed by a pool
        };
        let pool_key = resource_key(KIND_AGENT_POOL, &pod.metadata.project, &owner);
        self.reconcile_pool(&pool_key).await
    }

    async fn reconcile_pool(&self, key: &str) -> Result<()> {
        let pool: AgentPool = match self.store.get(key) {
            Ok(pool) => pool,
            Err(err) if err.is_not_found() => {
                debug!(key, "pool not found, possibly deleted");
                return Ok(());
            }
            Err(err) => return Err(err).context("loading pool"),
        };

        let prefix = project_prefix(KIND_AGENT_POD, &pool.metadata.project);
        let pods: Vec<AgentPod> = self
            .store
            .list(&prefix)
            .context("listing pods for pool")?;

        // Terminating pods are already on their way out and do not count
        // toward the actual replica count.
        let owned: Vec<&AgentPod> = pods
            .iter()
            .filter(|pod| {
                pod.spec.owner_pool.as_deref() == Some(pool.metadata.name.as_str())
                    && !pod.status.phase.is_terminal()
            })
            .collect();

        let actual = owned.len() as u32;
        let desired = pool.spec.replicas;
        debug!(
            pool = %pool.metadata.name,
            actual,
            desired,
            "pool replica count"
        );

        if actual < desired {
            let to_create = desired - actual;
            for _ in 0..to_create {
                self.create_pod(&pool)?;
            }
            info!(pool = %pool.metadata.name, created = to_create, "scaled up pool");
        }

        if actual > desired {
            let terminated = self.scale_down(&owned, (actual - desired) as usize)?;
            info!(pool = %pool.metadata.name, terminated, "scaled down pool");
        }

        self.update_status(key, &pool).await
    }

    /// Mark `excess` owned pods Terminating, preferring idle pods; busy
    /// pods are only taken when the idle ones do not cover the deficit.
    /// The runtime finishes the `Terminating → Terminated` transition in
    /// the background.
    fn scale_down(&self, owned: &[&AgentPod], excess: usize) -> Result<usize> {
        let idle_first = owned
            .iter()
            .filter(|pod| pod.status.phase != AgentPodPhase::Busy)
            .chain(
                owned
                    .iter()
                    .filter(|pod| pod.status.phase == AgentPodPhase::Busy),
            );

        let mut terminated = 0;
        for pod in idle_first.take(excess) {
            let mut pod = (*pod).clone();
            pod.status.phase = AgentPodPhase::Terminating;
            pod.status.message = "scaling down".to_string();
            pod.metadata.updated_at = Some(Utc::now());

            let pod_key = resource_key(KIND_AGENT_POD, &pod.metadata.project, &pod.metadata.name);
            self.store
                .update(&pod_key, &pod)
                .context("marking pod Terminating")?;
            terminated += 1;

            let runtime = self.runtime.clone();
            let name = pod.metadata.name.clone();
            let project = pod.metadata.project.clone();
            tokio::spawn(async move {
                if let Err(err) = runtime.stop_pod(&name, &project).await {
                    warn!(pod = %name, error = %err, "background pod stop failed");
                }
            });
        }
        Ok(terminated)
    }

    /// Create one pod from the pool's template and start it in the
    /// background; the reconciler never blocks on pod startup.
    fn create_pod(&self, pool: &AgentPool) -> Result<()> {
        let suffix = Uuid::new_v4().simple().to_string();
        let pod_name = format!("{}-{}", pool.metadata.name, &suffix[..8]);

        // Merged labels: selector first, template labels win on conflict.
        let mut labels = pool.spec.selector.clone();
        labels.extend(pool.spec.template.metadata.labels.clone());

        let now = Utc::now();
        let mut spec = pool.spec.template.spec.clone();
        spec.owner_pool = Some(pool.metadata.name.clone());

        let pod = AgentPod {
            type_meta: TypeMeta::new(KIND_AGENT_POD),
            metadata: ObjectMeta {
                name: pod_name.clone(),
                project: pool.metadata.project.clone(),
                labels,
                uid: Uuid::new_v4().to_string(),
                created_at: Some(now),
                updated_at: Some(now),
            },
            spec,
            status: AgentPodStatus {
                phase: AgentPodPhase::Pending,
                ..Default::default()
            },
        };

        let pod_key = resource_key(KIND_AGENT_POD, &pool.metadata.project, &pod_name);
        self.store.create(&pod_key, &pod).context("creating pod")?;
        debug!(pod = %pod_name, pool = %pool.metadata.name, "created pod from pool template");

        let runtime = self.runtime.clone();
        tokio::spawn(async move {
            if let Err(err) = runtime.start_pod(&pod).await {
                warn!(pod = %pod.metadata.name, error = %err, "background pod start failed");
            }
        });

        Ok(())
    }

    /// Recompute the status counts and write them only if they changed:
    /// a blind write would emit MODIFIED and re-trigger this reconciler
    /// forever.
    async fn update_status(&self, key: &str, pool: &AgentPool) -> Result<()> {
        let prefix = project_prefix(KIND_AGENT_POD, &pool.metadata.project);
        let pods: Vec<AgentPod> = self
            .store
            .list(&prefix)
            .context("re-listing pods for status")?;

        let mut replicas = 0;
        let mut ready = 0;
        let mut busy = 0;
        for pod in &pods {
            if pod.spec.owner_pool.as_deref() != Some(pool.metadata.name.as_str()) {
                continue;
            }
            if pod.status.phase.is_terminal() {
                continue;
            }
            replicas += 1;
            match pod.status.phase {
                AgentPodPhase::Ready => ready += 1,
                AgentPodPhase::Busy => busy += 1,
                _ => {}
            }
        }

        // Re-read to pick up concurrent spec changes (e.g. the scale API)
        // and only update status on the fresh copy.
        let mut fresh: AgentPool = match self.store.get(key) {
            Ok(pool) => pool,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err).context("re-reading pool for status"),
        };

        if fresh.status.replicas == replicas
            && fresh.status.ready_replicas == ready
            && fresh.status.busy_replicas == busy
        {
            return Ok(());
        }

        fresh.status.replicas = replicas;
        fresh.status.ready_replicas = ready;
        fresh.status.busy_replicas = busy;
        fresh.metadata.updated_at = Some(Utc::now());
        self.store
            .update(key, &fresh)
            .context("updating pool status")?;
        Ok(())
    }
}

#[async_trait]
impl Reconcile for AgentPoolController {
    async fn reconcile(&self, key: &str) -> Result<()> {
        if key.starts_with(&kind_prefix(KIND_AGENT_POD)) {
            return self.reconcile_from_pod_event(key).await;
        }
        self.reconcile_pool(key).await
    }
}
