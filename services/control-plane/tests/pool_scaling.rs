//! Pool reconciliation: scale-up, scale-down preferring idle pods, and
//! status bookkeeping.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use orca_api::{
    project_prefix, resource_key, AgentPod, AgentPodPhase, AgentPodSpec, AgentPodTemplate,
    AgentPool, AgentPoolSpec, ObjectMeta, TypeMeta, KIND_AGENT_POD, KIND_AGENT_POOL,
};
use orca_control_plane::runtime::MockExecutor;

use common::{eventually, TestCluster};

const WAIT: Duration = Duration::from_secs(5);

fn test_pool(name: &str, project: &str, replicas: u32) -> AgentPool {
    let mut selector = BTreeMap::new();
    selector.insert("app".to_string(), name.to_string());

    AgentPool {
        type_meta: TypeMeta::new(KIND_AGENT_POOL),
        metadata: ObjectMeta {
            name: name.into(),
            project: project.into(),
            ..Default::default()
        },
        spec: AgentPoolSpec {
            replicas,
            selector,
            template: AgentPodTemplate {
                metadata: ObjectMeta::default(),
                spec: AgentPodSpec {
                    model: "claude-sonnet".into(),
                    capabilities: vec!["code-generation".into()],
                    max_concurrency: 1,
                    restart_policy: "Always".into(),
                    ..Default::default()
                },
            },
        },
        ..Default::default()
    }
}

fn owned_pods(cluster: &TestCluster, project: &str, pool: &str) -> Vec<AgentPod> {
    let pods: Vec<AgentPod> = cluster
        .store
        .list(&project_prefix(KIND_AGENT_POD, project))
        .expect("list pods");
    pods.into_iter()
        .filter(|pod| pod.spec.owner_pool.as_deref() == Some(pool))
        .collect()
}

#[tokio::test]
async fn scale_up_creates_ready_pods() {
    let cluster = TestCluster::start(Arc::new(MockExecutor::succeeding("ok")));

    let pool = test_pool("workers", "proj", 3);
    let pool_key = resource_key(KIND_AGENT_POOL, "proj", "workers");
    cluster.store.create(&pool_key, &pool).expect("create pool");

    let ready = eventually(WAIT, || {
        let pods = owned_pods(&cluster, "proj", "workers");
        pods.len() == 3
            && pods
                .iter()
                .all(|pod| pod.status.phase == AgentPodPhase::Ready)
    })
    .await;
    assert!(ready, "expected 3 ready pods owned by the pool");

    // Template spec and merged labels flow into each pod.
    for pod in owned_pods(&cluster, "proj", "workers") {
        assert_eq!(pod.spec.model, "claude-sonnet");
        assert_eq!(pod.metadata.labels.get("app").map(String::as_str), Some("workers"));
        assert!(pod.metadata.name.starts_with("workers-"));
        assert!(!pod.metadata.uid.is_empty());
    }

    // Status converges to the observed counts.
    let converged = eventually(WAIT, || {
        let pool: AgentPool = cluster.store.get(&pool_key).expect("get pool");
        pool.status.replicas == 3
            && pool.status.ready_replicas == 3
            && pool.status.busy_replicas == 0
    })
    .await;
    assert!(converged, "pool status should reach 3/3/0");

    cluster.stop().await;
}

#[tokio::test]
async fn scale_down_prefers_idle_pods() {
    let cluster = TestCluster::start(Arc::new(MockExecutor::succeeding("ok")));

    let pool = test_pool("pool-a", "proj", 3);
    let pool_key = resource_key(KIND_AGENT_POOL, "proj", "pool-a");
    cluster.store.create(&pool_key, &pool).expect("create pool");

    assert!(
        eventually(WAIT, || {
            owned_pods(&cluster, "proj", "pool-a")
                .iter()
                .filter(|pod| pod.status.phase == AgentPodPhase::Ready)
                .count()
                == 3
        })
        .await,
        "pool should scale up to 3 ready pods first"
    );

    // Make one pod busy by hand.
    let mut pods = owned_pods(&cluster, "proj", "pool-a");
    pods.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
    let mut busy = pods[0].clone();
    busy.status.phase = AgentPodPhase::Busy;
    busy.status.active_tasks = 1;
    let busy_key = resource_key(KIND_AGENT_POD, "proj", &busy.metadata.name);
    cluster.store.update(&busy_key, &busy).expect("mark busy");

    // Patch replicas down to 1.
    let mut patched: AgentPool = cluster.store.get(&pool_key).expect("get pool");
    patched.spec.replicas = 1;
    cluster
        .store
        .update(&pool_key, &patched)
        .expect("scale down");

    // The two ready pods are terminated; the busy pod survives untouched.
    let settled = eventually(WAIT, || {
        let pods = owned_pods(&cluster, "proj", "pool-a");
        let survivors: Vec<_> = pods
            .iter()
            .filter(|pod| !pod.status.phase.is_terminal())
            .collect();
        survivors.len() == 1 && survivors[0].metadata.name == busy.metadata.name
    })
    .await;
    assert!(settled, "only the busy pod should remain non-terminal");

    let busy_after: AgentPod = cluster.store.get(&busy_key).expect("get busy pod");
    assert_eq!(busy_after.status.phase, AgentPodPhase::Busy);

    cluster.stop().await;
}

#[tokio::test]
async fn status_updates_only_on_change() {
    let cluster = TestCluster::start(Arc::new(MockExecutor::succeeding("ok")));

    let pool = test_pool("quiet", "proj", 1);
    let pool_key = resource_key(KIND_AGENT_POOL, "proj", "quiet");
    cluster.store.create(&pool_key, &pool).expect("create pool");

    assert!(
        eventually(WAIT, || {
            let pool: AgentPool = cluster.store.get(&pool_key).expect("get pool");
            pool.status.ready_replicas == 1
        })
        .await,
        "pool should converge"
    );

    // Once converged, the pool's updatedAt must stop moving: a status
    // write per reconcile would loop forever through its own MODIFIED
    // events.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let first: AgentPool = cluster.store.get(&pool_key).expect("get pool");
    tokio::time::sleep(Duration::from_millis(500)).await;
    let second: AgentPool = cluster.store.get(&pool_key).expect("get pool");
    assert_eq!(first.metadata.updated_at, second.metadata.updated_at);

    cluster.stop().await;
}
