//! Heartbeat expiry detection and the Always restart policy.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use orca_api::{
    resource_key, AgentPod, AgentPodPhase, AgentPodSpec, AgentPodStatus, ObjectMeta, TypeMeta,
    KIND_AGENT_POD,
};
use orca_control_plane::runtime::MockExecutor;

use common::{eventually, TestCluster, HEALTH_INTERVAL};

const WAIT: Duration = Duration::from_secs(5);

fn stale_pod(name: &str, restart_policy: &str) -> AgentPod {
    // Last heartbeat four intervals ago: past the 3x threshold.
    let stale = Utc::now()
        - chrono::Duration::from_std(HEALTH_INTERVAL * 4).unwrap_or(chrono::Duration::seconds(4));
    AgentPod {
        type_meta: TypeMeta::new(KIND_AGENT_POD),
        metadata: ObjectMeta {
            name: name.into(),
            project: "proj".into(),
            ..Default::default()
        },
        spec: AgentPodSpec {
            model: "claude-sonnet".into(),
            restart_policy: restart_policy.into(),
            ..Default::default()
        },
        status: AgentPodStatus {
            phase: AgentPodPhase::Ready,
            started_at: Some(stale),
            last_heartbeat: Some(stale),
            active_tasks: 0,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn expired_heartbeat_marks_pod_failed() {
    let cluster = TestCluster::start(Arc::new(MockExecutor::succeeding("ok")));

    let pod = stale_pod("stale", "Never");
    let key = resource_key(KIND_AGENT_POD, "proj", "stale");
    cluster.store.create(&key, &pod).expect("create pod");

    assert!(
        eventually(WAIT, || {
            let pod: AgentPod = cluster.store.get(&key).expect("get pod");
            pod.status.phase == AgentPodPhase::Failed
        })
        .await,
        "stale pod should be marked Failed"
    );

    let failed: AgentPod = cluster.store.get(&key).expect("get pod");
    assert!(
        failed.status.message.contains("heartbeat"),
        "message should explain the failure: {:?}",
        failed.status.message
    );

    // Without restartPolicy Always it stays down.
    tokio::time::sleep(HEALTH_INTERVAL * 3).await;
    let still: AgentPod = cluster.store.get(&key).expect("get pod");
    assert_eq!(still.status.phase, AgentPodPhase::Failed);

    cluster.stop().await;
}

#[tokio::test]
async fn always_restart_brings_pod_back() {
    let cluster = TestCluster::start(Arc::new(MockExecutor::succeeding("ok")));

    let mut pod = stale_pod("phoenix", "Always");
    pod.status.active_tasks = 2; // leftover counters from the stuck run
    pod.status.phase = AgentPodPhase::Busy;
    let key = resource_key(KIND_AGENT_POD, "proj", "phoenix");
    cluster.store.create(&key, &pod).expect("create pod");

    // Failure, then reset to Pending with counters cleared, then the
    // runtime drives it back to Ready with a fresh heartbeat.
    assert!(
        eventually(WAIT, || {
            let pod: AgentPod = cluster.store.get(&key).expect("get pod");
            pod.status.phase == AgentPodPhase::Ready && pod.status.active_tasks == 0
        })
        .await,
        "pod should be restarted to Ready with activeTasks reset"
    );

    let restarted: AgentPod = cluster.store.get(&key).expect("get pod");
    let heartbeat = restarted.status.last_heartbeat.expect("heartbeat");
    assert!(
        Utc::now() - heartbeat < chrono::Duration::seconds(2),
        "restart must record a fresh heartbeat"
    );

    cluster.stop().await;
}

#[tokio::test]
async fn pod_without_heartbeat_fails_after_grace_period() {
    let cluster = TestCluster::start(Arc::new(MockExecutor::succeeding("ok")));

    // Started long ago, never heartbeated, and not claimed by the runtime
    // (simulates a pod left over from a previous process).
    let mut pod = stale_pod("silent", "Never");
    pod.status.last_heartbeat = None;
    let key = resource_key(KIND_AGENT_POD, "proj", "silent");
    cluster.store.create(&key, &pod).expect("create pod");

    assert!(
        eventually(WAIT, || {
            let pod: AgentPod = cluster.store.get(&key).expect("get pod");
            pod.status.phase == AgentPodPhase::Failed
        })
        .await,
        "pod with no heartbeat since start should fail"
    );

    cluster.stop().await;
}
