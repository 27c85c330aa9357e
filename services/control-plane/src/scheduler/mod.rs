//! Task-to-pod scheduling.
//!
//! The scheduler separates hard constraints from soft preferences: a pod
//! must pass every predicate to be feasible, then feasible pods are ranked
//! by the sum of the priority scores. Candidates are considered in name
//! order, so the choice is deterministic for a fixed store snapshot.

pub mod predicates;
pub mod priorities;

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use orca_api::{project_prefix, AgentPod, DevTask, KIND_AGENT_POD};
use orca_store::{Store, StoreError};

use predicates::Predicate;
use priorities::Priority;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("no suitable pod found for task {task:?} in project {project:?}")]
    NoFeasiblePod { task: String, project: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Picks the best feasible pod for a task.
pub struct Scheduler {
    store: Arc<Store>,
    predicates: Vec<Predicate>,
    priorities: Vec<Priority>,
}

impl Scheduler {
    /// Create a scheduler with the default predicate and priority sets.
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            predicates: vec![
                predicates::pod_in_same_project,
                predicates::pod_is_ready,
                predicates::pod_has_capacity,
                predicates::pod_matches_capabilities,
                predicates::pod_matches_model,
            ],
            priorities: vec![
                priorities::least_loaded,
                priorities::capability_match,
                priorities::model_preference,
            ],
        }
    }

    /// Select a pod for the task, or fail with `NoFeasiblePod`.
    pub fn schedule(&self, task: &DevTask) -> Result<AgentPod, ScheduleError> {
        let mut pods: Vec<AgentPod> = self
            .store
            .list(&project_prefix(KIND_AGENT_POD, &task.metadata.project))?;

        // Name order makes tie-breaking deterministic regardless of the
        // backend's listing order.
        pods.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));

        let feasible: Vec<AgentPod> = pods
            .into_iter()
            .filter(|pod| self.predicates.iter().all(|pred| pred(pod, task)))
            .collect();

        debug!(
            task = %task.metadata.name,
            project = %task.metadata.project,
            feasible = feasible.len(),
            "scheduler predicates applied"
        );

        let mut best: Option<(AgentPod, i32)> = None;
        for pod in feasible {
            let score: i32 = self.priorities.iter().map(|pf| pf(&pod, task)).sum();
            match &best {
                // Strictly-greater keeps the first (lowest name) on ties.
                Some((_, top)) if score <= *top => {}
                _ => best = Some((pod, score)),
            }
        }

        let Some((pod, score)) = best else {
            return Err(ScheduleError::NoFeasiblePod {
                task: task.metadata.name.clone(),
                project: task.metadata.project.clone(),
            });
        };
        debug!(
            task = %task.metadata.name,
            pod = %pod.metadata.name,
            score,
            "scheduler selected pod"
        );
        Ok(pod)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use orca_api::{
        resource_key, AgentPodPhase, AgentPodSpec, AgentPodStatus, DevTaskSpec, ObjectMeta,
        TypeMeta, KIND_DEV_TASK,
    };

    fn store_with_pods(pods: Vec<AgentPod>) -> Arc<Store> {
        let store = Arc::new(Store::in_memory());
        for pod in pods {
            let key = resource_key(KIND_AGENT_POD, &pod.metadata.project, &pod.metadata.name);
            store.create(&key, &pod).expect("create pod");
        }
        store
    }

    fn ready_pod(name: &str, model: &str, capabilities: &[&str], active: u32, max: u32) -> AgentPod {
        AgentPod {
            type_meta: TypeMeta::new(KIND_AGENT_POD),
            metadata: ObjectMeta {
                name: name.into(),
                project: "proj".into(),
                ..Default::default()
            },
            spec: AgentPodSpec {
                model: model.into(),
                capabilities: capabilities.iter().map(|s| s.to_string()).collect(),
                max_concurrency: max,
                ..Default::default()
            },
            status: AgentPodStatus {
                phase: AgentPodPhase::Ready,
                active_tasks: active,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn test_task(capabilities: &[&str], model: Option<&str>) -> DevTask {
        DevTask {
            type_meta: TypeMeta::new(KIND_DEV_TASK),
            metadata: ObjectMeta {
                name: "task".into(),
                project: "proj".into(),
                ..Default::default()
            },
            spec: DevTaskSpec {
                prompt: "do something".into(),
                required_capabilities: capabilities.iter().map(|s| s.to_string()).collect(),
                preferred_model: model.map(|s| s.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn no_pods_is_not_schedulable() {
        let scheduler = Scheduler::new(store_with_pods(vec![]));
        let err = scheduler.schedule(&test_task(&[], None)).unwrap_err();
        assert!(matches!(err, ScheduleError::NoFeasiblePod { .. }));
    }

    #[test]
    fn busy_and_failed_pods_are_filtered() {
        let mut busy = ready_pod("busy", "m", &[], 1, 1);
        busy.status.phase = AgentPodPhase::Busy;
        let mut failed = ready_pod("failed", "m", &[], 0, 1);
        failed.status.phase = AgentPodPhase::Failed;

        let scheduler = Scheduler::new(store_with_pods(vec![busy, failed]));
        assert!(scheduler.schedule(&test_task(&[], None)).is_err());
    }

    #[test]
    fn least_loaded_pod_wins() {
        // Spec scenario: identical pods with activeTasks 5, 3, 0 — the idle
        // pod takes the task.
        let caps = &["code-generation"];
        let scheduler = Scheduler::new(store_with_pods(vec![
            ready_pod("pod-a", "m1", caps, 5, 10),
            ready_pod("pod-b", "m1", caps, 3, 10),
            ready_pod("pod-c", "m1", caps, 0, 10),
        ]));

        let chosen = scheduler
            .schedule(&test_task(caps, Some("m1")))
            .expect("schedule");
        assert_eq!(chosen.metadata.name, "pod-c");
    }

    #[test]
    fn capability_requirements_filter() {
        let scheduler = Scheduler::new(store_with_pods(vec![
            ready_pod("generalist", "m", &["code-generation"], 0, 1),
            ready_pod("reviewer", "m", &["code-review"], 0, 1),
        ]));

        let chosen = scheduler
            .schedule(&test_task(&["code-review"], None))
            .expect("schedule");
        assert_eq!(chosen.metadata.name, "reviewer");
    }

    #[test]
    fn preferred_model_is_a_hard_filter() {
        let scheduler = Scheduler::new(store_with_pods(vec![
            ready_pod("sonnet", "claude-sonnet", &[], 0, 1),
            ready_pod("opus", "claude-opus", &[], 0, 1),
        ]));

        let chosen = scheduler
            .schedule(&test_task(&[], Some("claude-opus")))
            .expect("schedule");
        assert_eq!(chosen.metadata.name, "opus");

        let err = scheduler
            .schedule(&test_task(&[], Some("claude-haiku")))
            .unwrap_err();
        assert!(matches!(err, ScheduleError::NoFeasiblePod { .. }));
    }

    #[test]
    fn saturated_pod_is_skipped() {
        let scheduler = Scheduler::new(store_with_pods(vec![
            ready_pod("full", "m", &[], 2, 2),
            ready_pod("spare", "m", &[], 1, 2),
        ]));

        let chosen = scheduler.schedule(&test_task(&[], None)).expect("schedule");
        assert_eq!(chosen.metadata.name, "spare");
    }

    #[test]
    fn schedule_is_deterministic() {
        let caps = &["a"];
        let scheduler = Scheduler::new(store_with_pods(vec![
            ready_pod("tie-1", "m", caps, 0, 1),
            ready_pod("tie-2", "m", caps, 0, 1),
        ]));

        let task = test_task(caps, None);
        let first = scheduler.schedule(&task).expect("schedule");
        for _ in 0..10 {
            let again = scheduler.schedule(&task).expect("schedule");
            assert_eq!(again.metadata.name, first.metadata.name);
        }
    }
}
