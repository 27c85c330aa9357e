//! Hard constraints: a pod must pass every predicate to be feasible.

use orca_api::{AgentPod, AgentPodPhase, DevTask};

/// A filter deciding whether a pod can accept the task at all.
pub type Predicate = fn(&AgentPod, &DevTask) -> bool;

/// The pod belongs to the task's project. Listing is already scoped by the
/// project prefix, so this is a structural guarantee restated as a check.
pub fn pod_in_same_project(pod: &AgentPod, task: &DevTask) -> bool {
    pod.metadata.project == task.metadata.project
}

/// The pod is Ready (not Busy, Failed, Pending, ...).
pub fn pod_is_ready(pod: &AgentPod, _task: &DevTask) -> bool {
    pod.status.phase == AgentPodPhase::Ready
}

/// The pod has spare capacity: `activeTasks < max(1, maxConcurrency)`.
pub fn pod_has_capacity(pod: &AgentPod, _task: &DevTask) -> bool {
    pod.status.active_tasks < pod.spec.effective_concurrency()
}

/// The pod advertises every capability the task requires. An empty
/// requirement list matches any pod.
pub fn pod_matches_capabilities(pod: &AgentPod, task: &DevTask) -> bool {
    task.spec
        .required_capabilities
        .iter()
        .all(|required| pod.spec.capabilities.iter().any(|c| c == required))
}

/// The pod runs the task's preferred model, when one is declared.
pub fn pod_matches_model(pod: &AgentPod, task: &DevTask) -> bool {
    match task.spec.preferred_model.as_deref() {
        Some(model) if !model.is_empty() => pod.spec.model == model,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use orca_api::{AgentPodSpec, AgentPodStatus, DevTaskSpec, ObjectMeta};

    fn pod(phase: AgentPodPhase, active: u32, max: u32) -> AgentPod {
        AgentPod {
            metadata: ObjectMeta {
                name: "pod".into(),
                project: "p".into(),
                ..Default::default()
            },
            spec: AgentPodSpec {
                model: "claude-sonnet".into(),
                capabilities: vec!["code-generation".into(), "code-review".into()],
                max_concurrency: max,
                ..Default::default()
            },
            status: AgentPodStatus {
                phase,
                active_tasks: active,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn task() -> DevTask {
        DevTask {
            metadata: ObjectMeta {
                name: "task".into(),
                project: "p".into(),
                ..Default::default()
            },
            spec: DevTaskSpec {
                prompt: "do it".into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn ready_predicate() {
        assert!(pod_is_ready(&pod(AgentPodPhase::Ready, 0, 1), &task()));
        assert!(!pod_is_ready(&pod(AgentPodPhase::Busy, 1, 2), &task()));
        assert!(!pod_is_ready(&pod(AgentPodPhase::Failed, 0, 1), &task()));
    }

    #[test]
    fn capacity_treats_zero_as_one() {
        assert!(pod_has_capacity(&pod(AgentPodPhase::Ready, 0, 0), &task()));
        assert!(!pod_has_capacity(&pod(AgentPodPhase::Ready, 1, 0), &task()));
        assert!(pod_has_capacity(&pod(AgentPodPhase::Ready, 4, 5), &task()));
        assert!(!pod_has_capacity(&pod(AgentPodPhase::Ready, 5, 5), &task()));
    }

    #[test]
    fn empty_capability_list_matches_any_pod() {
        assert!(pod_matches_capabilities(
            &pod(AgentPodPhase::Ready, 0, 1),
            &task()
        ));
    }

    #[test]
    fn missing_capability_fails() {
        let mut t = task();
        t.spec.required_capabilities = vec!["code-review".into(), "deployment".into()];
        assert!(!pod_matches_capabilities(
            &pod(AgentPodPhase::Ready, 0, 1),
            &t
        ));

        t.spec.required_capabilities = vec!["code-review".into()];
        assert!(pod_matches_capabilities(
            &pod(AgentPodPhase::Ready, 0, 1),
            &t
        ));
    }

    #[test]
    fn model_preference() {
        let mut t = task();
        assert!(pod_matches_model(&pod(AgentPodPhase::Ready, 0, 1), &t));

        t.spec.preferred_model = Some("claude-sonnet".into());
        assert!(pod_matches_model(&pod(AgentPodPhase::Ready, 0, 1), &t));

        t.spec.preferred_model = Some("claude-opus".into());
        assert!(!pod_matches_model(&pod(AgentPodPhase::Ready, 0, 1), &t));
    }

    #[test]
    fn project_scoping() {
        let mut other = pod(AgentPodPhase::Ready, 0, 1);
        other.metadata.project = "q".into();
        assert!(!pod_in_same_project(&other, &task()));
    }
}
