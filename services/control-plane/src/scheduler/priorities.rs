//! Soft preferences: each priority scores a feasible pod from 0 to 100;
//! the scheduler sums the scores.

use orca_api::{AgentPod, DevTask};

/// A scoring function. Higher is better.
pub type Priority = fn(&AgentPod, &DevTask) -> i32;

/// Prefer pods with more free capacity:
/// `100 - activeTasks * 100 / max(1, maxConcurrency)`, floored at 0 when
/// the pod is saturated.
pub fn least_loaded(pod: &AgentPod, _task: &DevTask) -> i32 {
    let max = pod.spec.effective_concurrency() as i32;
    let active = pod.status.active_tasks as i32;
    if active >= max {
        return 0;
    }
    100 - active * 100 / max
}

/// Prefer pods whose capability set covers the requirements well:
/// `matching * 50 / required`, plus a flat 50 bonus when the pod carries
/// more capabilities than required, clamped to 100. With no requirements
/// every pod scores 50.
pub fn capability_match(pod: &AgentPod, task: &DevTask) -> i32 {
    let required = &task.spec.required_capabilities;
    if required.is_empty() {
        return 50;
    }

    let matching = required
        .iter()
        .filter(|req| pod.spec.capabilities.iter().any(|c| &c == req))
        .count() as i32;

    let mut score = matching * 50 / required.len() as i32;
    if pod.spec.capabilities.len() > required.len() {
        score += 50;
    }
    score.min(100)
}

/// 100 on an exact model match, 50 when the task states no preference,
/// 0 on a mismatch.
pub fn model_preference(pod: &AgentPod, task: &DevTask) -> i32 {
    match task.spec.preferred_model.as_deref() {
        None | Some("") => 50,
        Some(model) if pod.spec.model == model => 100,
        Some(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use orca_api::{AgentPodSpec, AgentPodStatus, DevTaskSpec, ObjectMeta};

    fn pod(active: u32, max: u32, capabilities: &[&str], model: &str) -> AgentPod {
        AgentPod {
            metadata: ObjectMeta {
                name: "pod".into(),
                project: "p".into(),
                ..Default::default()
            },
            spec: AgentPodSpec {
                model: model.into(),
                capabilities: capabilities.iter().map(|s| s.to_string()).collect(),
                max_concurrency: max,
                ..Default::default()
            },
            status: AgentPodStatus {
                active_tasks: active,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn task(capabilities: &[&str], model: Option<&str>) -> DevTask {
        DevTask {
            spec: DevTaskSpec {
                prompt: "p".into(),
                required_capabilities: capabilities.iter().map(|s| s.to_string()).collect(),
                preferred_model: model.map(|s| s.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn least_loaded_scales_with_free_capacity() {
        let t = task(&[], None);
        assert_eq!(least_loaded(&pod(0, 10, &[], "m"), &t), 100);
        assert_eq!(least_loaded(&pod(5, 10, &[], "m"), &t), 50);
        assert_eq!(least_loaded(&pod(10, 10, &[], "m"), &t), 0);
        // maxConcurrency 0 behaves as 1.
        assert_eq!(least_loaded(&pod(0, 0, &[], "m"), &t), 100);
        assert_eq!(least_loaded(&pod(1, 0, &[], "m"), &t), 0);
    }

    #[test]
    fn capability_match_scores() {
        // No requirements: flat 50.
        assert_eq!(capability_match(&pod(0, 1, &["a"], "m"), &task(&[], None)), 50);

        // Full match, no extras: 50.
        assert_eq!(
            capability_match(&pod(0, 1, &["a", "b"], "m"), &task(&["a", "b"], None)),
            50
        );

        // Full match plus superset bonus, clamped to 100.
        assert_eq!(
            capability_match(&pod(0, 1, &["a", "b", "c"], "m"), &task(&["a", "b"], None)),
            100
        );

        // Partial match: 1 of 2 = 25.
        assert_eq!(
            capability_match(&pod(0, 1, &["a"], "m"), &task(&["a", "b"], None)),
            25
        );
    }

    #[test]
    fn model_preference_scores() {
        assert_eq!(model_preference(&pod(0, 1, &[], "m1"), &task(&[], None)), 50);
        assert_eq!(
            model_preference(&pod(0, 1, &[], "m1"), &task(&[], Some("m1"))),
            100
        );
        assert_eq!(
            model_preference(&pod(0, 1, &[], "m1"), &task(&[], Some("m2"))),
            0
        );
    }
}
