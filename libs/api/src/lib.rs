//! Resource types for the orca control plane.
//!
//! Every persisted resource shares the same envelope: a `TypeMeta`
//! (apiVersion + kind), an `ObjectMeta` (name, project, labels, uid,
//! timestamps), a `spec` describing desired state, and a `status`
//! describing observed state. Resources are addressed by hierarchical
//! keys of the form `/{kind}/{project}/{name}`.

mod manifest;
mod types;

pub use manifest::{parse_bytes, parse_file, parse_str, ManifestError};
pub use types::*;

/// The API group/version every resource carries.
pub const API_VERSION: &str = "orca.dev/v1alpha1";

/// Resource kind names as they appear in keys and manifests.
pub const KIND_PROJECT: &str = "Project";
pub const KIND_AGENT_POD: &str = "AgentPod";
pub const KIND_AGENT_POOL: &str = "AgentPool";
pub const KIND_DEV_TASK: &str = "DevTask";

/// Build the canonical store key for a resource.
///
/// ```
/// # use orca_api::{resource_key, KIND_AGENT_POD};
/// assert_eq!(resource_key(KIND_AGENT_POD, "my-project", "worker-1"),
///            "/AgentPod/my-project/worker-1");
/// ```
///
/// Projects are not scoped, so their project segment is empty:
/// `/Project//staging`.
pub fn resource_key(kind: &str, project: &str, name: &str) -> String {
    format!("/{kind}/{project}/{name}")
}

/// Build the watch/list prefix covering every resource of a kind.
pub fn kind_prefix(kind: &str) -> String {
    format!("/{kind}/")
}

/// Build the list prefix covering one kind within one project.
pub fn project_prefix(kind: &str, project: &str) -> String {
    format!("/{kind}/{project}/")
}

/// Extract the kind segment from a `/{kind}/{project}/{name}` key.
pub fn kind_from_key(key: &str) -> &str {
    key.trim_start_matches('/').split('/').next().unwrap_or("")
}

/// Extract the project segment from a `/{kind}/{project}/{name}` key.
pub fn project_from_key(key: &str) -> &str {
    let mut parts = key.trim_start_matches('/').split('/');
    parts.next();
    parts.next().unwrap_or("")
}

/// Extract the name segment from a `/{kind}/{project}/{name}` key.
pub fn name_from_key(key: &str) -> &str {
    let mut parts = key.trim_start_matches('/').split('/');
    parts.next();
    parts.next();
    parts.next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trip() {
        let key = resource_key(KIND_DEV_TASK, "proj-a", "build-1");
        assert_eq!(key, "/DevTask/proj-a/build-1");
        assert_eq!(kind_from_key(&key), "DevTask");
        assert_eq!(project_from_key(&key), "proj-a");
        assert_eq!(name_from_key(&key), "build-1");
    }

    #[test]
    fn project_key_has_empty_project_segment() {
        let key = resource_key(KIND_PROJECT, "", "staging");
        assert_eq!(key, "/Project//staging");
        assert_eq!(kind_from_key(&key), "Project");
        assert_eq!(project_from_key(&key), "");
        assert_eq!(name_from_key(&key), "staging");
    }

    #[test]
    fn prefixes() {
        assert_eq!(kind_prefix(KIND_AGENT_POD), "/AgentPod/");
        assert_eq!(project_prefix(KIND_AGENT_POD, "p"), "/AgentPod/p/");
    }
}
