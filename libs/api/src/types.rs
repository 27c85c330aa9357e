//! Typed resource definitions.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{resource_key, API_VERSION, KIND_AGENT_POD, KIND_AGENT_POOL, KIND_DEV_TASK, KIND_PROJECT};

/// API version and kind of a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
}

impl TypeMeta {
    pub fn new(kind: &str) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: kind.to_string(),
        }
    }
}

/// Metadata common to all resources.
///
/// `uid`, `created_at` and `updated_at` are server-assigned and immutable
/// after creation (updates preserve them).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub project: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Accessors shared by every resource type, used by generic handlers
/// (apply, manifest parsing) that dispatch on kind.
pub trait Object {
    const KIND: &'static str;

    fn metadata(&self) -> &ObjectMeta;
    fn metadata_mut(&mut self) -> &mut ObjectMeta;
    fn type_meta_mut(&mut self) -> &mut TypeMeta;

    /// Canonical store key for this resource.
    fn key(&self) -> String {
        resource_key(Self::KIND, &self.metadata().project, &self.metadata().name)
    }
}

macro_rules! impl_object {
    ($ty:ty, $kind:expr) => {
        impl Object for $ty {
            const KIND: &'static str = $kind;

            fn metadata(&self) -> &ObjectMeta {
                &self.metadata
            }
            fn metadata_mut(&mut self) -> &mut ObjectMeta {
                &mut self.metadata
            }
            fn type_meta_mut(&mut self) -> &mut TypeMeta {
                &mut self.type_meta
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// An isolation boundary scoping pods, pools and tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ProjectSpec,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub path: String,
}

impl_object!(Project, KIND_PROJECT);

// ---------------------------------------------------------------------------
// AgentPod
// ---------------------------------------------------------------------------

/// Lifecycle phase of an agent pod.
///
/// `Pending → Starting → Ready ⇄ Busy → Terminating → Terminated`,
/// with `Failed` as a side exit from any running phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentPodPhase {
    #[default]
    Pending,
    Starting,
    Ready,
    Busy,
    Failed,
    Terminating,
    Terminated,
}

impl AgentPodPhase {
    /// Terminating and Terminated pods no longer count toward pool replicas.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminating | Self::Terminated)
    }
}

impl fmt::Display for AgentPodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A single running AI agent instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPod {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub metadata: ObjectMeta,
    pub spec: AgentPodSpec,
    #[serde(default)]
    pub status: AgentPodStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPodSpec {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    /// Maximum concurrent tasks. Zero is treated as one everywhere.
    #[serde(default)]
    pub max_concurrency: u32,
    #[serde(default)]
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    #[serde(default)]
    pub restart_policy: String,
    /// Name of the pool that created this pod, if any. A back-reference,
    /// not ownership: deleting the pool does not delete the pod.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_pool: Option<String>,
}

impl AgentPodSpec {
    /// Effective concurrency limit (`max(1, maxConcurrency)`).
    pub fn effective_concurrency(&self) -> u32 {
        self.max_concurrency.max(1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPodStatus {
    #[serde(default)]
    pub phase: AgentPodPhase,
    #[serde(default)]
    pub active_tasks: u32,
    #[serde(default)]
    pub completed_tasks: u32,
    #[serde(default)]
    pub failed_tasks: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl_object!(AgentPod, KIND_AGENT_POD);

// ---------------------------------------------------------------------------
// AgentPool
// ---------------------------------------------------------------------------

/// A declaration of a desired count of identical agent pods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPool {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub metadata: ObjectMeta,
    pub spec: AgentPoolSpec,
    #[serde(default)]
    pub status: AgentPoolStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPoolSpec {
    #[serde(default)]
    pub replicas: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
    pub template: AgentPodTemplate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPodTemplate {
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: AgentPodSpec,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPoolStatus {
    #[serde(default)]
    pub replicas: u32,
    #[serde(default)]
    pub ready_replicas: u32,
    #[serde(default)]
    pub busy_replicas: u32,
}

impl_object!(AgentPool, KIND_AGENT_POOL);

// ---------------------------------------------------------------------------
// DevTask
// ---------------------------------------------------------------------------

/// Lifecycle phase of a dev task.
///
/// `Pending → Scheduled → Running → Succeeded | Failed`; a failed task with
/// retry budget left is reset to `Pending`. `Succeeded` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DevTaskPhase {
    #[default]
    Pending,
    Scheduled,
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for DevTaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A unit of work to be executed on some agent pod.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevTask {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub metadata: ObjectMeta,
    pub spec: DevTaskSpec,
    #[serde(default)]
    pub status: DevTaskStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevTaskSpec {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_model: Option<String>,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub timeout_seconds: u64,
    /// Names of tasks in the same project that must succeed first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevTaskStatus {
    #[serde(default)]
    pub phase: DevTaskPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_pod: Option<String>,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl_object!(DevTask, KIND_DEV_TASK);

// ---------------------------------------------------------------------------
// Resource (kind-erased)
// ---------------------------------------------------------------------------

/// A resource of any kind, as produced by manifest parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Project(Project),
    AgentPod(AgentPod),
    AgentPool(AgentPool),
    DevTask(DevTask),
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Project(_) => KIND_PROJECT,
            Self::AgentPod(_) => KIND_AGENT_POD,
            Self::AgentPool(_) => KIND_AGENT_POOL,
            Self::DevTask(_) => KIND_DEV_TASK,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Project(r) => &r.metadata.name,
            Self::AgentPod(r) => &r.metadata.name,
            Self::AgentPool(r) => &r.metadata.name,
            Self::DevTask(r) => &r.metadata.name,
        }
    }
}

// ---------------------------------------------------------------------------
// Watch events
// ---------------------------------------------------------------------------

/// The type of a store mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Added,
    Modified,
    Deleted,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "ADDED"),
            Self::Modified => write!(f, "MODIFIED"),
            Self::Deleted => write!(f, "DELETED"),
        }
    }
}

/// Emitted on every store mutation, carrying a snapshot of the object at
/// the moment of the mutation (for DELETED, the prior value).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub kind: String,
    pub key: String,
    pub object: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------

/// A single log line from an agent pod.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub pod_name: String,
    pub level: String,
    pub message: String,
}
