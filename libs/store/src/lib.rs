//! Key-value persistence for orca resources.
//!
//! Keys follow the convention `/{kind}/{project}/{name}`. Values are stored
//! as JSON blobs; callers read and write typed resources through the
//! serde-generic methods on [`Store`]. Two interchangeable backends exist:
//! an in-memory map for tests and ephemeral runs, and a single-file SQLite
//! database for production.
//!
//! # Concurrency
//!
//! CRUD operations are linearizable: every mutation holds the store's
//! mutation lock across the backend write and the watch notification, so
//! watchers observe events in mutation order per key. Watch delivery is
//! best-effort — each subscriber has a bounded buffer and events are
//! dropped for subscribers that fall behind. Reconcilers re-read
//! authoritative state on every invocation, so a dropped notification
//! delays convergence without corrupting it.

mod memory;
mod sqlite;
mod watch;

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use orca_api::{kind_from_key, EventType, WatchEvent};

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
pub use watch::{WatchHandle, WatchReceiver};

use watch::WatchHub;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key already exists: {0}")]
    AlreadyExists(String),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("encoding value: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

/// Raw byte-level persistence. Implementations only deal in opaque blobs;
/// serialization and watch fan-out live in [`Store`].
pub trait StoreBackend: Send + Sync {
    /// Insert a new key. Fails with `AlreadyExists` if present.
    fn insert(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Fetch the value at a key. Fails with `NotFound` if absent.
    fn fetch(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Replace the value at an existing key. Fails with `NotFound` if absent.
    fn replace(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Remove a key, returning the prior value. Fails with `NotFound`.
    fn remove(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Return every value whose key starts with `prefix`.
    fn scan(&self, prefix: &str) -> Result<Vec<Vec<u8>>, StoreError>;
}

/// The typed store facade over a backend plus the watch hub.
pub struct Store {
    backend: Box<dyn StoreBackend>,
    hub: Arc<WatchHub>,
    // Held across each mutation and its notification so that watch events
    // are delivered in mutation order.
    mutation: Mutex<()>,
}

impl Store {
    /// Create a store over the in-memory backend.
    pub fn in_memory() -> Self {
        Self::with_backend(Box::new(MemoryBackend::new()))
    }

    /// Open (or create) a SQLite-backed store at the given file path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self::with_backend(Box::new(SqliteBackend::open(path)?)))
    }

    fn with_backend(backend: Box<dyn StoreBackend>) -> Self {
        Self {
            backend,
            hub: Arc::new(WatchHub::new()),
            mutation: Mutex::new(()),
        }
    }

    /// Store a new object at `key`. Emits `ADDED`.
    pub fn create<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_vec(value)?;
        let snapshot = serde_json::to_value(value)?;

        let _guard = self.mutation.lock();
        self.backend.insert(key, &raw)?;
        self.hub.notify(WatchEvent {
            event_type: EventType::Added,
            kind: kind_from_key(key).to_string(),
            key: key.to_string(),
            object: snapshot,
        });
        Ok(())
    }

    /// Retrieve the object stored at `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, StoreError> {
        let raw = self.backend.fetch(key)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Replace the object at `key`. Emits `MODIFIED`.
    pub fn update<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_vec(value)?;
        let snapshot = serde_json::to_value(value)?;

        let _guard = self.mutation.lock();
        self.backend.replace(key, &raw)?;
        self.hub.notify(WatchEvent {
            event_type: EventType::Modified,
            kind: kind_from_key(key).to_string(),
            key: key.to_string(),
            object: snapshot,
        });
        Ok(())
    }

    /// Remove the object at `key`. Emits `DELETED` carrying the prior value.
    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.mutation.lock();
        let raw = self.backend.remove(key)?;
        let prior = serde_json::from_slice(&raw).unwrap_or(serde_json::Value::Null);
        self.hub.notify(WatchEvent {
            event_type: EventType::Deleted,
            kind: kind_from_key(key).to_string(),
            key: key.to_string(),
            object: prior,
        });
        Ok(())
    }

    /// Return every object whose key starts with `prefix`, in unspecified
    /// order. Entries that fail to decode as `T` are reported as errors.
    pub fn list<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>, StoreError> {
        let raws = self.backend.scan(prefix)?;
        let mut out = Vec::with_capacity(raws.len());
        for raw in raws {
            out.push(serde_json::from_slice(&raw)?);
        }
        Ok(out)
    }

    /// Subscribe to mutations under `prefix`. Returns a bounded event
    /// stream and a cancel handle; cancelling (idempotent) deregisters the
    /// subscriber and closes the stream.
    pub fn watch(&self, prefix: &str) -> (WatchReceiver, WatchHandle) {
        WatchHub::subscribe(&self.hub, prefix)
    }

    /// Close all watch streams. The backing storage is released when the
    /// store is dropped.
    pub fn close(&self) {
        self.hub.close();
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.hub.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use orca_api::{
        resource_key, AgentPod, AgentPodSpec, ObjectMeta, TypeMeta, KIND_AGENT_POD,
    };

    fn test_pod(name: &str, project: &str, model: &str) -> AgentPod {
        AgentPod {
            type_meta: TypeMeta::new(KIND_AGENT_POD),
            metadata: ObjectMeta {
                name: name.into(),
                project: project.into(),
                ..Default::default()
            },
            spec: AgentPodSpec {
                model: model.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn pod_key(project: &str, name: &str) -> String {
        resource_key(KIND_AGENT_POD, project, name)
    }

    #[test]
    fn create_then_get() {
        let store = Store::in_memory();
        let key = pod_key("default", "test-pod");
        store
            .create(&key, &test_pod("test-pod", "default", "claude-sonnet"))
            .expect("create");

        let got: AgentPod = store.get(&key).expect("get");
        assert_eq!(got.metadata.name, "test-pod");
        assert_eq!(got.spec.model, "claude-sonnet");
    }

    #[test]
    fn create_duplicate_fails() {
        let store = Store::in_memory();
        let key = pod_key("default", "dup-pod");
        let pod = test_pod("dup-pod", "default", "claude-sonnet");

        store.create(&key, &pod).expect("first create");
        let err = store.create(&key, &pod).unwrap_err();
        assert!(err.is_already_exists(), "got {err}");
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = Store::in_memory();
        let err = store
            .get::<AgentPod>(&pod_key("default", "nonexistent"))
            .unwrap_err();
        assert!(err.is_not_found(), "got {err}");
    }

    #[test]
    fn update_replaces_value() {
        let store = Store::in_memory();
        let key = pod_key("default", "update-pod");
        store
            .create(&key, &test_pod("update-pod", "default", "claude-sonnet"))
            .expect("create");

        let mut updated = test_pod("update-pod", "default", "claude-opus");
        updated.spec.max_concurrency = 10;
        store.update(&key, &updated).expect("update");

        let got: AgentPod = store.get(&key).expect("get");
        assert_eq!(got.spec.model, "claude-opus");
        assert_eq!(got.spec.max_concurrency, 10);
    }

    #[test]
    fn update_missing_is_not_found() {
        let store = Store::in_memory();
        let err = store
            .update(
                &pod_key("default", "ghost-pod"),
                &test_pod("ghost-pod", "default", "claude-sonnet"),
            )
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn delete_removes_key() {
        let store = Store::in_memory();
        let key = pod_key("default", "delete-pod");
        store
            .create(&key, &test_pod("delete-pod", "default", "claude-sonnet"))
            .expect("create");

        store.delete(&key).expect("delete");
        assert!(store.get::<AgentPod>(&key).unwrap_err().is_not_found());
        assert!(store.delete(&key).unwrap_err().is_not_found());
    }

    #[test]
    fn list_scopes_by_prefix() {
        let store = Store::in_memory();
        for (name, project) in [
            ("pod-1", "proj-a"),
            ("pod-2", "proj-a"),
            ("pod-3", "proj-b"),
        ] {
            store
                .create(&pod_key(project, name), &test_pod(name, project, "m"))
                .expect("create");
        }

        let a: Vec<AgentPod> = store.list("/AgentPod/proj-a/").expect("list a");
        assert_eq!(a.len(), 2);
        let all: Vec<AgentPod> = store.list("/AgentPod/").expect("list all");
        assert_eq!(all.len(), 3);
        let none: Vec<AgentPod> = store.list("/DevTask/").expect("list none");
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn watch_delivers_events_in_order() {
        let store = Store::in_memory();
        let (mut rx, handle) = store.watch("/AgentPod/");

        let key = pod_key("default", "watched");
        let pod = test_pod("watched", "default", "m");
        store.create(&key, &pod).expect("create");
        store.update(&key, &pod).expect("update");
        store.delete(&key).expect("delete");

        let types: Vec<_> = [
            rx.recv().await.expect("added"),
            rx.recv().await.expect("modified"),
            rx.recv().await.expect("deleted"),
        ]
        .into_iter()
        .map(|e| e.event_type)
        .collect();
        assert_eq!(
            types,
            vec![EventType::Added, EventType::Modified, EventType::Deleted]
        );

        handle.cancel();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn watch_filters_by_prefix() {
        let store = Store::in_memory();
        let (mut rx, _handle) = store.watch("/DevTask/");

        store
            .create(
                &pod_key("default", "noise"),
                &test_pod("noise", "default", "m"),
            )
            .expect("create pod");
        store.close();

        // Only the stream closing is observed; the pod event was filtered.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn deleted_event_carries_prior_value() {
        let store = Store::in_memory();
        let (mut rx, _handle) = store.watch("/AgentPod/");

        let key = pod_key("default", "doomed");
        store
            .create(&key, &test_pod("doomed", "default", "claude-haiku"))
            .expect("create");
        store.delete(&key).expect("delete");

        let _added = rx.recv().await.expect("added");
        let deleted = rx.recv().await.expect("deleted");
        assert_eq!(deleted.event_type, EventType::Deleted);
        assert_eq!(deleted.object["spec"]["model"], "claude-haiku");
    }

    #[test]
    fn cancel_is_idempotent() {
        let store = Store::in_memory();
        let (_rx, handle) = store.watch("/AgentPod/");
        handle.cancel();
        handle.cancel();
    }

    #[test]
    fn sqlite_backend_parity() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("orca.db");

        {
            let store = Store::open(&path).expect("open");
            let key = pod_key("default", "persisted");
            store
                .create(&key, &test_pod("persisted", "default", "claude-sonnet"))
                .expect("create");

            let err = store
                .create(&key, &test_pod("persisted", "default", "claude-sonnet"))
                .unwrap_err();
            assert!(err.is_already_exists(), "got {err}");
        }

        // Reopen: data survives the file handle.
        let store = Store::open(&path).expect("reopen");
        let got: AgentPod = store
            .get(&pod_key("default", "persisted"))
            .expect("get after reopen");
        assert_eq!(got.spec.model, "claude-sonnet");

        let listed: Vec<AgentPod> = store.list("/AgentPod/default/").expect("list");
        assert_eq!(listed.len(), 1);
    }
}
