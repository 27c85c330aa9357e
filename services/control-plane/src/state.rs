//! Application state shared across request handlers.

use std::sync::Arc;

use orca_store::Store;

use crate::runtime::AgentRuntime;

/// Shared application state, passed to handlers via axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<Store>,
    runtime: Arc<AgentRuntime>,
}

impl AppState {
    pub fn new(store: Arc<Store>, runtime: Arc<AgentRuntime>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { store, runtime }),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.inner.store
    }

    pub fn runtime(&self) -> &Arc<AgentRuntime> {
        &self.inner.runtime
    }
}
