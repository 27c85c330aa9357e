//! Versioned resource endpoints.
//!
//! Project-scoped resources (`agentpods`, `agentpools`, `devtasks`) take a
//! `project` query parameter: required for per-name reads and writes,
//! optional for list (omission lists across all projects).

mod agent_pods;
mod agent_pools;
mod apply;
mod dev_tasks;
mod projects;

use axum::routing::post;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use orca_api::{Object, API_VERSION};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/projects", projects::routes())
        .nest("/agentpods", agent_pods::routes())
        .nest("/agentpools", agent_pools::routes())
        .nest("/devtasks", dev_tasks::routes())
        .route("/apply", post(apply::apply))
}

/// `?project=` scope for reads and writes of project-scoped resources.
#[derive(Debug, Deserialize)]
struct ProjectScope {
    #[serde(default)]
    project: Option<String>,
}

impl ProjectScope {
    fn required(&self) -> Result<&str, super::error::ApiError> {
        match self.project.as_deref() {
            Some(project) if !project.is_empty() => Ok(project),
            _ => Err(super::error::ApiError::bad_request(
                "project query param is required",
            )),
        }
    }
}

/// Stamp server-assigned fields on a newly created resource.
fn finalize_new<T: Object>(resource: &mut T) {
    let type_meta = resource.type_meta_mut();
    type_meta.api_version = API_VERSION.to_string();
    type_meta.kind = T::KIND.to_string();

    let now = Utc::now();
    let meta = resource.metadata_mut();
    meta.uid = Uuid::new_v4().to_string();
    meta.created_at = Some(now);
    meta.updated_at = Some(now);
}

/// Carry immutable fields over from the stored copy onto an update.
fn preserve_immutable<T: Object>(resource: &mut T, existing: &T) {
    let type_meta = resource.type_meta_mut();
    type_meta.api_version = API_VERSION.to_string();
    type_meta.kind = T::KIND.to_string();

    let (uid, created_at) = {
        let existing_meta = existing.metadata();
        (existing_meta.uid.clone(), existing_meta.created_at)
    };
    let meta = resource.metadata_mut();
    meta.uid = uid;
    meta.created_at = created_at;
    meta.updated_at = Some(Utc::now());
}
