//! Generic create-or-update.
//!
//! `POST /api/v1alpha1/apply` accepts any resource body with a `kind`
//! field. Existing resources are updated in place; `uid` and `createdAt`
//! are preserved so applying the same manifest twice is idempotent.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;

use orca_api::{
    AgentPod, AgentPodPhase, AgentPool, AgentPoolStatus, DevTask, DevTaskPhase, Object, Project,
    TypeMeta, KIND_AGENT_POD, KIND_AGENT_POOL, KIND_DEV_TASK, KIND_PROJECT,
};

use crate::api::error::ApiError;
use crate::state::AppState;

use super::{finalize_new, preserve_immutable};

pub async fn apply(
    State(state): State<AppState>,
    Json(raw): Json<serde_json::Value>,
) -> Result<Response, ApiError> {
    let meta: TypeMeta = serde_json::from_value(raw.clone())
        .map_err(|err| ApiError::bad_request(format!("cannot determine resource kind: {err}")))?;

    match meta.kind.as_str() {
        KIND_PROJECT => {
            upsert::<Project>(&state, raw, false, |project| {
                if project.status.is_empty() {
                    project.status = "Active".to_string();
                }
            })
            .await
        }
        KIND_AGENT_POD => {
            upsert::<AgentPod>(&state, raw, true, |pod| {
                pod.status.phase = AgentPodPhase::Pending;
            })
            .await
        }
        KIND_AGENT_POOL => {
            upsert::<AgentPool>(&state, raw, true, |pool| {
                pool.status = AgentPoolStatus::default();
            })
            .await
        }
        KIND_DEV_TASK => {
            upsert::<DevTask>(&state, raw, true, |task| {
                task.status.phase = DevTaskPhase::Pending;
            })
            .await
        }
        other => Err(ApiError::bad_request(format!("unsupported kind: {other}"))),
    }
}

/// Create the resource, or update it in place when it already exists.
async fn upsert<T>(
    state: &AppState,
    raw: serde_json::Value,
    project_required: bool,
    init_status: impl FnOnce(&mut T),
) -> Result<Response, ApiError>
where
    T: Object + Serialize + DeserializeOwned,
{
    let mut resource: T = serde_json::from_value(raw)
        .map_err(|err| ApiError::bad_request(err.to_string()))?;

    if resource.metadata().name.is_empty() {
        return Err(ApiError::bad_request("metadata.name is required"));
    }
    if project_required && resource.metadata().project.is_empty() {
        return Err(ApiError::bad_request(format!(
            "metadata.project is required for {}",
            T::KIND
        )));
    }

    let key = resource.key();
    let resource_label = T::KIND.to_lowercase();

    match state.store().get::<T>(&key) {
        Err(err) if err.is_not_found() => {
            finalize_new(&mut resource);
            init_status(&mut resource);
            state
                .store()
                .create(&key, &resource)
                .map_err(|err| ApiError::from_store(err, &resource_label))?;
            Ok((StatusCode::CREATED, Json(resource)).into_response())
        }
        Err(err) => Err(ApiError::from_store(err, &resource_label)),
        Ok(existing) => {
            preserve_immutable(&mut resource, &existing);
            state
                .store()
                .update(&key, &resource)
                .map_err(|err| ApiError::from_store(err, &resource_label))?;
            Ok((StatusCode::OK, Json(resource)).into_response())
        }
    }
}
