//! AgentPod endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use orca_api::{
    kind_prefix, project_prefix, resource_key, AgentPod, AgentPodPhase, LogEntry, KIND_AGENT_POD,
};

use crate::api::error::ApiError;
use crate::state::AppState;

use super::{finalize_new, preserve_immutable, ProjectScope};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_pods).post(create_pod))
        .route("/{name}", get(get_pod).put(update_pod).delete(delete_pod))
        .route("/{name}/logs", get(get_logs))
}

async fn create_pod(
    State(state): State<AppState>,
    Query(scope): Query<ProjectScope>,
    Json(mut pod): Json<AgentPod>,
) -> Result<impl IntoResponse, ApiError> {
    if pod.metadata.name.is_empty() {
        return Err(ApiError::bad_request("metadata.name is required"));
    }

    let project = scope
        .project
        .clone()
        .filter(|p| !p.is_empty())
        .or_else(|| Some(pod.metadata.project.clone()).filter(|p| !p.is_empty()))
        .ok_or_else(|| {
            ApiError::bad_request("project is required (query param or metadata.project)")
        })?;

    pod.metadata.project = project.clone();
    finalize_new(&mut pod);
    pod.status.phase = AgentPodPhase::Pending;

    let key = resource_key(KIND_AGENT_POD, &project, &pod.metadata.name);
    state
        .store()
        .create(&key, &pod)
        .map_err(|err| ApiError::from_store(err, "agentpod"))?;

    Ok((StatusCode::CREATED, Json(pod)))
}

async fn list_pods(
    State(state): State<AppState>,
    Query(scope): Query<ProjectScope>,
) -> Result<impl IntoResponse, ApiError> {
    let prefix = match scope.project.as_deref() {
        Some(project) if !project.is_empty() => project_prefix(KIND_AGENT_POD, project),
        _ => kind_prefix(KIND_AGENT_POD),
    };
    let pods: Vec<AgentPod> = state
        .store()
        .list(&prefix)
        .map_err(|err| ApiError::from_store(err, "agentpod"))?;
    Ok(Json(pods))
}

async fn get_pod(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(scope): Query<ProjectScope>,
) -> Result<impl IntoResponse, ApiError> {
    let project = scope.required()?;
    let pod: AgentPod = state
        .store()
        .get(&resource_key(KIND_AGENT_POD, project, &name))
        .map_err(|err| ApiError::from_store(err, "agentpod"))?;
    Ok(Json(pod))
}

async fn update_pod(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(scope): Query<ProjectScope>,
    Json(mut pod): Json<AgentPod>,
) -> Result<impl IntoResponse, ApiError> {
    let project = scope.required()?;
    let key = resource_key(KIND_AGENT_POD, project, &name);

    let existing: AgentPod = state
        .store()
        .get(&key)
        .map_err(|err| ApiError::from_store(err, "agentpod"))?;

    pod.metadata.name = name;
    pod.metadata.project = project.to_string();
    preserve_immutable(&mut pod, &existing);

    state
        .store()
        .update(&key, &pod)
        .map_err(|err| ApiError::from_store(err, "agentpod"))?;
    Ok(Json(pod))
}

async fn delete_pod(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(scope): Query<ProjectScope>,
) -> Result<impl IntoResponse, ApiError> {
    let project = scope.required()?;
    state
        .store()
        .delete(&resource_key(KIND_AGENT_POD, project, &name))
        .map_err(|err| ApiError::from_store(err, "agentpod"))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Durable log collection is out of scope; the endpoint exists so clients
/// have a stable surface.
async fn get_logs(
    Path(_name): Path<String>,
    Query(_scope): Query<ProjectScope>,
) -> Json<Vec<LogEntry>> {
    Json(Vec::new())
}
