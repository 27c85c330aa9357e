//! AgentPool endpoints, including the scale subresource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use orca_api::{
    kind_prefix, project_prefix, resource_key, AgentPool, AgentPoolStatus, KIND_AGENT_POOL,
};

use crate::api::error::ApiError;
use crate::state::AppState;

use super::{finalize_new, preserve_immutable, ProjectScope};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_pools).post(create_pool))
        .route(
            "/{name}",
            get(get_pool).put(update_pool).delete(delete_pool),
        )
        .route("/{name}/scale", put(scale_pool))
}

async fn create_pool(
    State(state): State<AppState>,
    Query(scope): Query<ProjectScope>,
    Json(mut pool): Json<AgentPool>,
) -> Result<impl IntoResponse, ApiError> {
    if pool.metadata.name.is_empty() {
        return Err(ApiError::bad_request("metadata.name is required"));
    }

    let project = scope
        .project
        .clone()
        .filter(|p| !p.is_empty())
        .or_else(|| Some(pool.metadata.project.clone()).filter(|p| !p.is_empty()))
        .ok_or_else(|| {
            ApiError::bad_request("project is required (query param or metadata.project)")
        })?;

    pool.metadata.project = project.clone();
    finalize_new(&mut pool);
    pool.status = AgentPoolStatus::default();

    let key = resource_key(KIND_AGENT_POOL, &project, &pool.metadata.name);
    state
        .store()
        .create(&key, &pool)
        .map_err(|err| ApiError::from_store(err, "agentpool"))?;

    Ok((StatusCode::CREATED, Json(pool)))
}

async fn list_pools(
    State(state): State<AppState>,
    Query(scope): Query<ProjectScope>,
) -> Result<impl IntoResponse, ApiError> {
    let prefix = match scope.project.as_deref() {
        Some(project) if !project.is_empty() => project_prefix(KIND_AGENT_POOL, project),
        _ => kind_prefix(KIND_AGENT_POOL),
    };
    let pools: Vec<AgentPool> = state
        .store()
        .list(&prefix)
        .map_err(|err| ApiError::from_store(err, "agentpool"))?;
    Ok(Json(pools))
}

async fn get_pool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(scope): Query<ProjectScope>,
) -> Result<impl IntoResponse, ApiError> {
    let project = scope.required()?;
    let pool: AgentPool = state
        .store()
        .get(&resource_key(KIND_AGENT_POOL, project, &name))
        .map_err(|err| ApiError::from_store(err, "agentpool"))?;
    Ok(Json(pool))
}

async fn update_pool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(scope): Query<ProjectScope>,
    Json(mut pool): Json<AgentPool>,
) -> Result<impl IntoResponse, ApiError> {
    let project = scope.required()?;
    let key = resource_key(KIND_AGENT_POOL, project, &name);

    let existing: AgentPool = state
        .store()
        .get(&key)
        .map_err(|err| ApiError::from_store(err, "agentpool"))?;

    pool.metadata.name = name;
    pool.metadata.project = project.to_string();
    preserve_immutable(&mut pool, &existing);

    state
        .store()
        .update(&key, &pool)
        .map_err(|err| ApiError::from_store(err, "agentpool"))?;
    Ok(Json(pool))
}

async fn delete_pool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(scope): Query<ProjectScope>,
) -> Result<impl IntoResponse, ApiError> {
    let project = scope.required()?;
    state
        .store()
        .delete(&resource_key(KIND_AGENT_POOL, project, &name))
        .map_err(|err| ApiError::from_store(err, "agentpool"))?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct ScaleRequest {
    replicas: i64,
}

/// Update only the replica count of a pool.
async fn scale_pool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(scope): Query<ProjectScope>,
    Json(body): Json<ScaleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let project = scope.required()?;
    if body.replicas < 0 {
        return Err(ApiError::bad_request("replicas must be >= 0"));
    }

    let key = resource_key(KIND_AGENT_POOL, project, &name);
    let mut pool: AgentPool = state
        .store()
        .get(&key)
        .map_err(|err| ApiError::from_store(err, "agentpool"))?;

    pool.spec.replicas = body.replicas as u32;
    pool.metadata.updated_at = Some(Utc::now());

    state
        .store()
        .update(&key, &pool)
        .map_err(|err| ApiError::from_store(err, "agentpool"))?;
    Ok(Json(pool))
}
