//! DevTask endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use orca_api::{
    kind_prefix, project_prefix, resource_key, DevTask, DevTaskPhase, KIND_DEV_TASK,
};

use crate::api::error::ApiError;
use crate::state::AppState;

use super::{finalize_new, preserve_immutable, ProjectScope};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route(
            "/{name}",
            get(get_task).put(update_task).delete(delete_task),
        )
}

async fn create_task(
    State(state): State<AppState>,
    Query(scope): Query<ProjectScope>,
    Json(mut task): Json<DevTask>,
) -> Result<impl IntoResponse, ApiError> {
    if task.metadata.name.is_empty() {
        return Err(ApiError::bad_request("metadata.name is required"));
    }

    let project = scope
        .project
        .clone()
        .filter(|p| !p.is_empty())
        .or_else(|| Some(task.metadata.project.clone()).filter(|p| !p.is_empty()))
        .ok_or_else(|| {
            ApiError::bad_request("project is required (query param or metadata.project)")
        })?;

    task.metadata.project = project.clone();
    finalize_new(&mut task);
    task.status.phase = DevTaskPhase::Pending;

    let key = resource_key(KIND_DEV_TASK, &project, &task.metadata.name);
    state
        .store()
        .create(&key, &task)
        .map_err(|err| ApiError::from_store(err, "devtask"))?;

    Ok((StatusCode::CREATED, Json(task)))
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(scope): Query<ProjectScope>,
) -> Result<impl IntoResponse, ApiError> {
    let prefix = match scope.project.as_deref() {
        Some(project) if !project.is_empty() => project_prefix(KIND_DEV_TASK, project),
        _ => kind_prefix(KIND_DEV_TASK),
    };
    let tasks: Vec<DevTask> = state
        .store()
        .list(&prefix)
        .map_err(|err| ApiError::from_store(err, "devtask"))?;
    Ok(Json(tasks))
}

async fn get_task(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(scope): Query<ProjectScope>,
) -> Result<impl IntoResponse, ApiError> {
    let project = scope.required()?;
    let task: DevTask = state
        .store()
        .get(&resource_key(KIND_DEV_TASK, project, &name))
        .map_err(|err| ApiError::from_store(err, "devtask"))?;
    Ok(Json(task))
}

async fn update_task(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(scope): Query<ProjectScope>,
    Json(mut task): Json<DevTask>,
) -> Result<impl IntoResponse, ApiError> {
    let project = scope.required()?;
    let key = resource_key(KIND_DEV_TASK, project, &name);

    let existing: DevTask = state
        .store()
        .get(&key)
        .map_err(|err| ApiError::from_store(err, "devtask"))?;

    task.metadata.name = name;
    task.metadata.project = project.to_string();
    preserve_immutable(&mut task, &existing);

    state
        .store()
        .update(&key, &task)
        .map_err(|err| ApiError::from_store(err, "devtask"))?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(scope): Query<ProjectScope>,
) -> Result<impl IntoResponse, ApiError> {
    let project = scope.required()?;
    state
        .store()
        .delete(&resource_key(KIND_DEV_TASK, project, &name))
        .map_err(|err| ApiError::from_store(err, "devtask"))?;
    Ok(StatusCode::NO_CONTENT)
}
