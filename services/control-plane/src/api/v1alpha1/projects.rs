//! Project endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use orca_api::{resource_key, Project, KIND_PROJECT};

use crate::api::error::ApiError;
use crate::state::AppState;

use super::{finalize_new, preserve_immutable};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route(
            "/{name}",
            get(get_project).put(update_project).delete(delete_project),
        )
}

fn project_key(name: &str) -> String {
    resource_key(KIND_PROJECT, "", name)
}

async fn create_project(
    State(state): State<AppState>,
    Json(mut project): Json<Project>,
) -> Result<impl IntoResponse, ApiError> {
    if project.metadata.name.is_empty() {
        return Err(ApiError::bad_request("metadata.name is required"));
    }

    finalize_new(&mut project);
    if project.status.is_empty() {
        project.status = "Active".to_string();
    }

    let key = project_key(&project.metadata.name);
    state
        .store()
        .create(&key, &project)
        .map_err(|err| ApiError::from_store(err, "project"))?;

    Ok((StatusCode::CREATED, Json(project)))
}

async fn list_projects(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let projects: Vec<Project> = state
        .store()
        .list(&orca_api::kind_prefix(KIND_PROJECT))
        .map_err(|err| ApiError::from_store(err, "project"))?;
    Ok(Json(projects))
}

async fn get_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let project: Project = state
        .store()
        .get(&project_key(&name))
        .map_err(|err| ApiError::from_store(err, "project"))?;
    Ok(Json(project))
}

async fn update_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(mut project): Json<Project>,
) -> Result<impl IntoResponse, ApiError> {
    let key = project_key(&name);
    let existing: Project = state
        .store()
        .get(&key)
        .map_err(|err| ApiError::from_store(err, "project"))?;

    project.metadata.name = name;
    preserve_immutable(&mut project, &existing);

    state
        .store()
        .update(&key, &project)
        .map_err(|err| ApiError::from_store(err, "project"))?;
    Ok(Json(project))
}

async fn delete_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store()
        .delete(&project_key(&name))
        .map_err(|err| ApiError::from_store(err, "project"))?;
    Ok(StatusCode::NO_CONTENT)
}
