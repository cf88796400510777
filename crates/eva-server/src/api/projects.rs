//! Projects API - /api/projects
//!
//! GET  /api/projects - List all projects
//! POST /api/projects - Create or replace a project (keyed by name)
//! GET  /api/projects/{name} - Get one project

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::Value;

use eva_core::workflow::Project;
use eva_core::ServerError;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_projects).post(save_project))
        .route("/{name}", get(get_project))
}

async fn list_projects(State(state): State<AppState>) -> Json<Vec<Project>> {
    Json(state.project_store.list().await)
}

async fn get_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Project>, ServerError> {
    state.project_store.require(&name).await.map(Json)
}

async fn save_project(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ServerError> {
    let has_name = body
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|name| !name.is_empty());
    if !has_name {
        return Err(ServerError::BadRequest("Invalid data".to_string()));
    }

    let mut project: Project = serde_json::from_value(body)
        .map_err(|e| ServerError::BadRequest(format!("Invalid project: {}", e)))?;

    let is_new = state.project_store.is_new(&project.name).await;
    if is_new && project.use_custom_prompt == Some(false) {
        project.system_prompt = Some(state.prompt_store.system_prompt().await);
    }

    // Any non-empty prompt at this point pins the project to it.
    if project.system_prompt.as_deref().is_some_and(|p| !p.is_empty()) {
        project.use_custom_prompt = Some(true);
    }

    tracing::info!(
        "[Projects] Saving '{}' ({} step(s), new: {})",
        project.name,
        project.steps.len(),
        is_new
    );
    state.project_store.save(project).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
