//! Agent API - /api/agent
//!
//! GET /api/agent/status - Availability probe and launch settings

use axum::{extract::State, routing::get, Json, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/status", get(agent_status))
}

async fn agent_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = &state.agent_config;
    Json(serde_json::json!({
        "name": state.launcher.display_name(),
        "available": state.launcher.is_available(),
        "installDir": config.install_dir.as_ref().map(|d| d.display().to_string()),
        "program": config.program,
        "taskName": config.task_name,
        "idleTimeoutSecs": config.idle_timeout.as_secs(),
    }))
}
