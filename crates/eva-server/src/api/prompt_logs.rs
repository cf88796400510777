//! Prompt Logs API - /api/prompt_logs
//!
//! GET /api/prompt_logs - Entries recorded since the last chat request

use axum::{extract::State, routing::get, Json, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_prompt_logs))
}

async fn get_prompt_logs(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "logs": state.prompt_log.entries() }))
}
