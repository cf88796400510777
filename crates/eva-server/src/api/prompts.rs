//! Prompts API - /api/prompts
//!
//! GET  /api/prompts - Current global prompt settings
//! POST /api/prompts - Replace them and push the system prompt to every
//!                     project that does not use its own

use axum::{extract::State, routing::get, Json, Router};
use serde_json::Value;

use eva_core::store::PromptSettings;
use eva_core::ServerError;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_prompts).post(save_prompts))
}

async fn get_prompts(State(state): State<AppState>) -> Json<PromptSettings> {
    Json(state.prompt_store.get().await)
}

async fn save_prompts(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ServerError> {
    let empty = match &body {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        return Err(ServerError::BadRequest("No data provided".to_string()));
    }

    let settings: PromptSettings = serde_json::from_value(body)
        .map_err(|e| ServerError::BadRequest(format!("Invalid prompts: {}", e)))?;
    let system_prompt = settings.system_prompt.clone();

    state.prompt_store.save(settings).await?;
    let updated = state.project_store.apply_global_prompt(&system_prompt).await?;
    tracing::info!("[Prompts] Saved; system prompt applied to {} project(s)", updated);

    Ok(Json(serde_json::json!({ "success": true })))
}
