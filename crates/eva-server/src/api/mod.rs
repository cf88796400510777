pub mod agent;
pub mod chat;
pub mod projects;
pub mod prompt_logs;
pub mod prompts;

use axum::Router;

use crate::AppState;

/// Build the complete API router with all sub-routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/api/projects", projects::router())
        .nest("/api/chat_stream", chat::router())
        .nest("/api/prompt_logs", prompt_logs::router())
        .nest("/api/prompts", prompts::router())
        .nest("/api/agent", agent::router())
}
