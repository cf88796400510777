//! Chat Stream API - /api/chat_stream
//!
//! POST /api/chat_stream - Run the selected project's steps, streaming
//! orchestration events as SSE `data:` frames.

use axum::{
    extract::State,
    http::{header, HeaderName},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::convert::Infallible;
use std::pin::Pin;
use tokio_stream::StreamExt;

use eva_core::workflow::{OrchestrationEvent, Project};
use eva_core::{RunLogger, ServerError};

use crate::AppState;

type SseStream = Pin<Box<dyn tokio_stream::Stream<Item = Result<Event, Infallible>> + Send>>;

const NO_STEPS_MESSAGE: &str = "No project or steps found.";

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(chat_stream))
}

#[derive(Debug, Deserialize)]
struct ChatStreamRequest {
    #[serde(default)]
    message: String,
    #[serde(default)]
    project: Option<Value>,
    #[serde(default)]
    chat_history: Vec<Value>,
}

fn to_event(event: &OrchestrationEvent) -> Event {
    Event::default().data(serde_json::to_string(event).unwrap_or_default())
}

async fn chat_stream(
    State(state): State<AppState>,
    Json(body): Json<ChatStreamRequest>,
) -> Result<Response, ServerError> {
    if body.message.is_empty() {
        return Err(ServerError::BadRequest("No message".to_string()));
    }

    let posted = body
        .project
        .as_ref()
        .and_then(|p| serde_json::from_value::<Project>(p.clone()).ok());
    let project_name = body
        .project
        .as_ref()
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string);

    state.prompt_log.clear();
    state
        .prompt_log
        .log("SYSTEM", "New request received, logs cleared.", None);
    state.prompt_log.log(
        "USER_MESSAGE",
        &body.message,
        Some(serde_json::json!({
            "project": project_name.as_deref().unwrap_or("None"),
            "historyLength": body.chat_history.len(),
        })),
    );

    // The store copy wins so edits saved after the page loaded are picked up.
    let project = match &project_name {
        Some(name) => state.project_store.get(name).await.or(posted),
        None => posted,
    };

    let stream: SseStream = match project.filter(|p| !p.steps.is_empty()) {
        Some(project) => {
            tracing::info!(
                "[ChatStream] Running '{}' ({} runnable step(s))",
                project.name,
                project.runnable_steps()
            );
            let events = state.orchestrator().run(project.steps);
            Box::pin(events.map(|event| Ok::<_, Infallible>(to_event(&event))))
        }
        None => {
            state.prompt_log.log("ERROR", NO_STEPS_MESSAGE, None);
            let event = OrchestrationEvent::Error {
                message: NO_STEPS_MESSAGE.to_string(),
            };
            Box::pin(tokio_stream::once(Ok::<_, Infallible>(to_event(&event))))
        }
    };

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    )
        .into_response())
}
