//! Eva Server — HTTP backend for the Eva automation assistant.
//!
//! Exposes the eva-core workflow engine over a small JSON + SSE API:
//! - project CRUD backed by the JSON project store
//! - `/api/chat_stream`, which runs a project's steps and streams events
//! - prompt settings and the in-memory run log
//!
//! The server can run standalone (`eva server`) or be embedded with a
//! pre-built `AppState`.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use eva_core::state::{AppState, AppStateInner};
use eva_core::agent::{AgentConfig, DEFAULT_IDLE_TIMEOUT};

/// Configuration for the Eva backend server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// JSON file holding the project list
    pub projects_path: String,
    /// JSON file holding the global prompt settings
    pub prompts_path: String,
    /// Installation directory of the automation agent
    pub agent_dir: Option<String>,
    /// Idle window before a silent agent invocation is killed
    pub idle_timeout: Duration,
    /// Optional path to static frontend files.
    /// When set, the server serves these files for all non-API routes.
    pub static_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            projects_path: "projects.json".to_string(),
            prompts_path: "prompts.json".to_string(),
            agent_dir: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            static_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn agent_config(&self) -> AgentConfig {
        let config = AgentConfig::default().with_idle_timeout(self.idle_timeout);
        match &self.agent_dir {
            Some(dir) => config.with_install_dir(dir),
            None => config,
        }
    }
}

/// Create a shared `AppState` from the configured files and agent settings.
pub async fn create_app_state(config: &ServerConfig) -> Result<AppState, String> {
    let inner = AppStateInner::open(
        &config.projects_path,
        &config.prompts_path,
        config.agent_config(),
    )
    .await
    .map_err(|e| format!("Failed to initialize state: {}", e))?;

    if !inner.launcher.is_available() {
        tracing::warn!(
            "{} is not available (install dir: {:?}); steps will report unavailable",
            inner.launcher.display_name(),
            inner.agent_config.install_dir
        );
    }

    Ok(Arc::new(inner))
}

/// Start the Eva backend server.
///
/// Returns the actual address the server is listening on.
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    // The CLI may already have installed a subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eva_server=info,eva_core=info,tower_http=info".into()),
        )
        .try_init();

    tracing::info!("Starting Eva backend server on {}:{}", config.host, config.port);

    let state = create_app_state(&config).await?;

    start_server_with_state(config, state).await
}

/// Build the full application router (API, health check, optional static files).
pub fn build_app(state: AppState, static_dir: Option<&str>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .merge(api::api_router())
        .route("/api/health", axum::routing::get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if let Some(static_dir) = static_dir {
        let static_path = std::path::Path::new(static_dir);
        if static_path.is_dir() {
            tracing::info!("Serving static frontend from: {}", static_dir);
            let serve_dir = tower_http::services::ServeDir::new(static_dir)
                .not_found_service(tower_http::services::ServeFile::new(
                    static_path.join("index.html"),
                ));
            app = app.fallback_service(serve_dir);
        } else {
            tracing::warn!(
                "Static directory not found: {}. Frontend won't be served.",
                static_dir
            );
        }
    }

    app
}

/// Start the HTTP server with a pre-built `AppState`.
pub async fn start_server_with_state(
    config: ServerConfig,
    state: AppState,
) -> Result<SocketAddr, String> {
    let app = build_app(state, config.static_dir.as_deref());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("Eva backend server listening on {}", local_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "eva-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
