//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses
//! the eva-core domain logic through `AppState`.

pub mod agent;
pub mod project;
pub mod run;
pub mod server;

use eva_core::state::AppState;
use eva_server::ServerConfig;

/// Build the shared `AppState` from the CLI's file and agent settings.
pub async fn init_state(config: &ServerConfig) -> Result<AppState, String> {
    eva_server::create_app_state(config).await
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
