//! Eva core — transport-agnostic backend for driving a desktop-automation agent.
//!
//! This crate contains everything that doesn't depend on HTTP:
//! - `agent`: process bridge that turns one agent invocation into a fragment stream
//! - `workflow`: project/step definitions, output classification, and the step orchestrator
//! - `store`: JSON-file project store and prompt settings
//! - `prompt_log`: bounded run log the orchestrator reports to
//! - `state`: shared state for the server and CLI
//!
//! The HTTP adapter lives in `eva-server`; the terminal front end in `eva-cli`.

pub mod agent;
pub mod error;
pub mod prompt_log;
pub mod state;
pub mod store;
pub mod workflow;

pub use error::ServerError;
pub use prompt_log::{PromptLog, PromptLogEntry, RunLogger, TracingLogger};
pub use state::{AppState, AppStateInner};
