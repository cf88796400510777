//! File-backed stores for projects and prompt settings.

pub mod project_store;
pub mod prompt_store;

pub use project_store::ProjectStore;
pub use prompt_store::{PromptSettings, PromptStore, DEFAULT_OCR_PROMPT};
