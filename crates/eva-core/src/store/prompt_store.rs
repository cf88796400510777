use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::ServerError;

pub const DEFAULT_OCR_PROMPT: &str = "Analyze this image using your vision and OCR and parse the contents and provide them in a neat and structured fashion as per sections.";

/// Global prompt settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSettings {
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default = "default_ocr_prompt")]
    pub ocr_prompt: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_ocr_prompt() -> String {
    DEFAULT_OCR_PROMPT.to_string()
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            ocr_prompt: default_ocr_prompt(),
            extra: Map::new(),
        }
    }
}

pub struct PromptStore {
    path: PathBuf,
    settings: RwLock<PromptSettings>,
}

impl PromptStore {
    /// Load settings from `path`; defaults apply when the file is missing.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ServerError> {
        let path = path.into();
        let settings = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                ServerError::Storage(format!("Invalid prompts file {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PromptSettings::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            settings: RwLock::new(settings),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self) -> PromptSettings {
        self.settings.read().await.clone()
    }

    pub async fn system_prompt(&self) -> String {
        self.settings.read().await.system_prompt.clone()
    }

    /// Replace the settings and write them out.
    ///
    /// Propagating the system prompt to projects is the caller's job
    /// (see [`crate::store::ProjectStore::apply_global_prompt`]).
    pub async fn save(&self, settings: PromptSettings) -> Result<(), ServerError> {
        let mut current = self.settings.write().await;
        let json = serde_json::to_string_pretty(&settings)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, json).await?;
        *current = settings;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = PromptStore::open(dir.path().join("prompts.json")).await.unwrap();
        let settings = store.get().await;
        assert_eq!(settings.system_prompt, "");
        assert_eq!(settings.ocr_prompt, DEFAULT_OCR_PROMPT);
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.json");
        let store = PromptStore::open(&path).await.unwrap();

        let settings = PromptSettings {
            system_prompt: "Be precise.".to_string(),
            ..PromptSettings::default()
        };
        store.save(settings.clone()).await.unwrap();
        assert_eq!(store.system_prompt().await, "Be precise.");

        let reopened = PromptStore::open(&path).await.unwrap();
        assert_eq!(reopened.get().await, settings);
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.json");
        tokio::fs::write(&path, r#"{"system_prompt":"x"}"#).await.unwrap();
        let store = PromptStore::open(&path).await.unwrap();
        assert_eq!(store.get().await.ocr_prompt, DEFAULT_OCR_PROMPT);
    }
}
