//! Shared application state for the HTTP server and the CLI.

use std::path::PathBuf;
use std::sync::Arc;

use crate::agent::{AgentBridge, AgentConfig, AgentLauncher};
use crate::error::ServerError;
use crate::prompt_log::PromptLog;
use crate::store::{ProjectStore, PromptStore};
use crate::workflow::StepOrchestrator;

pub struct AppStateInner {
    pub project_store: ProjectStore,
    pub prompt_store: PromptStore,
    pub prompt_log: Arc<PromptLog>,
    pub launcher: Arc<dyn AgentLauncher>,
    pub agent_config: AgentConfig,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    pub fn new(
        project_store: ProjectStore,
        prompt_store: PromptStore,
        launcher: Arc<dyn AgentLauncher>,
        agent_config: AgentConfig,
    ) -> Self {
        Self {
            project_store,
            prompt_store,
            prompt_log: Arc::new(PromptLog::default()),
            launcher,
            agent_config,
        }
    }

    /// Open both stores and build an [`AgentBridge`] from `agent_config`.
    pub async fn open(
        projects_path: impl Into<PathBuf>,
        prompts_path: impl Into<PathBuf>,
        agent_config: AgentConfig,
    ) -> Result<Self, ServerError> {
        let project_store = ProjectStore::open(projects_path).await?;
        let prompt_store = PromptStore::open(prompts_path).await?;
        let bridge = AgentBridge::new(agent_config.clone())
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        Ok(Self::new(
            project_store,
            prompt_store,
            Arc::new(bridge),
            agent_config,
        ))
    }

    /// Orchestrator wired to this state's launcher and prompt log.
    pub fn orchestrator(&self) -> StepOrchestrator {
        StepOrchestrator::new(self.launcher.clone(), self.prompt_log.clone())
    }
}
