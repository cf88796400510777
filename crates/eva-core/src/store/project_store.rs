use std::path::{Path, PathBuf};

use tokio::sync::RwLock;

use crate::error::ServerError;
use crate::workflow::Project;

/// Projects persisted as a pretty-printed JSON array.
///
/// The whole list is kept in memory; every mutation rewrites the file.
pub struct ProjectStore {
    path: PathBuf,
    projects: RwLock<Vec<Project>>,
}

impl ProjectStore {
    /// Load the store from `path`. A missing file yields an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ServerError> {
        let path = path.into();
        let projects = match tokio::fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => Vec::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                ServerError::Storage(format!("Invalid projects file {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            "[ProjectStore] Loaded {} project(s) from {}",
            projects.len(),
            path.display()
        );
        Ok(Self {
            path,
            projects: RwLock::new(projects),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn list(&self) -> Vec<Project> {
        self.projects.read().await.clone()
    }

    pub async fn get(&self, name: &str) -> Option<Project> {
        self.projects
            .read()
            .await
            .iter()
            .find(|p| p.name == name)
            .cloned()
    }

    /// Like [`get`](Self::get), but a missing project is a `NotFound` error.
    pub async fn require(&self, name: &str) -> Result<Project, ServerError> {
        self.get(name)
            .await
            .ok_or_else(|| ServerError::NotFound(format!("project '{}'", name)))
    }

    pub async fn is_new(&self, name: &str) -> bool {
        !self.projects.read().await.iter().any(|p| p.name == name)
    }

    /// Insert or replace the project with the same name, then persist.
    pub async fn save(&self, project: Project) -> Result<(), ServerError> {
        let mut projects = self.projects.write().await;
        match projects.iter_mut().find(|p| p.name == project.name) {
            Some(existing) => *existing = project,
            None => projects.push(project),
        }
        self.persist(&projects).await
    }

    /// Copy `system_prompt` into every project that does not use its own prompt.
    /// Returns the number of projects updated.
    pub async fn apply_global_prompt(&self, system_prompt: &str) -> Result<usize, ServerError> {
        let mut projects = self.projects.write().await;
        let mut updated = 0;
        for project in projects.iter_mut().filter(|p| !p.uses_custom_prompt()) {
            project.system_prompt = Some(system_prompt.to_string());
            updated += 1;
        }
        if updated > 0 {
            self.persist(&projects).await?;
        }
        Ok(updated)
    }

    async fn persist(&self, projects: &[Project]) -> Result<(), ServerError> {
        let json = serde_json::to_string_pretty(projects)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}
