//! Project and step definitions consumed by the orchestrator.
//!
//! Projects normally live in the JSON project store, but a single project can
//! also be kept in its own YAML (or JSON) file for the CLI:
//!
//! ```yaml
//! name: "Invoice entry"
//! steps:
//!   - instructions: "Open the accounting app"
//!   - instructions: "Create a new invoice for ACME"
//!   - note: "placeholder, no instructions yet"   # skipped
//! ```
//!
//! Unknown fields are kept verbatim so the store round-trips whatever the
//! frontend saved.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named, ordered list of agent instructions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Project name (unique key in the store)
    pub name: String,

    /// Ordered workflow steps
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,

    /// Per-project system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// When not `true`, the global system prompt is copied over on save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_custom_prompt: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One instruction unit, mapped to exactly one agent invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Text sent to the agent; steps without it are skipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkflowStep {
    pub fn new(instructions: &str) -> Self {
        Self {
            instructions: Some(instructions.to_string()),
            extra: Map::new(),
        }
    }

    /// The instruction text, or `None` when missing or empty.
    /// Whitespace-only text is still dispatched.
    pub fn command(&self) -> Option<&str> {
        self.instructions.as_deref().filter(|text| !text.is_empty())
    }
}

impl Project {
    pub fn new(name: &str, steps: Vec<WorkflowStep>) -> Self {
        Self {
            name: name.to_string(),
            steps,
            system_prompt: None,
            use_custom_prompt: None,
            extra: Map::new(),
        }
    }

    /// Number of steps that will actually invoke the agent.
    pub fn runnable_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.command().is_some()).count()
    }

    pub fn uses_custom_prompt(&self) -> bool {
        self.use_custom_prompt == Some(true)
    }

    /// Parse a project from YAML (JSON is accepted as well).
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        serde_yaml::from_str(yaml).map_err(|e| format!("Failed to parse project definition: {}", e))
    }

    /// Load a project definition from a file path.
    pub fn from_file(path: &str) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read project file '{}': {}", path, e))?;
        Self::from_yaml(&content)
    }
}
