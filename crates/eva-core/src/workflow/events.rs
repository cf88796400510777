//! Events produced by a workflow run, in the order the transport must deliver them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestrationEvent {
    /// Progress note emitted before a step's invocation starts
    AssistantNote {
        step: usize,
        text: String,
        instructions: String,
    },
    /// Diagnostic line for the client's debug pane
    DebugLine { text: String },
    /// Agent output, forwarded as soon as the bridge yields it
    RawOutput { text: String },
    /// Verdict of the agent's evaluation phase for a step
    Conclusion { step: usize, success: bool },
    /// Observations and status extracted from a step without a verdict
    ContextSummary {
        step: usize,
        observations: String,
        status: String,
    },
    /// The run hit an unexpected failure and has ended
    Error { message: String },
    /// The agent could not be reached for this step
    Unavailable { step: usize, reason: String },
}

impl OrchestrationEvent {
    /// Short kind label, handy for logging and terminal output.
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestrationEvent::AssistantNote { .. } => "assistant_note",
            OrchestrationEvent::DebugLine { .. } => "debug_line",
            OrchestrationEvent::RawOutput { .. } => "raw_output",
            OrchestrationEvent::Conclusion { .. } => "conclusion",
            OrchestrationEvent::ContextSummary { .. } => "context_summary",
            OrchestrationEvent::Error { .. } => "error",
            OrchestrationEvent::Unavailable { .. } => "unavailable",
        }
    }

    /// Whether this event ends the run early (failed verdict or error).
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            OrchestrationEvent::Conclusion { success: false, .. } | OrchestrationEvent::Error { .. }
        )
    }
}
