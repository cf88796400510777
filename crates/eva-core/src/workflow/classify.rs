//! Step output classification.
//!
//! The agent does not report structured results; it prints marker tokens into
//! its plain-text log. `classify` turns the full output of one invocation into
//! a closed verdict. Priority is fixed: an evaluation verdict beats an error
//! marker, which beats context extraction.

/// Marker vocabulary recognized in agent output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSet {
    /// Printed by the agent's evaluation phase
    pub evaluation: String,
    /// Word that marks a successful evaluation (matched case-insensitively)
    pub success_word: String,
    /// Printed by the bridge (and the agent) on a failed run
    pub agent_error: String,
    pub observations_label: String,
    pub status_label: String,
}

impl Default for MarkerSet {
    fn default() -> Self {
        Self {
            evaluation: "EVALUATION_AGENT".to_string(),
            success_word: "succeeded".to_string(),
            agent_error: "UFO2 Error".to_string(),
            observations_label: "Observations👀:".to_string(),
            status_label: "Status📊:".to_string(),
        }
    }
}

impl MarkerSet {
    /// Default vocabulary with the error marker matching the bridge's exit fragment.
    pub fn for_agent(display_name: &str) -> Self {
        Self {
            agent_error: format!("{} Error", display_name),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepVerdict {
    /// The evaluation marker is present; `success` reflects the success word
    Evaluated { success: bool },
    /// The error marker is present (and no evaluation marker)
    AgentError,
    /// Neither marker; extracted fields may be empty
    Context { observations: String, status: String },
}

pub fn classify(output: &str, markers: &MarkerSet) -> StepVerdict {
    if output.contains(&markers.evaluation) {
        // Only consulted behind the evaluation marker.
        let success = output
            .to_lowercase()
            .contains(&markers.success_word.to_lowercase());
        return StepVerdict::Evaluated { success };
    }

    if output.contains(&markers.agent_error) {
        return StepVerdict::AgentError;
    }

    StepVerdict::Context {
        observations: labeled_field(output, &markers.observations_label),
        status: labeled_field(output, &markers.status_label),
    }
}

/// Text after the last occurrence of `label`, up to the next line break, trimmed.
fn labeled_field(output: &str, label: &str) -> String {
    match output.rfind(label) {
        Some(idx) => {
            let rest = &output[idx + label.len()..];
            rest.split(['\n', '\r']).next().unwrap_or("").trim().to_string()
        }
        None => String::new(),
    }
}
