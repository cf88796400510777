//! Text units surfaced from an agent invocation.

use std::time::Duration;

use serde::Serialize;

/// What a fragment represents. Everything except `Output` is synthesized by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    /// A line (or trailing partial line) printed by the agent
    Output,
    /// The agent could not be located; the sequence ends after this fragment
    Unavailable,
    /// The idle deadline expired and the process was terminated
    TimedOut,
    /// The process exited with a non-zero code
    ExitStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFragment {
    pub kind: FragmentKind,
    pub text: String,
}

impl OutputFragment {
    pub fn output(text: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Output,
            text: text.into(),
        }
    }

    pub fn unavailable(agent: &str) -> Self {
        Self {
            kind: FragmentKind::Unavailable,
            text: format!("{} not available", agent),
        }
    }

    pub fn timed_out(agent: &str, idle: Duration) -> Self {
        Self {
            kind: FragmentKind::TimedOut,
            text: format!(
                "\n\n{} command timed out after {} without output.\n",
                agent,
                describe_duration(idle)
            ),
        }
    }

    pub fn exit_status(agent: &str, code: i32) -> Self {
        Self {
            kind: FragmentKind::ExitStatus,
            text: format!("\n\n{} Error (Code {})\n", agent, code),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.kind == FragmentKind::Unavailable
    }
}

fn describe_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        let minutes = secs / 60;
        format!("{} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else if secs > 0 {
        format!("{} second{}", secs, if secs == 1 { "" } else { "s" })
    } else {
        format!("{} ms", d.as_millis())
    }
}
