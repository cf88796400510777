//! Lifecycle record of a single agent invocation.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// `Spawning -> Running -> {Completed | Failed | TimedOut | Cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Spawning,
    Running,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl InvocationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            InvocationState::Completed
                | InvocationState::Failed
                | InvocationState::TimedOut
                | InvocationState::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InvocationState::Spawning => "spawning",
            InvocationState::Running => "running",
            InvocationState::Completed => "completed",
            InvocationState::Failed => "failed",
            InvocationState::TimedOut => "timed_out",
            InvocationState::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInvocation {
    pub id: String,
    /// Sanitized, single-line instruction text
    pub command: String,
    pub started_at: DateTime<Utc>,
    pub last_output_at: Option<DateTime<Utc>>,
    pub state: InvocationState,
    /// Present only once the invocation is Completed or Failed by exit
    pub exit_code: Option<i32>,
    pub pid: Option<u32>,
}

impl AgentInvocation {
    pub fn new(command: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            command: command.to_string(),
            started_at: Utc::now(),
            last_output_at: None,
            state: InvocationState::Spawning,
            exit_code: None,
            pid: None,
        }
    }
}

/// Shared handle: the supervisor task mutates, consumers read snapshots.
#[derive(Debug, Clone)]
pub struct InvocationHandle(Arc<Mutex<AgentInvocation>>);

impl InvocationHandle {
    pub(crate) fn new(command: &str) -> Self {
        Self(Arc::new(Mutex::new(AgentInvocation::new(command))))
    }

    pub fn snapshot(&self) -> AgentInvocation {
        self.with(|inv| inv.clone())
    }

    /// Move to `next`. Terminal states are final; returns false when the move is refused.
    pub(crate) fn transition(&self, next: InvocationState) -> bool {
        self.with(|inv| {
            if inv.state.is_terminal() {
                return false;
            }
            inv.state = next;
            true
        })
    }

    pub(crate) fn finish_with_exit(&self, next: InvocationState, code: i32) {
        self.with(|inv| {
            if !inv.state.is_terminal() {
                inv.state = next;
                inv.exit_code = Some(code);
            }
        })
    }

    pub(crate) fn set_pid(&self, pid: Option<u32>) {
        self.with(|inv| inv.pid = pid)
    }

    pub(crate) fn touch(&self) {
        self.with(|inv| inv.last_output_at = Some(Utc::now()))
    }

    fn with<R>(&self, f: impl FnOnce(&mut AgentInvocation) -> R) -> R {
        // A poisoned lock still holds a consistent record; keep using it.
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_are_final() {
        let handle = InvocationHandle::new("open app");
        assert!(handle.transition(InvocationState::Running));
        assert!(handle.transition(InvocationState::TimedOut));
        assert!(!handle.transition(InvocationState::Completed));
        handle.finish_with_exit(InvocationState::Failed, 3);

        let inv = handle.snapshot();
        assert_eq!(inv.state, InvocationState::TimedOut);
        assert_eq!(inv.exit_code, None);
    }

    #[test]
    fn test_exit_code_recorded_on_completion() {
        let handle = InvocationHandle::new("open app");
        handle.transition(InvocationState::Running);
        handle.touch();
        handle.finish_with_exit(InvocationState::Failed, 1);

        let inv = handle.snapshot();
        assert_eq!(inv.state, InvocationState::Failed);
        assert_eq!(inv.exit_code, Some(1));
        assert!(inv.last_output_at.is_some());
    }
}
