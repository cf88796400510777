//! Agent process bridge.
//!
//! Drives the external desktop-automation agent: one child process per
//! instruction, output surfaced as a lazy, cancellable fragment stream with
//! an idle-timeout liveness guard.
//!
//! ```text
//! AgentBridge::start("open notepad")
//!     │  spawn: python -m ufo --task eva_task -r "open notepad"
//!     ▼
//! Supervisor task ──(stdout+stderr lines, idle deadline)──► AgentOutput (Stream)
//! ```
//!
//! Consumers that only need the stream contract (the workflow orchestrator)
//! go through the [`AgentLauncher`] trait.

pub mod bridge;
pub mod config;
pub mod fragment;
pub mod invocation;

pub use bridge::{AgentBridge, AgentOutput, BridgeError, FragmentResult};
pub use config::{sanitize_command, AgentConfig, DEFAULT_IDLE_TIMEOUT};
pub use fragment::{FragmentKind, OutputFragment};
pub use invocation::{AgentInvocation, InvocationHandle, InvocationState};

use std::pin::Pin;

use tokio_stream::Stream;

/// Boxed fragment stream handed to the orchestrator.
pub type FragmentStream = Pin<Box<dyn Stream<Item = FragmentResult> + Send>>;

/// The narrow seam between step sequencing and process management.
pub trait AgentLauncher: Send + Sync {
    /// Whether invocations should be attempted at all.
    fn is_available(&self) -> bool;

    /// Start one invocation for `command`. Dropping the stream cancels it.
    fn launch(&self, command: &str) -> FragmentStream;

    /// Name used in user-facing messages.
    fn display_name(&self) -> &str {
        "agent"
    }
}

impl AgentLauncher for AgentBridge {
    fn is_available(&self) -> bool {
        AgentBridge::is_available(self)
    }

    fn launch(&self, command: &str) -> FragmentStream {
        Box::pin(self.start(command))
    }

    fn display_name(&self) -> &str {
        &self.config().display_name
    }
}
