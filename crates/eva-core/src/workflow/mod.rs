//! Workflow engine — sequential, marker-driven execution of project steps.
//!
//! # Architecture
//!
//! ```text
//! Project.steps ──► StepOrchestrator ──► AgentLauncher (AgentBridge)
//!                        │                     │
//!                        │◄──── fragments ─────┘
//!                        ▼
//!                  classify(output) ──► OrchestrationEvent stream ──► SSE / terminal
//! ```

pub mod classify;
pub mod events;
pub mod orchestrator;
pub mod schema;

pub use classify::{classify, MarkerSet, StepVerdict};
pub use events::OrchestrationEvent;
pub use orchestrator::StepOrchestrator;
pub use schema::{Project, WorkflowStep};
