//! `eva run` — Execute a project's steps in the terminal.

use std::io::Write;

use console::style;
use tokio_stream::StreamExt;

use eva_core::state::AppState;
use eva_core::workflow::{OrchestrationEvent, Project};

/// What happened during one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Steps that were announced (skipped empty steps excluded)
    pub steps_started: usize,
    pub steps_succeeded: usize,
    pub steps_unavailable: usize,
    /// Message of the event that ended the run early, if any
    pub failure: Option<String>,
}

impl RunSummary {
    fn record(&mut self, event: &OrchestrationEvent) {
        match event {
            OrchestrationEvent::AssistantNote { .. } => self.steps_started += 1,
            OrchestrationEvent::Conclusion { success: true, .. } => self.steps_succeeded += 1,
            OrchestrationEvent::Conclusion { step, success: false } => {
                self.failure = Some(format!("Step {} failed evaluation", step));
            }
            OrchestrationEvent::Unavailable { .. } => self.steps_unavailable += 1,
            OrchestrationEvent::Error { message } => self.failure = Some(message.clone()),
            _ => {}
        }
    }
}

/// Resolve the project from `--file` or `--project`, run it, and print events.
pub async fn run(
    state: &AppState,
    project_name: Option<&str>,
    file: Option<&str>,
    json: bool,
) -> Result<(), String> {
    let project = match (project_name, file) {
        (_, Some(path)) => Project::from_file(path)?,
        (Some(name), None) => state
            .project_store
            .require(name)
            .await
            .map_err(|e| e.to_string())?,
        (None, None) => return Err("Specify --project <name> or --file <path>".to_string()),
    };

    if !json {
        println!(
            "📄 Project: {} ({} step(s), {} runnable)",
            style(&project.name).bold(),
            project.steps.len(),
            project.runnable_steps()
        );
        println!();
    }

    let summary = run_project(state, &project, |event| {
        if json {
            print_json_event(event);
        } else {
            print_event(event);
        }
    })
    .await;

    if !json {
        println!();
        println!(
            "{} step(s) started, {} succeeded, {} unavailable",
            summary.steps_started, summary.steps_succeeded, summary.steps_unavailable
        );
    }

    match summary.failure {
        Some(reason) => Err(format!("Workflow '{}' failed: {}", project.name, reason)),
        None => Ok(()),
    }
}

/// Run `project` to completion, handing every event to `on_event`.
pub async fn run_project<F>(state: &AppState, project: &Project, mut on_event: F) -> RunSummary
where
    F: FnMut(&OrchestrationEvent),
{
    let mut summary = RunSummary::default();
    let events = state.orchestrator().run(project.steps.clone());
    tokio::pin!(events);

    while let Some(event) = events.next().await {
        summary.record(&event);
        on_event(&event);
    }
    summary
}

fn print_json_event(event: &OrchestrationEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{}", line),
        Err(e) => tracing::error!("Failed to serialize event: {}", e),
    }
}

fn print_event(event: &OrchestrationEvent) {
    match event {
        OrchestrationEvent::AssistantNote {
            step, instructions, ..
        } => {
            println!("{} {}", style(format!("▶ Step {}:", step)).cyan().bold(), instructions);
        }
        OrchestrationEvent::DebugLine { text } => println!("  {}", style(text).dim()),
        OrchestrationEvent::RawOutput { text } => {
            print!("{}", text);
            let _ = std::io::stdout().flush();
        }
        OrchestrationEvent::Conclusion { step, success: true } => {
            println!("{}", style(format!("✅ Step {} succeeded", step)).green());
        }
        OrchestrationEvent::Conclusion { step, success: false } => {
            println!("{}", style(format!("❌ Step {} failed", step)).red().bold());
        }
        OrchestrationEvent::ContextSummary {
            step,
            observations,
            status,
        } => {
            println!("{}", style(format!("📋 Step {} summary", step)).bold());
            println!("   Observations: {}", observations);
            println!("   Status:       {}", status);
        }
        OrchestrationEvent::Error { message } => {
            println!("{}", style(format!("💥 {}", message)).red().bold());
        }
        OrchestrationEvent::Unavailable { step, reason } => {
            println!("{}", style(format!("⚠ Step {}: {}", step, reason)).yellow());
        }
    }
}
