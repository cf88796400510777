//! Step Orchestrator — runs a project's steps through the agent, one at a time.
//!
//! For every step with instructions:
//! 1. announce the step (`AssistantNote`)
//! 2. stop early with `Unavailable` if the agent cannot be reached
//! 3. forward each fragment as `RawOutput` while accumulating the text
//! 4. classify the accumulated text and decide whether the run goes on
//!
//! Steps never overlap: the next invocation starts only after the previous
//! one's classification event has been yielded.

use std::sync::Arc;

use async_stream::stream;
use serde_json::json;
use tokio_stream::{Stream, StreamExt};

use crate::agent::AgentLauncher;
use crate::prompt_log::RunLogger;
use crate::workflow::classify::{classify, MarkerSet, StepVerdict};
use crate::workflow::events::OrchestrationEvent;
use crate::workflow::schema::WorkflowStep;

pub struct StepOrchestrator {
    launcher: Arc<dyn AgentLauncher>,
    logger: Arc<dyn RunLogger>,
    markers: MarkerSet,
}

impl StepOrchestrator {
    pub fn new(launcher: Arc<dyn AgentLauncher>, logger: Arc<dyn RunLogger>) -> Self {
        let markers = MarkerSet::for_agent(launcher.display_name());
        Self {
            launcher,
            logger,
            markers,
        }
    }

    pub fn with_markers(mut self, markers: MarkerSet) -> Self {
        self.markers = markers;
        self
    }

    /// Lazily execute `steps`. Dropping the returned stream cancels any
    /// in-flight agent process.
    pub fn run(
        &self,
        steps: Vec<WorkflowStep>,
    ) -> impl Stream<Item = OrchestrationEvent> + Send + 'static {
        let launcher = self.launcher.clone();
        let logger = self.logger.clone();
        let markers = self.markers.clone();

        stream! {
            let agent = launcher.display_name().to_string();
            tracing::info!("[Orchestrator] Run started ({} step(s), agent: {})", steps.len(), agent);

            for (i, step) in steps.iter().enumerate() {
                let Some(command) = step.command() else {
                    continue;
                };
                let index = i + 1;

                yield OrchestrationEvent::AssistantNote {
                    step: index,
                    text: format!("Executing step {}", index),
                    instructions: command.to_string(),
                };

                if !launcher.is_available() {
                    let reason = format!("{} is not available", agent);
                    logger.log("AGENT_UNAVAILABLE", &reason, Some(json!({ "step": index })));
                    yield OrchestrationEvent::Unavailable { step: index, reason };
                    continue;
                }

                logger.log("AGENT_COMMAND", command, Some(json!({ "step": index })));
                yield OrchestrationEvent::DebugLine {
                    text: format!("Sending to {}: {}", agent, command),
                };

                let mut fragments = launcher.launch(command);
                let mut output = String::new();
                let mut unavailable = None;
                let mut failure = None;

                while let Some(item) = fragments.next().await {
                    match item {
                        Ok(fragment) if fragment.is_unavailable() => {
                            unavailable = Some(fragment.text);
                            break;
                        }
                        Ok(fragment) => {
                            output.push_str(&fragment.text);
                            yield OrchestrationEvent::RawOutput { text: fragment.text };
                        }
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }
                drop(fragments);

                if let Some(reason) = unavailable {
                    logger.log("AGENT_UNAVAILABLE", &reason, Some(json!({ "step": index })));
                    yield OrchestrationEvent::Unavailable { step: index, reason };
                    continue;
                }

                if let Some(e) = failure {
                    let message = format!("Step {} failed: {}", index, e);
                    logger.log("ERROR", &message, Some(json!({ "step": index })));
                    tracing::error!("[Orchestrator] {}", message);
                    yield OrchestrationEvent::Error { message };
                    return;
                }

                match classify(&output, &markers) {
                    StepVerdict::Evaluated { success: true } => {
                        logger.log(
                            "EVALUATION",
                            &format!("Step {} evaluated as successful.", index),
                            Some(json!({ "step": index, "success": true })),
                        );
                        yield OrchestrationEvent::Conclusion { step: index, success: true };
                    }
                    StepVerdict::Evaluated { success: false } => {
                        logger.log(
                            "EVALUATION",
                            &format!("Step {} evaluated as failed.", index),
                            Some(json!({ "step": index, "success": false })),
                        );
                        tracing::warn!("[Orchestrator] Step {} failed evaluation, stopping run", index);
                        yield OrchestrationEvent::Conclusion { step: index, success: false };
                        return;
                    }
                    StepVerdict::AgentError => {
                        logger.log("AGENT_ERROR", &output, Some(json!({ "step": index })));
                        yield OrchestrationEvent::DebugLine {
                            text: format!("Step {} reported an agent error, continuing.", index),
                        };
                    }
                    StepVerdict::Context { observations, status } => {
                        yield OrchestrationEvent::ContextSummary {
                            step: index,
                            observations,
                            status,
                        };
                    }
                }
            }

            tracing::info!("[Orchestrator] Run finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use serde_json::Value;

    use super::*;
    use crate::agent::{BridgeError, FragmentResult, FragmentStream, OutputFragment};

    /// Launcher that replays canned fragment lists, one per launch.
    struct ScriptedLauncher {
        available: bool,
        scripts: Mutex<VecDeque<Vec<FragmentResult>>>,
        launched: Mutex<Vec<String>>,
    }

    impl ScriptedLauncher {
        fn new(scripts: Vec<Vec<FragmentResult>>) -> Arc<Self> {
            Arc::new(Self {
                available: true,
                scripts: Mutex::new(scripts.into()),
                launched: Mutex::new(Vec::new()),
            })
        }

        fn unavailable() -> Arc<Self> {
            Arc::new(Self {
                available: false,
                scripts: Mutex::new(VecDeque::new()),
                launched: Mutex::new(Vec::new()),
            })
        }

        fn launched(&self) -> Vec<String> {
            self.launched.lock().unwrap().clone()
        }
    }

    impl AgentLauncher for ScriptedLauncher {
        fn is_available(&self) -> bool {
            self.available
        }

        fn launch(&self, command: &str) -> FragmentStream {
            self.launched.lock().unwrap().push(command.to_string());
            let items = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
            Box::pin(tokio_stream::iter(items))
        }

        fn display_name(&self) -> &str {
            "UFO2"
        }
    }

    #[derive(Default)]
    struct RecordingLogger {
        entries: Mutex<Vec<(String, String)>>,
    }

    impl RecordingLogger {
        fn categories(&self) -> Vec<String> {
            self.entries.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
        }
    }

    impl RunLogger for RecordingLogger {
        fn log(&self, category: &str, text: &str, _metadata: Option<Value>) {
            self.entries
                .lock()
                .unwrap()
                .push((category.to_string(), text.to_string()));
        }
    }

    fn lines(parts: &[&str]) -> Vec<FragmentResult> {
        parts.iter().map(|p| Ok(OutputFragment::output(*p))).collect()
    }

    fn steps(instructions: &[&str]) -> Vec<WorkflowStep> {
        instructions
            .iter()
            .map(|i| {
                if i.is_empty() {
                    WorkflowStep::default()
                } else {
                    WorkflowStep::new(i)
                }
            })
            .collect()
    }

    async fn run(
        launcher: Arc<ScriptedLauncher>,
        logger: Arc<RecordingLogger>,
        steps: Vec<WorkflowStep>,
    ) -> Vec<OrchestrationEvent> {
        let orchestrator = StepOrchestrator::new(launcher, logger);
        orchestrator.run(steps).collect().await
    }

    fn note(step: usize, instructions: &str) -> OrchestrationEvent {
        OrchestrationEvent::AssistantNote {
            step,
            text: format!("Executing step {}", step),
            instructions: instructions.to_string(),
        }
    }

    fn debug(text: &str) -> OrchestrationEvent {
        OrchestrationEvent::DebugLine { text: text.to_string() }
    }

    fn raw(text: &str) -> OrchestrationEvent {
        OrchestrationEvent::RawOutput { text: text.to_string() }
    }

    #[tokio::test]
    async fn test_successful_evaluation_moves_to_next_step() {
        let launcher = ScriptedLauncher::new(vec![
            lines(&["working...\n", "EVALUATION_AGENT: succeeded\n"]),
            lines(&["Observations👀: dialog open\n", "Status📊: CONTINUE\n"]),
        ]);
        let logger = Arc::new(RecordingLogger::default());
        let events = run(launcher.clone(), logger.clone(), steps(&["open app", "click button"])).await;

        assert_eq!(
            events,
            vec![
                note(1, "open app"),
                debug("Sending to UFO2: open app"),
                raw("working...\n"),
                raw("EVALUATION_AGENT: succeeded\n"),
                OrchestrationEvent::Conclusion { step: 1, success: true },
                note(2, "click button"),
                debug("Sending to UFO2: click button"),
                raw("Observations👀: dialog open\n"),
                raw("Status📊: CONTINUE\n"),
                OrchestrationEvent::ContextSummary {
                    step: 2,
                    observations: "dialog open".to_string(),
                    status: "CONTINUE".to_string(),
                },
            ]
        );
        assert_eq!(launcher.launched(), vec!["open app", "click button"]);
        assert_eq!(
            logger.categories(),
            vec!["AGENT_COMMAND", "EVALUATION", "AGENT_COMMAND"]
        );
    }

    #[tokio::test]
    async fn test_failed_evaluation_ends_run() {
        let launcher = ScriptedLauncher::new(vec![
            lines(&["EVALUATION_AGENT: failed\n"]),
            lines(&["never used\n"]),
        ]);
        let logger = Arc::new(RecordingLogger::default());
        let events = run(launcher.clone(), logger, steps(&["open app", "click button"])).await;

        assert_eq!(
            events.last(),
            Some(&OrchestrationEvent::Conclusion { step: 1, success: false })
        );
        assert!(!events.contains(&note(2, "click button")));
        assert_eq!(launcher.launched(), vec!["open app"]);
    }

    #[tokio::test]
    async fn test_unavailable_agent_reports_each_step() {
        let launcher = ScriptedLauncher::unavailable();
        let logger = Arc::new(RecordingLogger::default());
        let events = run(launcher.clone(), logger.clone(), steps(&["a", "b", "c"])).await;

        let unavailable: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, OrchestrationEvent::Unavailable { .. }))
            .collect();
        assert_eq!(unavailable.len(), 3);
        assert_eq!(events.len(), 6);
        assert!(launcher.launched().is_empty());
        assert_eq!(logger.categories(), vec!["AGENT_UNAVAILABLE"; 3]);
    }

    #[tokio::test]
    async fn test_unavailable_fragment_skips_classification() {
        let launcher = ScriptedLauncher::new(vec![
            vec![Ok(OutputFragment::unavailable("UFO2"))],
            lines(&["Status📊: ok\n"]),
        ]);
        let logger = Arc::new(RecordingLogger::default());
        let events = run(launcher, logger, steps(&["a", "b"])).await;

        assert_eq!(
            events[2],
            OrchestrationEvent::Unavailable {
                step: 1,
                reason: "UFO2 not available".to_string(),
            }
        );
        assert_eq!(events[3], note(2, "b"));
        assert!(matches!(
            events.last(),
            Some(OrchestrationEvent::ContextSummary { step: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_steps_are_silently_skipped() {
        let launcher = ScriptedLauncher::new(vec![lines(&["Status📊: ok\n"])]);
        let logger = Arc::new(RecordingLogger::default());
        let events = run(launcher.clone(), logger, steps(&["", "", "real step"])).await;

        assert_eq!(events[0], note(3, "real step"));
        assert_eq!(events.len(), 4);
        assert_eq!(launcher.launched(), vec!["real step"]);

        let launcher = ScriptedLauncher::new(vec![]);
        let events = run(
            launcher.clone(),
            Arc::new(RecordingLogger::default()),
            steps(&["", ""]),
        )
        .await;
        assert!(events.is_empty());
        assert!(launcher.launched().is_empty());
    }

    #[tokio::test]
    async fn test_agent_error_is_logged_and_run_continues() {
        let launcher = ScriptedLauncher::new(vec![
            lines(&["boom\n", "\n\nUFO2 Error (Code 1)\n"]),
            lines(&["EVALUATION_AGENT: succeeded\n"]),
        ]);
        let logger = Arc::new(RecordingLogger::default());
        let events = run(launcher, logger.clone(), steps(&["a", "b"])).await;

        assert!(events.contains(&debug("Step 1 reported an agent error, continuing.")));
        assert_eq!(
            events.last(),
            Some(&OrchestrationEvent::Conclusion { step: 2, success: true })
        );
        assert!(logger.categories().contains(&"AGENT_ERROR".to_string()));
        assert!(!events.iter().any(|e| matches!(
            e,
            OrchestrationEvent::Error { .. } | OrchestrationEvent::ContextSummary { step: 1, .. }
        )));
    }

    #[tokio::test]
    async fn test_evaluation_verdict_beats_error_marker() {
        let launcher = ScriptedLauncher::new(vec![lines(&[
            "UFO2 Error (Code 1)\n",
            "EVALUATION_AGENT: Succeeded\n",
            "Observations👀: ignored\n",
        ])]);
        let events = run(launcher, Arc::new(RecordingLogger::default()), steps(&["a"])).await;

        assert_eq!(
            events.last(),
            Some(&OrchestrationEvent::Conclusion { step: 1, success: true })
        );
        assert!(!events.iter().any(|e| e.kind() == "context_summary" || e.kind() == "error"));
    }

    #[tokio::test]
    async fn test_bridge_error_ends_run_with_single_error() {
        let launcher = ScriptedLauncher::new(vec![
            vec![
                Ok(OutputFragment::output("partial\n")),
                Err(BridgeError::Read("pipe closed".to_string())),
            ],
            lines(&["never used\n"]),
        ]);
        let logger = Arc::new(RecordingLogger::default());
        let events = run(launcher.clone(), logger.clone(), steps(&["a", "b"])).await;

        let errors: Vec<_> = events.iter().filter(|e| e.kind() == "error").collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            events.last(),
            Some(&OrchestrationEvent::Error {
                message: "Step 1 failed: Failed to read agent output: pipe closed".to_string(),
            })
        );
        assert_eq!(launcher.launched(), vec!["a"]);
        assert!(logger.categories().contains(&"ERROR".to_string()));
    }

    #[tokio::test]
    async fn test_context_summary_example() {
        let launcher = ScriptedLauncher::new(vec![lines(&[
            "Observations👀: screen loaded\n",
            "Status📊: ready\n",
        ])]);
        let events = run(launcher, Arc::new(RecordingLogger::default()), steps(&["a"])).await;

        let summaries: Vec<_> = events
            .iter()
            .filter(|e| e.kind() == "context_summary")
            .collect();
        assert_eq!(
            summaries,
            vec![&OrchestrationEvent::ContextSummary {
                step: 1,
                observations: "screen loaded".to_string(),
                status: "ready".to_string(),
            }]
        );
    }
}
