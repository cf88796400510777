//! Launch configuration for the external automation agent.

use std::path::PathBuf;
use std::time::Duration;

/// Idle window after which a silent agent is considered stalled.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Diagnostic the agent's screen-capture subsystem prints on every missed frame.
pub const DEFAULT_NOISE_PATTERN: &str = r"(?i)snapshot capture failed";

/// Capacity of the channels between the process readers, the supervisor and the consumer.
pub const FRAGMENT_CHANNEL_CAPACITY: usize = 256;

/// How to locate and invoke the agent executable.
///
/// The dispatched command line is
/// `<program> <launcher_args…> --task <task_name> -r <instruction>`, run with
/// `install_dir` as the working directory.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Name used in log lines and in the synthetic status fragments
    pub display_name: String,
    /// Installation directory of the agent; `None` means "not configured"
    pub install_dir: Option<PathBuf>,
    /// Executable to run (usually "python")
    pub program: String,
    /// Arguments placed before the task arguments (e.g. `-m ufo`)
    pub launcher_args: Vec<String>,
    /// Task identifier passed via `--task`
    pub task_name: String,
    /// Rolling liveness deadline, reset by every fragment
    pub idle_timeout: Duration,
    /// Regexes for output lines that are dropped but still count as liveness
    pub noise_patterns: Vec<String>,
    /// Extra environment for the child, applied after the encoding variables
    pub env: Vec<(String, String)>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            display_name: "UFO2".to_string(),
            install_dir: None,
            program: "python".to_string(),
            launcher_args: vec!["-m".to_string(), "ufo".to_string()],
            task_name: "eva_task".to_string(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            noise_patterns: vec![DEFAULT_NOISE_PATTERN.to_string()],
            env: Vec::new(),
        }
    }
}

impl AgentConfig {
    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = Some(dir.into());
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Replace the program and its leading arguments.
    pub fn with_launcher(mut self, program: &str, launcher_args: &[&str]) -> Self {
        self.program = program.to_string();
        self.launcher_args = launcher_args.iter().map(|a| a.to_string()).collect();
        self
    }

    /// The agent counts as reachable when its install directory exists.
    pub fn is_available(&self) -> bool {
        self.install_dir.as_ref().map(|d| d.is_dir()).unwrap_or(false)
    }

    /// Full argument vector for one invocation. `instruction` must already be sanitized.
    pub fn build_args(&self, instruction: &str) -> Vec<String> {
        let mut args = self.launcher_args.clone();
        args.extend([
            "--task".to_string(),
            self.task_name.clone(),
            "-r".to_string(),
            instruction.to_string(),
        ]);
        args
    }

    /// Environment forced onto the child so its text output decodes the same everywhere.
    pub fn child_env(&self) -> Vec<(String, String)> {
        let mut env = vec![
            ("PYTHONUTF8".to_string(), "1".to_string()),
            ("PYTHONIOENCODING".to_string(), "utf-8".to_string()),
        ];
        env.extend(self.env.iter().cloned());
        env
    }
}

/// Collapse an instruction onto a single line; the agent's argument parser rejects line breaks.
pub fn sanitize_command(text: &str) -> String {
    text.chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}
