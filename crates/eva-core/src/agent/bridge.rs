//! AgentBridge — runs the external automation agent once per instruction and
//! exposes its merged stdout/stderr as a stream of [`OutputFragment`]s.
//!
//! Each `start()` launches a supervisor task that exclusively owns the child:
//!   1. spawn the process (encoding env forced, `kill_on_drop` set)
//!   2. hand the child one pipe for both stdout and stderr and pump it line by line
//!   3. race every read against the rolling idle deadline
//!   4. on exit / timeout / consumer drop: kill if needed, reap, record the state
//!
//! The consumer side (`AgentOutput`) is just the receiving end of a bounded
//! channel. Dropping it is the cancellation signal.

use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::task::{Context, Poll};

use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::Stream;

use super::config::{sanitize_command, AgentConfig, FRAGMENT_CHANNEL_CAPACITY};
use super::fragment::OutputFragment;
use super::invocation::{AgentInvocation, InvocationHandle, InvocationState};

/// Failures of the process plumbing itself. They travel inside the stream.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to spawn '{program}': {message}. Is the agent installed?")]
    Spawn { program: String, message: String },

    #[error("Failed to read agent output: {0}")]
    Read(String),

    #[error("Failed to reap agent process: {0}")]
    Wait(String),

    #[error("Invalid noise pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

pub type FragmentResult = Result<OutputFragment, BridgeError>;

/// Launches agent invocations with a fixed configuration.
#[derive(Debug, Clone)]
pub struct AgentBridge {
    config: Arc<AgentConfig>,
    noise: Arc<Vec<Regex>>,
}

impl AgentBridge {
    pub fn new(config: AgentConfig) -> Result<Self, BridgeError> {
        let noise = config
            .noise_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| BridgeError::InvalidPattern {
                    pattern: p.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config: Arc::new(config),
            noise: Arc::new(noise),
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn is_available(&self) -> bool {
        self.config.is_available()
    }

    /// Start one invocation. Must be called from within a tokio runtime.
    ///
    /// When the agent is not installed the stream yields a single
    /// `Unavailable` fragment and ends.
    pub fn start(&self, command: &str) -> AgentOutput {
        let sanitized = sanitize_command(command);
        let invocation = InvocationHandle::new(&sanitized);
        let (tx, rx) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);
        let name = self.config.display_name.clone();

        let install_dir = match self.config.install_dir.clone() {
            Some(dir) if dir.is_dir() => dir,
            _ => {
                tracing::warn!("[AgentBridge:{}] Agent not available, skipping invocation", name);
                invocation.transition(InvocationState::Failed);
                // Fresh channel with spare capacity; this cannot fail.
                let _ = tx.try_send(Ok(OutputFragment::unavailable(&name)));
                return AgentOutput { rx, invocation };
            }
        };

        let supervisor = Supervisor {
            config: self.config.clone(),
            noise: self.noise.clone(),
            install_dir,
            command: sanitized,
            invocation: invocation.clone(),
        };
        tokio::spawn(supervisor.run(tx));

        AgentOutput { rx, invocation }
    }
}

/// Consumer end of one invocation. Dropping it terminates the process.
pub struct AgentOutput {
    rx: mpsc::Receiver<FragmentResult>,
    invocation: InvocationHandle,
}

impl AgentOutput {
    /// Current lifecycle record of the invocation.
    pub fn invocation(&self) -> AgentInvocation {
        self.invocation.snapshot()
    }

    /// A handle that stays valid after the stream is dropped.
    pub fn handle(&self) -> InvocationHandle {
        self.invocation.clone()
    }
}

impl Stream for AgentOutput {
    type Item = FragmentResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ─── Supervisor ─────────────────────────────────────────────────────────

enum Outcome {
    Exited,
    TimedOut,
    Cancelled,
    ReadFailed(String),
}

struct Supervisor {
    config: Arc<AgentConfig>,
    noise: Arc<Vec<Regex>>,
    install_dir: PathBuf,
    command: String,
    invocation: InvocationHandle,
}

impl Supervisor {
    async fn run(self, tx: mpsc::Sender<FragmentResult>) {
        let name = self.config.display_name.clone();
        let args = self.config.build_args(&self.command);

        // stdout and stderr share one pipe so lines keep the order the child wrote them in.
        let (reader, writer) = match output_pipe() {
            Ok(pipe) => pipe,
            Err(e) => {
                self.fail_spawn(&tx, e).await;
                return;
            }
        };

        let mut cmd = Command::new(&self.config.program);
        cmd.args(&args)
            .current_dir(&self.install_dir)
            .envs(self.config.child_env())
            .stdin(Stdio::null())
            .stdout(writer.stdout)
            .stderr(writer.stderr)
            .kill_on_drop(true);

        tracing::info!(
            "[AgentBridge:{}] Spawning: {} {} (cwd: {})",
            name,
            self.config.program,
            args.join(" "),
            self.install_dir.display(),
        );

        let spawned = cmd.spawn();
        // Release the parent's write ends; EOF arrives once the child closes its copies.
        drop(cmd);
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                self.fail_spawn(&tx, e).await;
                return;
            }
        };

        self.invocation.set_pid(child.id());
        self.invocation.transition(InvocationState::Running);

        let (line_tx, mut line_rx) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);
        match async_reader(reader) {
            Ok(reader) => {
                tokio::spawn(pump_lines(reader, line_tx));
            }
            Err(e) => {
                let _ = line_tx.send(Err(e.to_string())).await;
            }
        }

        let idle = self.config.idle_timeout;
        let mut deadline = Instant::now() + idle;

        let outcome = loop {
            tokio::select! {
                _ = tx.closed() => break Outcome::Cancelled,
                _ = tokio::time::sleep_until(deadline) => break Outcome::TimedOut,
                line = line_rx.recv() => match line {
                    Some(Ok(text)) => {
                        self.invocation.touch();
                        if self.is_noise(&text) {
                            tracing::trace!("[AgentBridge:{}] Dropped noise: {}", name, text.trim_end());
                        } else if tx.send(Ok(OutputFragment::output(text))).await.is_err() {
                            break Outcome::Cancelled;
                        }
                        deadline = Instant::now() + idle;
                    }
                    Some(Err(message)) => break Outcome::ReadFailed(message),
                    None => break Outcome::Exited,
                },
            }
        };

        self.finish(outcome, &mut child, &tx).await;
    }

    async fn fail_spawn(&self, tx: &mpsc::Sender<FragmentResult>, e: std::io::Error) {
        tracing::error!("[AgentBridge:{}] Spawn failed: {}", self.config.display_name, e);
        self.invocation.transition(InvocationState::Failed);
        let _ = tx
            .send(Err(BridgeError::Spawn {
                program: self.config.program.clone(),
                message: e.to_string(),
            }))
            .await;
    }

    fn is_noise(&self, text: &str) -> bool {
        self.noise.iter().any(|re| re.is_match(text))
    }

    async fn finish(&self, outcome: Outcome, child: &mut Child, tx: &mpsc::Sender<FragmentResult>) {
        let name = &self.config.display_name;
        let idle = self.config.idle_timeout;

        match outcome {
            Outcome::Cancelled => {
                tracing::info!("[AgentBridge:{}] Consumer went away, killing process", name);
                let _ = child.kill().await;
                self.invocation.transition(InvocationState::Cancelled);
            }
            Outcome::TimedOut => {
                tracing::warn!("[AgentBridge:{}] No output for {:?}, killing process", name, idle);
                let _ = child.kill().await;
                self.invocation.transition(InvocationState::TimedOut);
                let _ = tx.send(Ok(OutputFragment::timed_out(name, idle))).await;
            }
            Outcome::ReadFailed(message) => {
                tracing::error!("[AgentBridge:{}] Read failed: {}", name, message);
                let _ = child.kill().await;
                self.invocation.transition(InvocationState::Failed);
                let _ = tx.send(Err(BridgeError::Read(message))).await;
            }
            Outcome::Exited => {
                // Output is closed but the process may linger; the idle bound still applies.
                match tokio::time::timeout(idle, child.wait()).await {
                    Ok(Ok(status)) => {
                        let code = status.code().unwrap_or(-1);
                        if status.success() {
                            tracing::info!("[AgentBridge:{}] Process exited cleanly", name);
                            self.invocation
                                .finish_with_exit(InvocationState::Completed, code);
                        } else {
                            tracing::warn!("[AgentBridge:{}] Process exited with code {}", name, code);
                            self.invocation.finish_with_exit(InvocationState::Failed, code);
                            let _ = tx.send(Ok(OutputFragment::exit_status(name, code))).await;
                        }
                    }
                    Ok(Err(e)) => {
                        self.invocation.transition(InvocationState::Failed);
                        let _ = tx.send(Err(BridgeError::Wait(e.to_string()))).await;
                    }
                    Err(_) => {
                        tracing::warn!("[AgentBridge:{}] Process closed its output but did not exit, killing", name);
                        let _ = child.kill().await;
                        self.invocation.transition(InvocationState::TimedOut);
                        let _ = tx.send(Ok(OutputFragment::timed_out(name, idle))).await;
                    }
                }
            }
        }
    }
}

// ─── Output pipe ────────────────────────────────────────────────────────

/// Write ends handed to the child for stdout and stderr.
struct PipeWriters {
    stdout: os_pipe::PipeWriter,
    stderr: os_pipe::PipeWriter,
}

fn output_pipe() -> std::io::Result<(os_pipe::PipeReader, PipeWriters)> {
    let (reader, writer) = os_pipe::pipe()?;
    let stderr = writer.try_clone()?;
    Ok((
        reader,
        PipeWriters {
            stdout: writer,
            stderr,
        },
    ))
}

#[cfg(unix)]
fn async_reader(reader: os_pipe::PipeReader) -> std::io::Result<tokio::net::unix::pipe::Receiver> {
    tokio::net::unix::pipe::Receiver::from_owned_fd(std::os::fd::OwnedFd::from(reader))
}

#[cfg(windows)]
fn async_reader(reader: os_pipe::PipeReader) -> std::io::Result<tokio::fs::File> {
    let handle = std::os::windows::io::OwnedHandle::from(reader);
    Ok(tokio::fs::File::from_std(std::fs::File::from(handle)))
}

/// Forward one pipe line by line (newline kept). Invalid UTF-8 is replaced, never fatal.
async fn pump_lines<R>(reader: R, tx: mpsc::Sender<Result<String, String>>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf).into_owned();
                if tx.send(Ok(text)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e.to_string())).await;
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use tokio_stream::StreamExt;

    use super::*;
    use crate::agent::FragmentKind;

    fn script_bridge(dir: &std::path::Path, script: &str, idle: Duration) -> AgentBridge {
        let config = AgentConfig::default()
            .with_install_dir(dir)
            .with_launcher("sh", &["-c", script, "eva-agent"])
            .with_idle_timeout(idle);
        AgentBridge::new(config).unwrap()
    }

    async fn collect(mut output: AgentOutput) -> (Vec<FragmentResult>, AgentInvocation) {
        let mut items = Vec::new();
        let drained = tokio::time::timeout(Duration::from_secs(10), async {
            while let Some(item) = output.next().await {
                items.push(item);
            }
        })
        .await;
        assert!(drained.is_ok(), "stream did not finish in time");
        (items, output.invocation())
    }

    fn texts(items: &[FragmentResult]) -> Vec<String> {
        items
            .iter()
            .map(|i| i.as_ref().unwrap().text.clone())
            .collect()
    }

    #[cfg(target_os = "linux")]
    fn process_gone(pid: u32) -> bool {
        !std::path::Path::new(&format!("/proc/{}", pid)).exists()
    }

    #[tokio::test]
    async fn test_unavailable_yields_single_fragment() {
        let bridge = AgentBridge::new(AgentConfig::default()).unwrap();
        assert!(!bridge.is_available());

        let (items, inv) = collect(bridge.start("open app")).await;
        assert_eq!(items.len(), 1);
        let fragment = items[0].as_ref().unwrap();
        assert!(fragment.is_unavailable());
        assert_eq!(fragment.text, "UFO2 not available");
        assert!(inv.pid.is_none());
    }

    #[tokio::test]
    async fn test_instruction_dispatched_on_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = script_bridge(dir.path(), r#"printf '%s' "$4""#, Duration::from_secs(5));

        let (items, inv) = collect(bridge.start("open app\nthen\r\nclick")).await;
        assert_eq!(texts(&items), vec!["open app then  click".to_string()]);
        assert_eq!(inv.command, "open app then  click");
        assert_eq!(inv.state, InvocationState::Completed);
        assert_eq!(inv.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_lines_stream_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = script_bridge(
            dir.path(),
            "echo one; echo two; printf three",
            Duration::from_secs(5),
        );

        let (items, _) = collect(bridge.start("go")).await;
        assert_eq!(texts(&items), vec!["one\n", "two\n", "three"]);
    }

    #[tokio::test]
    async fn test_stderr_is_merged_in_write_order() {
        let dir = tempfile::tempdir().unwrap();
        let script = r#"i=0; while [ $i -lt 200 ]; do echo "o$i"; echo "e$i" 1>&2; i=$((i+1)); done"#;
        let bridge = script_bridge(dir.path(), script, Duration::from_secs(5));

        let (items, inv) = collect(bridge.start("go")).await;
        let expected: Vec<String> = (0..200)
            .flat_map(|i| [format!("o{}\n", i), format!("e{}\n", i)])
            .collect();
        assert_eq!(texts(&items), expected);
        assert_eq!(inv.state, InvocationState::Completed);
    }

    #[tokio::test]
    async fn test_encoding_env_and_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = script_bridge(
            dir.path(),
            r#"echo "$PYTHONUTF8 $PYTHONIOENCODING"; pwd"#,
            Duration::from_secs(5),
        );

        let (items, _) = collect(bridge.start("go")).await;
        let got = texts(&items);
        assert_eq!(got[0], "1 utf-8\n");
        let cwd = std::fs::canonicalize(got[1].trim()).unwrap();
        assert_eq!(cwd, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = script_bridge(dir.path(), r"printf 'caf\377\n'", Duration::from_secs(5));

        let (items, inv) = collect(bridge.start("go")).await;
        assert_eq!(texts(&items), vec!["caf\u{FFFD}\n".to_string()]);
        assert_eq!(inv.state, InvocationState::Completed);
    }

    #[tokio::test]
    async fn test_nonzero_exit_appends_status_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = script_bridge(dir.path(), "echo oops; exit 3", Duration::from_secs(5));

        let (items, inv) = collect(bridge.start("go")).await;
        assert_eq!(items.len(), 2);
        let last = items[1].as_ref().unwrap();
        assert_eq!(last.kind, FragmentKind::ExitStatus);
        assert_eq!(last.text, "\n\nUFO2 Error (Code 3)\n");
        assert_eq!(inv.state, InvocationState::Failed);
        assert_eq!(inv.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_idle_timeout_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = script_bridge(
            dir.path(),
            "echo started; exec sleep 30",
            Duration::from_millis(300),
        );

        let started = std::time::Instant::now();
        let (items, inv) = collect(bridge.start("go")).await;
        assert!(started.elapsed() < Duration::from_secs(5));

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().text, "started\n");
        assert_eq!(items[1].as_ref().unwrap().kind, FragmentKind::TimedOut);
        assert_eq!(inv.state, InvocationState::TimedOut);
        assert_eq!(inv.exit_code, None);

        #[cfg(target_os = "linux")]
        assert!(process_gone(inv.pid.unwrap()));
    }

    #[tokio::test]
    async fn test_noise_is_filtered_but_keeps_agent_alive() {
        let dir = tempfile::tempdir().unwrap();
        let script = r#"for i in 1 2 3 4 5 6; do echo "SNAPSHOT Capture Failed: retry $i"; sleep 0.15; done; echo done"#;
        let bridge = script_bridge(dir.path(), script, Duration::from_millis(500));

        let (items, inv) = collect(bridge.start("go")).await;
        assert_eq!(texts(&items), vec!["done\n".to_string()]);
        assert_eq!(inv.state, InvocationState::Completed);
        assert!(inv.last_output_at.is_some());
    }

    #[tokio::test]
    async fn test_dropping_stream_cancels_process() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = script_bridge(
            dir.path(),
            "echo started; exec sleep 30",
            Duration::from_secs(60),
        );

        let mut output = bridge.start("go");
        let first = output.next().await.unwrap().unwrap();
        assert_eq!(first.text, "started\n");
        let handle = output.handle();
        drop(output);

        let mut state = handle.snapshot().state;
        for _ in 0..100 {
            if state.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            state = handle.snapshot().state;
        }
        assert_eq!(state, InvocationState::Cancelled);

        #[cfg(target_os = "linux")]
        assert!(process_gone(handle.snapshot().pid.unwrap()));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_stream_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig::default()
            .with_install_dir(dir.path())
            .with_launcher("/nonexistent/eva-agent-binary", &[]);
        let bridge = AgentBridge::new(config).unwrap();

        let (items, inv) = collect(bridge.start("go")).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(BridgeError::Spawn { .. })));
        assert_eq!(inv.state, InvocationState::Failed);
    }

    #[test]
    fn test_invalid_noise_pattern_rejected() {
        let mut config = AgentConfig::default();
        config.noise_patterns.push("(unclosed".to_string());
        assert!(matches!(
            AgentBridge::new(config),
            Err(BridgeError::InvalidPattern { .. })
        ));
    }
}
