use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rerank_common::FailureReason;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub const DEFAULT_MODEL: &str = "gemma3:4b";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Captured stderr is capped so a chatty model cannot blow up the logs.
const MAX_STDERR_BYTES: usize = 4096;

/// What the inference process produced. Nothing here is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub success: bool,
    pub elapsed: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invocation timed out after {0:?}")]
    Timeout(Duration),

    #[error("i/o error talking to model process: {0}")]
    Io(#[from] std::io::Error),
}

impl From<InvokeError> for FailureReason {
    fn from(e: InvokeError) -> Self {
        match e {
            InvokeError::Launch { .. } => FailureReason::Launch(e.to_string()),
            InvokeError::Timeout(d) => FailureReason::Timeout(d.as_millis() as u64),
            InvokeError::Io(source) => FailureReason::Io(source.to_string()),
        }
    }
}

#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Short identifier for logs, e.g. "ollama:gemma3:4b".
    fn name(&self) -> String;

    /// Hand the prompt to the model once. Implementations must not retry.
    async fn invoke(&self, prompt: &str) -> Result<RawOutput, InvokeError>;
}

/// Command line of the inference process.
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl InvokerConfig {
    /// `<bin> run <model>`, the prompt arriving on stdin.
    pub fn ollama(bin: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: bin.into(),
            args: vec!["run".to_string(), model.into()],
            timeout,
        }
    }
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self::ollama("ollama", DEFAULT_MODEL, DEFAULT_TIMEOUT)
    }
}

/// Spawns one child process per invocation.
pub struct ProcessInvoker {
    pub config: InvokerConfig,
}

impl ProcessInvoker {
    pub fn new(config: InvokerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ModelInvoker for ProcessInvoker {
    fn name(&self) -> String {
        std::iter::once(self.config.program.as_str())
            .chain(self.config.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn invoke(&self, prompt: &str) -> Result<RawOutput, InvokeError> {
        let start = Instant::now();

        // kill_on_drop: when the timeout drops the future below, the child dies with it.
        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| InvokeError::Launch {
                program: self.config.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let input = prompt.as_bytes().to_vec();

        let run = async move {
            let write = async {
                if let Some(mut stdin) = stdin {
                    match stdin.write_all(&input).await {
                        // The process may exit without reading its input.
                        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                            tracing::debug!("model process closed stdin early");
                        }
                        other => other?,
                    }
                    // Dropping stdin sends EOF.
                }
                Ok::<(), std::io::Error>(())
            };
            let (written, output) = tokio::join!(write, child.wait_with_output());
            written.and(output)
        };

        let output = match tokio::time::timeout(self.config.timeout, run).await {
            Ok(result) => result?,
            Err(_) => return Err(InvokeError::Timeout(self.config.timeout)),
        };

        let stderr_end = output.stderr.len().min(MAX_STDERR_BYTES);
        Ok(RawOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr[..stderr_end]).into_owned(),
            exit_code: output.status.code(),
            success: output.status.success(),
            elapsed: start.elapsed(),
        })
    }
}

/// Canned reply for [`StubInvoker`].
#[derive(Debug, Clone)]
pub enum StubReply {
    Output { stdout: String, exit_code: i32 },
    Timeout,
    LaunchFailure,
}

/// In-process invoker that replays a fixed reply. Counts its calls.
#[derive(Debug)]
pub struct StubInvoker {
    reply: StubReply,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubInvoker {
    pub fn new(reply: StubReply) -> Self {
        Self {
            reply,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn stdout(stdout: impl Into<String>) -> Self {
        Self::new(StubReply::Output {
            stdout: stdout.into(),
            exit_code: 0,
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ModelInvoker for StubInvoker {
    fn name(&self) -> String {
        "stub".to_string()
    }

    async fn invoke(&self, _prompt: &str) -> Result<RawOutput, InvokeError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.reply {
            StubReply::Output { stdout, exit_code } => Ok(RawOutput {
                stdout: stdout.clone(),
                stderr: String::new(),
                exit_code: Some(*exit_code),
                success: *exit_code == 0,
                elapsed: self.delay,
            }),
            StubReply::Timeout => Err(InvokeError::Timeout(DEFAULT_TIMEOUT)),
            StubReply::LaunchFailure => Err(InvokeError::Launch {
                program: "stub".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            }),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> ProcessInvoker {
        ProcessInvoker::new(InvokerConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            timeout,
        })
    }

    #[tokio::test]
    async fn test_prompt_reaches_stdin() {
        let inv = sh("cat", Duration::from_secs(5));
        let out = inv.invoke("CTX: 1.0\nCANDIDATES:").await.unwrap();
        assert!(out.success);
        assert_eq!(out.exit_code, Some(0));
        assert_eq!(out.stdout, "CTX: 1.0\nCANDIDATES:");
    }

    #[tokio::test]
    async fn test_captures_stdout_stderr_and_status() {
        let inv = sh(
            "cat >/dev/null; echo '[1,0]'; echo oops >&2; exit 3",
            Duration::from_secs(5),
        );
        let out = inv.invoke("prompt").await.unwrap();
        assert!(!out.success);
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout.trim(), "[1,0]");
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_ignores_unread_stdin() {
        let inv = sh("echo '[2]'", Duration::from_secs(5));
        let prompt = "x".repeat(1 << 20);
        let out = inv.invoke(&prompt).await.unwrap();
        assert_eq!(out.stdout.trim(), "[2]");
    }

    #[tokio::test]
    async fn test_timeout() {
        let inv = sh("exec sleep 5", Duration::from_millis(200));
        let start = Instant::now();
        let err = inv.invoke("prompt").await.unwrap_err();
        assert!(matches!(err, InvokeError::Timeout(_)));
        assert!(start.elapsed() < Duration::from_secs(4));
        assert_eq!(FailureReason::from(err), FailureReason::Timeout(200));
    }

    #[tokio::test]
    async fn test_launch_failure() {
        let inv = ProcessInvoker::new(InvokerConfig {
            program: "/nonexistent/ollama".to_string(),
            args: vec![],
            timeout: Duration::from_secs(1),
        });
        let err = inv.invoke("prompt").await.unwrap_err();
        assert!(matches!(err, InvokeError::Launch { .. }));
        assert_eq!(FailureReason::from(err).kind(), "launch");
    }

    #[test]
    fn test_ollama_command_line() {
        let inv = ProcessInvoker::new(InvokerConfig::default());
        assert_eq!(inv.name(), "ollama run gemma3:4b");
        assert_eq!(inv.config.timeout, Duration::from_secs(15));
    }
}
