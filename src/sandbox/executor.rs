use std::borrow::Cow;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

/// Everything captured from an interpreter invocation that exited on its own
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Set whenever the exit code is anything but 0
    pub error: bool,
}

impl ProcessOutput {
    pub fn new(exit_code: Option<i32>, stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            error: exit_code != Some(0),
        }
    }

    /// A clean exit with the given standard output
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self::new(Some(0), stdout.into(), Vec::new())
    }

    /// A non-zero exit with the given standard error
    pub fn failure(exit_code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self::new(Some(exit_code), Vec::new(), stderr.into())
    }

    pub fn stdout_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

/// Ways an invocation can end without a usable [`ProcessOutput`]
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The process outlived its deadline and was killed
    #[error("timed out after {after:?}")]
    Timeout { after: Duration },

    /// The interpreter could not be started at all
    #[error("failed to start `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for the interpreter: {0}")]
    Wait(#[source] std::io::Error),
}

impl RunError {
    /// Whether the failure lies with the grading host rather than the submitted code
    pub fn is_infrastructure(&self) -> bool {
        !matches!(self, Self::Timeout { .. })
    }
}

/// Capability to run one script against one input
///
/// Implementations must never block past `timeout` (plus a small teardown
/// overhead), and must treat `work_dir` as exclusively theirs for the call.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn run(
        &self,
        script: &Path,
        work_dir: &Path,
        stdin: &str,
        timeout: Duration,
    ) -> Result<ProcessOutput, RunError>;
}
