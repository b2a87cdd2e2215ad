use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Executor, ProcessOutput, RunError};

/// One recorded call to a [`ScriptedExecutor`]
#[derive(Debug, Clone)]
pub struct Invocation {
    pub script: PathBuf,
    /// Contents of the script file at the time of the call
    pub source: String,
    pub stdin: String,
    pub timeout: Duration,
}

type Behaviour = dyn Fn(&Invocation) -> Result<ProcessOutput, RunError> + Send + Sync;

/// Deterministic in-memory executor for grading without an interpreter
///
/// The outcome of every call is computed by a closure from the script source
/// and the input, and every call is recorded for later inspection.
pub struct ScriptedExecutor {
    behaviour: Box<Behaviour>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedExecutor {
    pub fn new<F>(behaviour: F) -> Self
    where
        F: Fn(&Invocation) -> Result<ProcessOutput, RunError> + Send + Sync + 'static,
    {
        Self {
            behaviour: Box::new(behaviour),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call exits cleanly after printing `stdout`
    pub fn printing(stdout: &str) -> Self {
        let stdout = stdout.to_string();
        Self::new(move |_| Ok(ProcessOutput::success(stdout.clone())))
    }

    /// Every call hits the deadline
    pub fn hanging() -> Self {
        Self::new(|call| Err(RunError::Timeout { after: call.timeout }))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn run(
        &self,
        script: &Path,
        _work_dir: &Path,
        stdin: &str,
        timeout: Duration,
    ) -> Result<ProcessOutput, RunError> {
        let source = std::fs::read_to_string(script).map_err(|source| RunError::Launch {
            command: "scripted".to_string(),
            source,
        })?;
        let call = Invocation {
            script: script.to_path_buf(),
            source,
            stdin: stdin.to_string(),
            timeout,
        };

        let outcome = (self.behaviour)(&call);
        self.calls.lock().push(call);
        outcome
    }
}
