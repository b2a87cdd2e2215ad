mod executor;
mod process_runner;
mod scripted;
mod workspace;

pub use executor::{Executor, ProcessOutput, RunError};
pub use process_runner::ProcessRunner;
pub use scripted::{Invocation, ScriptedExecutor};
pub use workspace::{ScriptWorkspace, WorkspaceError};

use std::sync::Arc;

use crate::config::RunnerConfig;

/// Creates the executor used for real grading runs
///
/// The interpreter is looked up on PATH only to warn early; a missing
/// interpreter still yields a runner, whose launch failures are then reported
/// per test case as infrastructure errors. Degraded mode is never chosen here:
/// it is selected exclusively by `use_real_runner = false`.
pub fn create_executor(config: &RunnerConfig) -> Arc<dyn Executor> {
    if !config.use_real_runner {
        log::warn!(
            "Real interpreter disabled: grading falls back to approximate substring matching"
        );
    } else if interpreter_on_path(&config.interpreter_command) {
        log::info!(
            "Creating ProcessRunner with interpreter `{}`",
            config.interpreter_command
        );
    } else {
        log::warn!(
            "Interpreter `{}` was not found on PATH, submissions will fail to launch",
            config.interpreter_command
        );
    }

    Arc::new(ProcessRunner::new(config.interpreter_command.clone()))
}

fn interpreter_on_path(command: &str) -> bool {
    std::process::Command::new("which")
        .arg(command)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
