use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::{Executor, ProcessOutput, RunError};

/// How long output is still collected after the interpreter has exited
const DRAIN_GRACE: Duration = Duration::from_millis(500);

type Captured = Arc<Mutex<Vec<u8>>>;

/// Runs scripts through an external interpreter, one child process per call
///
/// The child gets the script path as its only argument and runs inside the
/// given working directory, as the leader of a fresh process group. Standard
/// output and standard error are drained by two tasks while the runner waits
/// for exit, so a chatty script can never stall on a full pipe. Once the
/// interpreter is gone, by exit or by timeout, everything left in its group is
/// killed. No isolation beyond the wall-clock limit is applied.
pub struct ProcessRunner {
    /// Interpreter executable, resolved through PATH
    command: String,
}

impl ProcessRunner {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl Executor for ProcessRunner {
    async fn run(
        &self,
        script: &Path,
        work_dir: &Path,
        stdin: &str,
        time_limit: Duration,
    ) -> Result<ProcessOutput, RunError> {
        let mut cmd = Command::new(&self.command);
        cmd.arg(script)
            .current_dir(work_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| RunError::Launch {
            command: self.command.clone(),
            source,
        })?;
        // The group id equals the leader's pid; read it before the child is reaped
        let group = child.id();
        log::debug!(
            "Spawned `{}` (pid {group:?}) for {}",
            self.command,
            script.display()
        );

        // Feed stdin from its own task: a script that never reads must not
        // block us before the deadline starts counting.
        let feeder = child.stdin.take().map(|mut pipe| {
            let input = stdin.as_bytes().to_vec();
            tokio::spawn(async move {
                if let Err(e) = pipe.write_all(&input).await {
                    log::debug!("Child stopped accepting input: {e}");
                }
                // Dropping the pipe closes it and signals end of input
            })
        });
        let stdout = Captured::default();
        let stderr = Captured::default();
        let mut drains: Vec<JoinHandle<()>> = [
            child.stdout.take().map(|pipe| spawn_drain(pipe, stdout.clone())),
            child.stderr.take().map(|pipe| spawn_drain(pipe, stderr.clone())),
        ]
        .into_iter()
        .flatten()
        .collect();

        let waited = timeout(time_limit, child.wait()).await;
        kill_process_group(group);

        let status = match waited {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                abort_all(feeder, &drains);
                return Err(RunError::Wait(e));
            }
            Err(_) => {
                log::warn!(
                    "`{}` exceeded {time_limit:?} on {}, killed it",
                    self.command,
                    script.display()
                );
                // kill() also reaps the child, so no zombie is left behind
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill timed out child: {e}");
                }
                abort_all(feeder, &drains);
                return Err(RunError::Timeout { after: time_limit });
            }
        };

        // Pipes close once the last holder in the group is gone. A holder that
        // escaped the group is abandoned after the grace period.
        let joined = timeout(DRAIN_GRACE, async {
            for drain in &mut drains {
                let _ = drain.await;
            }
        })
        .await;
        if joined.is_err() {
            log::warn!(
                "Output of `{}` still open {DRAIN_GRACE:?} after exit, keeping what arrived",
                self.command
            );
        }
        abort_all(feeder, &drains);

        log::debug!("`{}` exited with {status}", self.command);
        Ok(ProcessOutput::new(
            status.code(),
            std::mem::take(&mut *stdout.lock()),
            std::mem::take(&mut *stderr.lock()),
        ))
    }
}

fn spawn_drain<R>(mut pipe: R, sink: Captured) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => sink.lock().extend_from_slice(&chunk[..n]),
                Err(e) => {
                    log::debug!("Stopped draining child output early: {e}");
                    break;
                }
            }
        }
    })
}

fn abort_all(feeder: Option<JoinHandle<()>>, drains: &[JoinHandle<()>]) {
    feeder.iter().chain(drains).for_each(JoinHandle::abort);
}

/// Sends SIGKILL to every process still in the group led by the child
#[cfg(unix)]
fn kill_process_group(group: Option<u32>) {
    let Some(group) = group else {
        return;
    };
    // SAFETY: killpg only sends a signal and touches no memory
    if unsafe { libc::killpg(group as libc::pid_t, libc::SIGKILL) } != 0 {
        let err = std::io::Error::last_os_error();
        // ESRCH: the group is already empty
        if err.raw_os_error() != Some(libc::ESRCH) {
            log::warn!("Failed to kill process group {group}: {err}");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_group: Option<u32>) {}
