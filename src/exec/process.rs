// src/exec/process.rs

//! Spawning and killing rule commands.

use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::engine::RunOutcome;
use crate::errors::ProcessError;
use crate::output::StreamWriter;
use crate::types::KillSignal;

/// How long stream readers may keep draining after a canceled run exits.
const CANCELED_DRAIN: Duration = Duration::from_secs(1);

/// Runs shell commands in their own process group.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner {
    kill_signal: KillSignal,
    kill_timeout: Option<Duration>,
}

impl ProcessRunner {
    /// `kill_timeout` is the grace period before escalating to SIGKILL when
    /// `kill_signal` is something gentler; `None` disables escalation.
    pub fn new(kill_signal: KillSignal, kill_timeout: Option<Duration>) -> Self {
        Self {
            kill_signal,
            kill_timeout,
        }
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::new(cfg.kill_signal, cfg.kill_timeout)
    }

    /// Run `command` through `sh -c` with exactly `env` as its environment.
    ///
    /// The child leads a new process group. When `cancel` fires, the whole
    /// group receives the configured signal (and SIGKILL after the grace
    /// period, if configured) and the run resolves to
    /// [`RunOutcome::Canceled`]. A child killed by SIGKILL from elsewhere is
    /// reported the same way.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        command: &str,
        env: &[String],
        stdout: StreamWriter,
        stderr: StreamWriter,
    ) -> Result<RunOutcome, ProcessError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .env_clear()
            .envs(env.iter().filter_map(|kv| kv.split_once('=')))
            .process_group(0)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            command: command.to_string(),
            source,
        })?;
        let pid = child.id();
        debug!(?pid, %command, "spawned process group");

        let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            readers.push(spawn_reader(stdout, out));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(spawn_reader(stderr, err));
        }

        let mut canceled = false;
        let status = tokio::select! {
            status = child.wait() => status,
            _ = cancel.cancelled() => {
                canceled = true;
                self.terminate(&mut child, pid).await
            }
        };

        for reader in readers {
            if canceled {
                let abort = reader.abort_handle();
                if timeout(CANCELED_DRAIN, reader).await.is_err() {
                    debug!(?pid, "output still open after cancel; dropping reader");
                    abort.abort();
                }
            } else {
                let _ = reader.await;
            }
        }

        let status = status.map_err(ProcessError::Wait)?;
        outcome_from_status(status, canceled)
    }

    async fn terminate(&self, child: &mut Child, pid: Option<u32>) -> std::io::Result<ExitStatus> {
        // No pid means the child was already reaped.
        let Some(pid) = pid else {
            return child.wait().await;
        };
        let group = Pid::from_raw(pid as i32);
        let signal = self.kill_signal.signal();

        info!(pid, %signal, "canceling run; signaling process group");
        signal_group(group, signal);

        if self.kill_signal.is_unconditional() {
            return child.wait().await;
        }

        match self.kill_timeout {
            None => child.wait().await,
            Some(grace) => match timeout(grace, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    warn!(pid, ?grace, "process group still running; escalating to SIGKILL");
                    signal_group(group, Signal::SIGKILL);
                    child.wait().await
                }
            },
        }
    }
}

fn spawn_reader<R>(writer: StreamWriter, reader: R) -> JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let title = writer.id().title.clone();
        if let Err(err) = writer.forward(reader).await {
            debug!(rule = %title, error = %err, "output stream closed with error");
        }
    })
}

fn signal_group(group: Pid, signal: Signal) {
    if let Err(errno) = killpg(group, signal) {
        // ESRCH: the group is already gone.
        debug!(%group, %signal, %errno, "killpg failed");
    }
}

fn outcome_from_status(status: ExitStatus, canceled: bool) -> Result<RunOutcome, ProcessError> {
    if canceled || status.signal() == Some(Signal::SIGKILL as i32) {
        return Ok(RunOutcome::Canceled);
    }
    if status.success() {
        return Ok(RunOutcome::Success);
    }
    match (status.code(), status.signal()) {
        (Some(code), _) => Err(ProcessError::Exited { code }),
        (None, Some(signal)) => Err(ProcessError::Signaled { signal }),
        (None, None) => Err(ProcessError::Exited { code: -1 }),
    }
}
