// Subprocess launcher
// Owns the OS-level lifecycle of one task invocation: spawn the runner
// with an explicit argument vector (never a shell), stream stdout line by
// line, capture stderr best-effort, and race a timeout watchdog that
// escalates SIGTERM -> SIGKILL.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

use helmsman_core::application::constants::{GRACEFUL_SHUTDOWN_TIMEOUT_MS, KILL_POLL_INTERVAL};
use helmsman_core::domain::TaskName;
use helmsman_core::port::{
    LaunchError, LaunchOutcome, OutputSink, ProcessLauncher, SpawnNotifier,
};

/// Launches `[runner, task]` in a fixed working directory.
pub struct SubprocessLauncher {
    runner: String,
    workdir: std::path::PathBuf,
}

impl SubprocessLauncher {
    /// # Arguments
    /// * `runner` - task runner program (e.g. `make`)
    /// * `workdir` - directory containing the runner's definition file
    pub fn new(runner: impl Into<String>, workdir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            runner: runner.into(),
            workdir: workdir.into(),
        }
    }
}

#[async_trait]
impl ProcessLauncher for SubprocessLauncher {
    async fn launch(
        &self,
        task: &TaskName,
        sink: Option<Arc<dyn OutputSink>>,
        timeout: Duration,
        on_spawn: SpawnNotifier,
    ) -> LaunchOutcome {
        let mut outcome = LaunchOutcome::default();

        info!(
            task = %task,
            runner = %self.runner,
            workdir = %self.workdir.display(),
            timeout = ?timeout,
            "spawning task runner"
        );

        let mut child = match Command::new(&self.runner)
            .arg(task.as_str())
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(task = %task, error = %e, "failed to spawn task runner");
                outcome
                    .warnings
                    .push(format!("failed to spawn task runner: {e}"));
                return outcome;
            }
        };

        if let Some(pid) = child.id() {
            on_spawn(pid as i32);
        }

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let mut timed_out = false;
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        // Stream stdout line by line; the watchdog races the read. After
        // the deadline fires we keep draining until the pipe closes.
        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                tokio::select! {
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            outcome.stdout.push_str(&line);
                            outcome.stdout.push('\n');
                            if let Some(sink) = &sink {
                                if let Err(e) = sink.deliver(&line) {
                                    warn!(task = %task, error = %e, "output sink failed");
                                    outcome.warnings.push(format!("output sink failed: {e}"));
                                }
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!(task = %task, error = %e, "stdout read failed");
                            outcome.warnings.push(format!("stdout read failed: {e}"));
                            break;
                        }
                    },
                    _ = &mut deadline, if !timed_out => {
                        timed_out = true;
                        warn!(task = %task, timeout = ?timeout, "task timeout exceeded");
                        outcome.warnings.push(format!(
                            "task exceeded {timeout:?} timeout, terminating"
                        ));
                        if let Some(pid) = child.id() {
                            let pid = pid as i32;
                            tokio::spawn(async move {
                                if let Err(e) = kill_graceful(pid).await {
                                    warn!(pid = %pid, error = %e, "failed to terminate timed-out task");
                                }
                            });
                        }
                    }
                }
            }
        } else {
            outcome
                .warnings
                .push("stdout pipe unavailable".to_string());
        }

        let exit_code = match child.wait().await {
            Ok(status) => {
                if let Some(signal) = termination_signal(&status) {
                    if !timed_out {
                        outcome
                            .warnings
                            .push(format!("task terminated by signal {signal}"));
                    }
                    timed_out = true;
                }
                status.code()
            }
            Err(e) => {
                warn!(task = %task, error = %e, "process wait failed");
                outcome.warnings.push(format!("process wait failed: {e}"));
                None
            }
        };

        // An unconfirmed exit is never trusted as a normal completion.
        if exit_code.is_none() && !timed_out {
            outcome
                .warnings
                .push("task may have been terminated before completing".to_string());
            timed_out = true;
        }

        // Best-effort stderr, read once after stdout is exhausted.
        if let Some(mut stderr) = stderr {
            if let Err(e) = stderr.read_to_string(&mut outcome.stderr).await {
                warn!(task = %task, error = %e, "stderr read failed");
                outcome.warnings.push(format!("stderr read failed: {e}"));
            }
        }

        outcome.exit_code = exit_code;
        outcome.timed_out = timed_out;

        info!(
            task = %task,
            exit_code = ?outcome.exit_code,
            timed_out = %outcome.timed_out,
            warning_count = %outcome.warnings.len(),
            "task runner exited"
        );

        outcome
    }

    async fn kill(&self, pid: i32) -> Result<(), LaunchError> {
        kill_graceful(pid).await
    }

    fn is_alive(&self, pid: i32) -> bool {
        probe_alive(pid)
    }
}

/// SIGTERM first, poll for exit during the grace period, SIGKILL if the
/// process is still alive afterwards.
async fn kill_graceful(pid: i32) -> Result<(), LaunchError> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        info!(pid = %pid, "sending SIGTERM for graceful shutdown");
        kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(|e| LaunchError::Kill {
            pid,
            reason: format!("SIGTERM failed: {e}"),
        })?;

        let deadline = tokio::time::Instant::now()
            + Duration::from_millis(GRACEFUL_SHUTDOWN_TIMEOUT_MS as u64);
        loop {
            tokio::time::sleep(KILL_POLL_INTERVAL).await;

            if !probe_alive(pid) {
                info!(pid = %pid, "process exited gracefully after SIGTERM");
                return Ok(());
            }

            if tokio::time::Instant::now() >= deadline {
                warn!(pid = %pid, "process did not exit after SIGTERM, sending SIGKILL");
                kill(Pid::from_raw(pid), Signal::SIGKILL).map_err(|e| LaunchError::Kill {
                    pid,
                    reason: format!("SIGKILL failed: {e}"),
                })?;
                return Ok(());
            }
        }
    }

    #[cfg(windows)]
    {
        use std::process::Command;

        info!(pid = %pid, "killing process on Windows");
        let output = Command::new("taskkill")
            .args(["/F", "/PID", &pid.to_string()])
            .output()
            .map_err(|e| LaunchError::Kill {
                pid,
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(LaunchError::Kill {
                pid,
                reason: format!(
                    "taskkill failed: {}",
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }

        Ok(())
    }
}

fn probe_alive(pid: i32) -> bool {
    #[cfg(unix)]
    {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        // Signal 0 checks existence without sending anything.
        kill(Pid::from_raw(pid), None).is_ok()
    }

    #[cfg(windows)]
    {
        use std::process::Command;

        let output = Command::new("tasklist")
            .args(["/FI", &format!("PID eq {pid}"), "/NH"])
            .output();

        match output {
            Ok(output) => String::from_utf8_lossy(&output.stdout).contains(&pid.to_string()),
            Err(_) => false,
        }
    }
}

/// Exit-by-SIGTERM/SIGKILL is indistinguishable from a watchdog kill and
/// is interpreted the same way.
fn termination_signal(status: &std::process::ExitStatus) -> Option<i32> {
    #[cfg(unix)]
    {
        use nix::sys::signal::Signal;
        use std::os::unix::process::ExitStatusExt;

        match status.signal() {
            Some(sig) if sig == Signal::SIGTERM as i32 || sig == Signal::SIGKILL as i32 => {
                Some(sig)
            }
            _ => None,
        }
    }

    #[cfg(not(unix))]
    {
        let _ = status;
        None
    }
}
