// Process Launcher Port - OS subprocess lifecycle for one task run
//
// `launch` is infallible by contract: spawn failures, read failures and
// terminations are all folded into the outcome's fields and warnings, so
// the coordinator can build an ExecutionResult from any exit path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::TaskName;
use crate::port::OutputSink;

/// Raw outcome of one subprocess run, before verification policy.
#[derive(Debug, Clone, Default)]
pub struct LaunchOutcome {
    /// `None` if the process never spawned or could not be waited on.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub warnings: Vec<String>,
}

/// Termination errors (the only fallible launcher operation).
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("failed to terminate pid {pid}: {reason}")]
    Kill { pid: i32, reason: String },
}

/// Invoked once, with the child's pid, as soon as the process exists.
/// The coordinator uses it to route the pid into the run registry.
pub type SpawnNotifier = Box<dyn FnOnce(i32) + Send>;

#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Run one task to completion: spawn `[runner, task]` (never through a
    /// shell), stream stdout line-by-line to `sink`, capture stderr
    /// best-effort, and enforce `timeout` with graceful-then-forced
    /// termination.
    async fn launch(
        &self,
        task: &TaskName,
        sink: Option<Arc<dyn OutputSink>>,
        timeout: Duration,
        on_spawn: SpawnNotifier,
    ) -> LaunchOutcome;

    /// Graceful termination of a pid: SIGTERM, bounded grace wait, SIGKILL
    /// escalation if still alive.
    async fn kill(&self, pid: i32) -> Result<(), LaunchError>;

    /// Signal-0 style liveness probe. Never trust a "running" flag alone.
    fn is_alive(&self, pid: i32) -> bool;
}

pub mod mocks {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Mutex;

    /// Scripted launcher for exercising the coordinator and registry
    /// without real processes.
    ///
    /// Each `launch` call allocates a fresh pid, marks it alive for the
    /// configured delay, then returns a clone of the scripted outcome.
    pub struct MockLauncher {
        outcome: Mutex<LaunchOutcome>,
        delay: Option<Duration>,
        next_pid: AtomicI32,
        alive: Mutex<HashSet<i32>>,
        kills: Mutex<Vec<i32>>,
    }

    impl MockLauncher {
        pub fn new(outcome: LaunchOutcome) -> Self {
            Self {
                outcome: Mutex::new(outcome),
                delay: None,
                next_pid: AtomicI32::new(1000),
                alive: Mutex::new(HashSet::new()),
                kills: Mutex::new(Vec::new()),
            }
        }

        /// Launcher that reports exit 0 with the given transcript.
        pub fn succeed_with(stdout: &str) -> Self {
            Self::new(LaunchOutcome {
                exit_code: Some(0),
                stdout: stdout.to_string(),
                ..Default::default()
            })
        }

        /// Keep each launched pid alive for `delay` before returning.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn set_outcome(&self, outcome: LaunchOutcome) {
            *self.outcome.lock().unwrap() = outcome;
        }

        /// Simulate an external process death (for self-healing tests).
        pub fn mark_dead(&self, pid: i32) {
            self.alive.lock().unwrap().remove(&pid);
        }

        pub fn mark_alive(&self, pid: i32) {
            self.alive.lock().unwrap().insert(pid);
        }

        pub fn kills(&self) -> Vec<i32> {
            self.kills.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProcessLauncher for MockLauncher {
        async fn launch(
            &self,
            _task: &TaskName,
            sink: Option<Arc<dyn OutputSink>>,
            _timeout: Duration,
            on_spawn: SpawnNotifier,
        ) -> LaunchOutcome {
            let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
            self.alive.lock().unwrap().insert(pid);
            on_spawn(pid);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let mut outcome = self.outcome.lock().unwrap().clone();
            if let Some(sink) = sink {
                for line in outcome.stdout.lines() {
                    if let Err(e) = sink.deliver(line) {
                        outcome.warnings.push(format!("output sink failed: {e}"));
                    }
                }
            }

            self.alive.lock().unwrap().remove(&pid);
            outcome
        }

        async fn kill(&self, pid: i32) -> Result<(), LaunchError> {
            self.kills.lock().unwrap().push(pid);
            self.alive.lock().unwrap().remove(&pid);
            Ok(())
        }

        fn is_alive(&self, pid: i32) -> bool {
            self.alive.lock().unwrap().contains(&pid)
        }
    }
}
