// Run Registry - at-most-one in-flight run per task
//
// A single async mutex guards the whole map, so registration, eviction,
// enumeration and cancellation never interleave into an inconsistent
// view. Reads are self-healing: an entry whose process is confirmed dead
// is evicted on sight instead of being reported as running.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::TaskName;
use crate::error::ExecError;
use crate::port::ProcessLauncher;

/// Proof of a successful `claim`. The pid hand-off quotes it back, so a
/// late `set_pid` from a finished run can never touch a newer run of the
/// same task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunToken(u64);

/// One in-flight execution.
#[derive(Debug, Clone)]
pub struct RunState {
    pub task: TaskName,
    /// Set once the OS process is spawned. An entry without a pid is a
    /// spawn in progress and counts as running.
    pub pid: Option<i32>,
    pub started_at_ms: i64,
    generation: u64,
    /// Cancellation arrived before the pid did; terminate on arrival.
    cancel_requested: bool,
}

pub struct RunRegistry {
    launcher: Arc<dyn ProcessLauncher>,
    entries: Mutex<HashMap<TaskName, RunState>>,
    generation: AtomicU64,
}

impl RunRegistry {
    pub fn new(launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self {
            launcher,
            entries: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    fn entry_alive(&self, state: &RunState) -> bool {
        match state.pid {
            Some(pid) => self.launcher.is_alive(pid),
            None => true,
        }
    }

    /// True only if an entry exists AND its process is actually alive.
    /// Stale entries are evicted before answering.
    pub async fn is_running(&self, task: &TaskName) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get(task) {
            Some(state) if self.entry_alive(state) => true,
            Some(state) => {
                warn!(
                    task = %task,
                    started_at_ms = %state.started_at_ms,
                    "evicting stale registry entry (process dead)"
                );
                entries.remove(task);
                false
            }
            None => false,
        }
    }

    /// Task names with a confirmed-alive run; dead entries are evicted.
    pub async fn list_running(&self) -> Vec<TaskName> {
        let mut entries = self.entries.lock().await;
        let stale: Vec<(TaskName, i64)> = entries
            .values()
            .filter(|state| !self.entry_alive(state))
            .map(|state| (state.task.clone(), state.started_at_ms))
            .collect();
        for (task, started_at_ms) in &stale {
            warn!(
                task = %task,
                started_at_ms = %started_at_ms,
                "evicting stale registry entry (process dead)"
            );
            entries.remove(task);
        }
        let mut running: Vec<TaskName> = entries.keys().cloned().collect();
        running.sort();
        running
    }

    /// Atomic check-and-register: claims exclusivity for the task or
    /// fails with `AlreadyRunning`. The check and the insert happen under
    /// one critical section, closing the check-then-act race between two
    /// concurrent callers. The returned token identifies this run for
    /// `set_pid`.
    pub async fn claim(&self, task: &TaskName, now_ms: i64) -> Result<RunToken, ExecError> {
        let mut entries = self.entries.lock().await;
        if let Some(state) = entries.get(task) {
            if self.entry_alive(state) {
                return Err(ExecError::AlreadyRunning(task.to_string()));
            }
            warn!(
                task = %task,
                started_at_ms = %state.started_at_ms,
                "evicting stale registry entry (process dead)"
            );
            entries.remove(task);
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        entries.insert(
            task.clone(),
            RunState {
                task: task.clone(),
                pid: None,
                started_at_ms: now_ms,
                generation,
                cancel_requested: false,
            },
        );
        Ok(RunToken(generation))
    }

    /// Record the spawned pid for the run identified by `token`. A token
    /// from a released or superseded run is ignored, so a delayed hand-off
    /// can never corrupt a newer entry. If cancellation arrived while the
    /// pid was in flight, the process is terminated here instead.
    pub async fn set_pid(&self, task: TaskName, token: RunToken, pid: i32) {
        let mut entries = self.entries.lock().await;
        let Some(state) = entries.get_mut(&task) else {
            warn!(task = %task, pid = %pid, "ignoring pid hand-off for a released run");
            return;
        };
        if state.generation != token.0 {
            warn!(task = %task, pid = %pid, "ignoring pid hand-off for a superseded run");
            return;
        }
        if !state.cancel_requested {
            state.pid = Some(pid);
            return;
        }
        entries.remove(&task);
        drop(entries);
        match self.launcher.kill(pid).await {
            Ok(()) => info!(task = %task, pid = %pid, "terminated run cancelled before spawn"),
            Err(e) => warn!(task = %task, pid = %pid, error = %e, "failed to terminate task"),
        }
    }

    /// Remove the entry unconditionally (completion, error, cleanup).
    pub async fn release(&self, task: &TaskName) {
        self.entries.lock().await.remove(task);
    }

    /// Terminate a task's in-flight run: SIGTERM, bounded grace wait,
    /// SIGKILL escalation (inside the launcher). An entry with a known pid
    /// is removed even when termination errors, so the system never
    /// reports a permanently-stuck running task. If the pid has not landed
    /// yet the entry stays, flagged so `set_pid` terminates the process
    /// the moment it is known. Returns whether a process was terminated.
    pub async fn cancel(&self, task: &TaskName) -> bool {
        let mut entries = self.entries.lock().await;
        let Some(state) = entries.get_mut(task) else {
            return false;
        };
        let Some(pid) = state.pid else {
            // Pid hand-off still in flight; set_pid terminates on arrival.
            state.cancel_requested = true;
            warn!(task = %task, "cancel requested before the process spawned");
            return false;
        };
        entries.remove(task);
        match self.launcher.kill(pid).await {
            Ok(()) => {
                info!(task = %task, pid = %pid, "cancelled running task");
                true
            }
            Err(e) => {
                warn!(task = %task, pid = %pid, error = %e, "failed to terminate task");
                false
            }
        }
    }

    /// Entries whose recorded process is no longer alive (health check;
    /// does not evict).
    pub async fn stale_count(&self) -> usize {
        let entries = self.entries.lock().await;
        entries
            .values()
            .filter(|state| !self.entry_alive(state))
            .count()
    }
}
