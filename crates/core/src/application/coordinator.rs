// Execution Coordinator - orchestrates one task run end to end
//
// validate -> claim registry slot -> check definition exists -> launch ->
// release slot -> apply verification -> record history. Only the three
// precondition failures surface as errors; every anomaly after launch is
// captured inside the returned ExecutionResult.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use regex::RegexBuilder;
use tracing::info;

use crate::application::history::ExecutionHistory;
use crate::application::registry::RunRegistry;
use crate::domain::{strip_ansi, ExecutionRecord, ExecutionResult, TaskName};
use crate::error::{ExecError, Result};
use crate::port::{OutputSink, ProcessLauncher, SpawnNotifier, TaskCatalog, TimeProvider};

/// One execution request.
///
/// The sink is passed through to the launcher unchanged: the caller's
/// observer sees lines in real time, in emission order, with no batching
/// introduced by the coordinator.
pub struct ExecuteRequest {
    pub task: String,
    pub sink: Option<Arc<dyn OutputSink>>,
    pub verify_pattern: Option<String>,
    pub timeout_override: Option<Duration>,
}

impl ExecuteRequest {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            sink: None,
            verify_pattern: None,
            timeout_override: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_verify_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.verify_pattern = Some(pattern.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_override = Some(timeout);
        self
    }
}

/// Health check snapshot of the execution core.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Health {
    pub accessible: bool,
    pub stale_process_count: usize,
    pub history_count: usize,
    pub healthy: bool,
}

pub struct Coordinator {
    catalog: Arc<dyn TaskCatalog>,
    launcher: Arc<dyn ProcessLauncher>,
    registry: Arc<RunRegistry>,
    history: Mutex<ExecutionHistory>,
    time_provider: Arc<dyn TimeProvider>,
    default_timeout: Duration,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Build the coordinator, failing fast if the task-runner workspace
    /// is not usable or the timeout is zero.
    pub fn new(
        catalog: Arc<dyn TaskCatalog>,
        launcher: Arc<dyn ProcessLauncher>,
        time_provider: Arc<dyn TimeProvider>,
        default_timeout: Duration,
    ) -> Result<Self> {
        if default_timeout.is_zero() {
            return Err(ExecError::Config(
                "default timeout must be positive".to_string(),
            ));
        }
        if !catalog.accessible() {
            return Err(ExecError::Config(
                "task-runner workspace or definition file is not accessible".to_string(),
            ));
        }
        let registry = Arc::new(RunRegistry::new(Arc::clone(&launcher)));
        info!(default_timeout_secs = %default_timeout.as_secs(), "coordinator initialized");
        Ok(Self {
            catalog,
            launcher,
            registry,
            history: Mutex::new(ExecutionHistory::new()),
            time_provider,
            default_timeout,
        })
    }

    /// Run one task to completion.
    ///
    /// # Errors
    /// - `InvalidCommand` if the name fails the character/length gate
    /// - `AlreadyRunning` if the task has an in-flight run
    /// - `UnknownTask` if the definition file does not declare the task
    ///
    /// Everything past these preconditions is captured in the result.
    pub async fn execute(&self, request: ExecuteRequest) -> Result<ExecutionResult> {
        let task = TaskName::parse(&request.task)?;

        let claimed_at = self.time_provider.now_millis();
        let token = self.registry.claim(&task, claimed_at).await?;

        if !self.catalog.task_exists(&task) {
            self.registry.release(&task).await;
            return Err(ExecError::UnknownTask(task.to_string()));
        }

        let timeout = request
            .timeout_override
            .filter(|t| !t.is_zero())
            .unwrap_or(self.default_timeout);

        info!(task = %task, timeout_secs = %timeout.as_secs(), "starting task execution");

        let started_ms = self.time_provider.now_millis();
        let on_spawn: SpawnNotifier = {
            let registry = Arc::clone(&self.registry);
            let task = task.clone();
            Box::new(move |pid| {
                tokio::spawn(async move {
                    registry.set_pid(task, token, pid).await;
                });
            })
        };

        let outcome = self
            .launcher
            .launch(&task, request.sink, timeout, on_spawn)
            .await;

        // Guaranteed release regardless of how the launch ended.
        self.registry.release(&task).await;

        let duration_ms = self.time_provider.now_millis() - started_ms;
        let mut warnings = outcome.warnings;
        let success = outcome.exit_code == Some(0) && !outcome.timed_out;
        let verification_passed = apply_verification(
            request.verify_pattern.as_deref(),
            success,
            &outcome.stdout,
            &mut warnings,
        );

        let result = ExecutionResult {
            task: task.clone(),
            exit_code: outcome.exit_code,
            output: outcome.stdout,
            error_output: outcome.stderr,
            duration_ms,
            timestamp_ms: started_ms,
            timed_out: outcome.timed_out,
            verification_passed,
            warnings,
        };

        self.history.lock().unwrap().push(result.to_record());

        info!(
            task = %task,
            exit_code = ?result.exit_code,
            duration_ms = %duration_ms,
            timed_out = %result.timed_out,
            verification_passed = %result.verification_passed,
            warning_count = %result.warnings.len(),
            "task execution completed"
        );

        Ok(result)
    }

    /// Whether the task currently has a confirmed-alive run. Names that
    /// fail validation cannot be running.
    pub async fn is_running(&self, task: &str) -> bool {
        match TaskName::parse(task) {
            Ok(task) => self.registry.is_running(&task).await,
            Err(_) => false,
        }
    }

    pub async fn list_running(&self) -> Vec<TaskName> {
        self.registry.list_running().await
    }

    /// Cancel an in-flight run. Returns whether a process was terminated.
    pub async fn cancel(&self, task: &str) -> bool {
        match TaskName::parse(task) {
            Ok(task) => self.registry.cancel(&task).await,
            Err(_) => false,
        }
    }

    /// Oldest-first audit history (bounded).
    pub fn history(&self) -> Vec<ExecutionRecord> {
        self.history.lock().unwrap().snapshot()
    }

    pub async fn health_check(&self) -> Health {
        let accessible = self.catalog.accessible();
        let stale_process_count = self.registry.stale_count().await;
        let history_count = self.history.lock().unwrap().len();
        Health {
            accessible,
            stale_process_count,
            history_count,
            healthy: accessible && stale_process_count == 0,
        }
    }

    pub(crate) fn catalog(&self) -> &Arc<dyn TaskCatalog> {
        &self.catalog
    }
}

/// Verification policy: with no pattern the verdict mirrors basic
/// success; with a pattern, a successful run must contain it
/// (case-insensitive, multiline, over ANSI-stripped output).
fn apply_verification(
    pattern: Option<&str>,
    success: bool,
    output: &str,
    warnings: &mut Vec<String>,
) -> bool {
    let Some(pattern) = pattern else {
        return success;
    };
    if !success {
        return false;
    }
    match RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
    {
        Ok(re) => {
            if re.is_match(&strip_ansi(output)) {
                true
            } else {
                warnings.push(format!(
                    "output verification failed: pattern '{pattern}' not found"
                ));
                false
            }
        }
        Err(e) => {
            warnings.push(format!("output verification error: {e}"));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::output_sink::mocks::{CollectSink, FailingSink};
    use crate::port::process_launcher::mocks::MockLauncher;
    use crate::port::process_launcher::LaunchOutcome;
    use crate::port::task_catalog::mocks::MockCatalog;
    use crate::port::time_provider::SystemTimeProvider;

    fn coordinator_with(launcher: Arc<MockLauncher>, tasks: &[&str]) -> Arc<Coordinator> {
        let catalog = Arc::new(MockCatalog::new(tasks));
        Arc::new(
            Coordinator::new(
                catalog,
                launcher,
                Arc::new(SystemTimeProvider),
                Duration::from_secs(60),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn rejects_invalid_name_before_anything_else() {
        let launcher = Arc::new(MockLauncher::succeed_with(""));
        let coordinator = coordinator_with(launcher, &["test"]);

        let err = coordinator
            .execute(ExecuteRequest::new("rm -rf /"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::InvalidCommand(_)));
        assert!(coordinator.history().is_empty());
    }

    #[tokio::test]
    async fn unknown_task_releases_the_claim() {
        let launcher = Arc::new(MockLauncher::succeed_with(""));
        let coordinator = coordinator_with(launcher, &["test"]);

        let err = coordinator
            .execute(ExecuteRequest::new("deploy"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::UnknownTask(_)));
        // The failed attempt must not leave a stuck registry entry.
        assert!(!coordinator.is_running("deploy").await);
    }

    #[tokio::test]
    async fn successful_run_without_pattern() {
        let launcher = Arc::new(MockLauncher::succeed_with("building\nall done\n"));
        let coordinator = coordinator_with(launcher, &["test"]);

        let result = coordinator
            .execute(ExecuteRequest::new("test"))
            .await
            .unwrap();
        assert_eq!(result.exit_code, Some(0));
        assert!(result.verification_passed);
        assert!(result.fully_successful());
        assert!(result.warnings.is_empty());
        assert_eq!(coordinator.history().len(), 1);
        assert!(coordinator.history()[0].success);
    }

    #[tokio::test]
    async fn verification_is_case_insensitive() {
        let launcher = Arc::new(MockLauncher::succeed_with("task finished: done\n"));
        let coordinator = coordinator_with(launcher, &["test"]);

        let result = coordinator
            .execute(ExecuteRequest::new("test").with_verify_pattern("DONE"))
            .await
            .unwrap();
        assert!(result.verification_passed);
        assert!(result.fully_successful());
    }

    #[tokio::test]
    async fn missing_pattern_fails_verification_with_warning() {
        let launcher = Arc::new(MockLauncher::succeed_with("nothing to see\n"));
        let coordinator = coordinator_with(launcher, &["test"]);

        let result = coordinator
            .execute(ExecuteRequest::new("test").with_verify_pattern("DONE"))
            .await
            .unwrap();
        assert_eq!(result.exit_code, Some(0));
        assert!(!result.verification_passed);
        assert!(!result.fully_successful());
        assert!(result.critical_failure());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("verification failed")));
    }

    #[tokio::test]
    async fn invalid_pattern_fails_verification_with_warning() {
        let launcher = Arc::new(MockLauncher::succeed_with("ok\n"));
        let coordinator = coordinator_with(launcher, &["test"]);

        let result = coordinator
            .execute(ExecuteRequest::new("test").with_verify_pattern("([unclosed"))
            .await
            .unwrap();
        assert!(!result.verification_passed);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("verification error")));
    }

    #[tokio::test]
    async fn failed_run_skips_pattern_search() {
        let launcher = Arc::new(MockLauncher::new(LaunchOutcome {
            exit_code: Some(2),
            stdout: "DONE\n".to_string(),
            ..Default::default()
        }));
        let coordinator = coordinator_with(launcher, &["test"]);

        let result = coordinator
            .execute(ExecuteRequest::new("test").with_verify_pattern("DONE"))
            .await
            .unwrap();
        assert!(!result.success());
        // Pattern present in output, but a failed run is never verified.
        assert!(!result.verification_passed);
        assert!(result.critical_failure());
    }

    #[tokio::test]
    async fn sink_receives_lines_and_failures_become_warnings() {
        let launcher = Arc::new(MockLauncher::succeed_with("one\ntwo\n"));
        let coordinator = coordinator_with(launcher.clone(), &["test"]);

        let sink = Arc::new(CollectSink::new());
        let result = coordinator
            .execute(ExecuteRequest::new("test").with_sink(sink.clone()))
            .await
            .unwrap();
        assert_eq!(sink.lines(), vec!["one", "two"]);
        assert!(result.fully_successful());

        let result = coordinator
            .execute(ExecuteRequest::new("test").with_sink(Arc::new(FailingSink)))
            .await
            .unwrap();
        assert!(result.success());
        assert!(!result.fully_successful());
        assert!(result.warnings.iter().any(|w| w.contains("sink failed")));
    }

    #[tokio::test]
    async fn concurrent_duplicate_is_rejected() {
        let launcher = Arc::new(
            MockLauncher::succeed_with("slow\n").with_delay(Duration::from_millis(200)),
        );
        let coordinator = coordinator_with(launcher, &["build"]);

        let first = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.execute(ExecuteRequest::new("build")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = coordinator
            .execute(ExecuteRequest::new("build"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::AlreadyRunning(_)));

        let result = first.await.unwrap().unwrap();
        assert!(result.success());
        // Slot is free again after completion.
        assert!(!coordinator.is_running("build").await);
    }

    #[tokio::test]
    async fn timed_out_outcome_is_critical() {
        let launcher = Arc::new(MockLauncher::new(LaunchOutcome {
            exit_code: None,
            timed_out: true,
            warnings: vec!["task exceeded 2s timeout, terminating".to_string()],
            ..Default::default()
        }));
        let coordinator = coordinator_with(launcher, &["deploy"]);

        let result = coordinator
            .execute(ExecuteRequest::new("deploy").with_timeout(Duration::from_secs(2)))
            .await
            .unwrap();
        assert!(result.timed_out);
        assert!(result.critical_failure());
        assert!(result.warnings.iter().any(|w| w.contains("timeout")));
    }

    #[tokio::test]
    async fn timestamps_come_from_the_injected_clock() {
        use crate::port::time_provider::mocks::FixedTimeProvider;

        let launcher = Arc::new(MockLauncher::succeed_with("ok\n"));
        let catalog = Arc::new(MockCatalog::new(&["test"]));
        let clock = Arc::new(FixedTimeProvider::new(50_000));
        let coordinator =
            Coordinator::new(catalog, launcher, clock.clone(), Duration::from_secs(60)).unwrap();

        let result = coordinator
            .execute(ExecuteRequest::new("test"))
            .await
            .unwrap();
        assert_eq!(result.timestamp_ms, 50_000);
        assert_eq!(result.duration_ms, 0);
        assert_eq!(coordinator.history()[0].timestamp_ms, 50_000);

        clock.advance(2_500);
        let result = coordinator
            .execute(ExecuteRequest::new("test"))
            .await
            .unwrap();
        assert_eq!(result.timestamp_ms, 52_500);
    }

    #[tokio::test]
    async fn health_check_reflects_catalog_and_registry() {
        let launcher = Arc::new(MockLauncher::succeed_with("ok\n"));
        let coordinator = coordinator_with(launcher, &["test"]);

        coordinator
            .execute(ExecuteRequest::new("test"))
            .await
            .unwrap();

        let health = coordinator.health_check().await;
        assert!(health.accessible);
        assert_eq!(health.stale_process_count, 0);
        assert_eq!(health.history_count, 1);
        assert!(health.healthy);
    }

    #[tokio::test]
    async fn construction_fails_on_inaccessible_workspace() {
        let catalog = Arc::new(MockCatalog::new(&["test"]));
        catalog.set_accessible(false);
        let launcher: Arc<dyn ProcessLauncher> = Arc::new(MockLauncher::succeed_with(""));
        let err = Coordinator::new(
            catalog,
            launcher,
            Arc::new(SystemTimeProvider),
            Duration::from_secs(60),
        )
        .unwrap_err();
        assert!(matches!(err, ExecError::Config(_)));
    }
}
