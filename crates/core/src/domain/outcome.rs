// Execution outcome value objects
//
// Never assume success: every field of a result is computed explicitly
// and callers branch on the derived predicates instead of exceptions.

use serde::{Deserialize, Serialize};

use crate::domain::TaskName;

/// Immutable outcome of one completed run.
///
/// Constructed once by the coordinator when the launcher returns; never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub task: TaskName,
    /// `None` means the process could not be confirmed to exit
    /// (killed, crashed, wait failed).
    pub exit_code: Option<i32>,
    /// Combined streamed stdout transcript.
    pub output: String,
    /// Best-effort stderr capture.
    pub error_output: String,
    /// Wall-clock duration, launch to completion.
    pub duration_ms: i64,
    /// Launch time, epoch millis.
    pub timestamp_ms: i64,
    pub timed_out: bool,
    /// True iff either no verification pattern was requested and the run
    /// exited 0, or the requested pattern was found in the output.
    pub verification_passed: bool,
    /// Non-fatal anomalies in encounter order (sink failures, stderr read
    /// failures, wait failures, timeout notices).
    pub warnings: Vec<String>,
}

impl ExecutionResult {
    /// Basic success: confirmed zero exit and no timeout.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }

    /// Strict success: exit 0, no timeout, verification passed, and not a
    /// single warning along the way.
    pub fn fully_successful(&self) -> bool {
        self.success() && self.verification_passed && self.warnings.is_empty()
    }

    /// The run ended in a state nothing downstream should trust.
    pub fn critical_failure(&self) -> bool {
        self.exit_code.is_none() || self.timed_out || !self.verification_passed
    }

    /// Compact projection retained in the bounded audit history.
    pub fn to_record(&self) -> ExecutionRecord {
        ExecutionRecord {
            task: self.task.clone(),
            exit_code: self.exit_code,
            duration_ms: self.duration_ms,
            success: self.success(),
            timestamp_ms: self.timestamp_ms,
            warning_count: self.warnings.len(),
        }
    }
}

/// Append-only audit projection of an [`ExecutionResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub task: TaskName,
    pub exit_code: Option<i32>,
    pub duration_ms: i64,
    pub success: bool,
    pub timestamp_ms: i64,
    pub warning_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_result() -> ExecutionResult {
        ExecutionResult {
            task: TaskName::parse("test").unwrap(),
            exit_code: Some(0),
            output: "ok\n".to_string(),
            error_output: String::new(),
            duration_ms: 120,
            timestamp_ms: 1000,
            timed_out: false,
            verification_passed: true,
            warnings: vec![],
        }
    }

    #[test]
    fn clean_run_is_fully_successful() {
        let result = base_result();
        assert!(result.success());
        assert!(result.fully_successful());
        assert!(!result.critical_failure());
    }

    #[test]
    fn warnings_break_full_success_but_not_success() {
        let mut result = base_result();
        result.warnings.push("output sink failed: closed".to_string());
        assert!(result.success());
        assert!(!result.fully_successful());
        assert!(!result.critical_failure());
    }

    #[test]
    fn missing_exit_code_is_critical() {
        let mut result = base_result();
        result.exit_code = None;
        assert!(!result.success());
        assert!(result.critical_failure());
    }

    #[test]
    fn failed_verification_is_critical() {
        let mut result = base_result();
        result.verification_passed = false;
        assert!(result.success());
        assert!(result.critical_failure());
    }

    #[test]
    fn record_projects_result_fields() {
        let mut result = base_result();
        result.warnings.push("stderr read failed".to_string());
        let record = result.to_record();
        assert_eq!(record.task, result.task);
        assert_eq!(record.exit_code, Some(0));
        assert!(record.success);
        assert_eq!(record.warning_count, 1);
    }
}
