// Central Error Type for the Execution Core
//
// Only precondition failures are surfaced as errors. Everything that
// happens during or after a launched process is captured inside the
// ExecutionResult fields instead of being raised: a partially-completed
// external process is a normal outcome, not an exceptional one.

use thiserror::Error;

/// Execution-core error type
#[derive(Error, Debug)]
pub enum ExecError {
    /// Task name failed character/length validation. Do not retry.
    #[error("invalid or unsafe task name: {0:?}")]
    InvalidCommand(String),

    /// The task already has an in-flight run. Retry later.
    #[error("task '{0}' is already running")]
    AlreadyRunning(String),

    /// Task not present in the definition file at check time.
    #[error("task '{0}' not found in the task definition file")]
    UnknownTask(String),

    /// Subsystem construction failed (bad root, missing definition file).
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias using ExecError
pub type Result<T> = std::result::Result<T, ExecError>;
