// Domain Layer - Pure value objects, no I/O

pub mod outcome;
pub mod output;
pub mod task;

// Re-exports
pub use outcome::{ExecutionRecord, ExecutionResult};
pub use output::strip_ansi;
pub use task::{TaskName, MAX_TASK_NAME_LEN};
