// Execution constants (no magic values)
use std::time::Duration;

/// Default per-run timeout (1 hour)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Grace period between SIGTERM and SIGKILL (5 seconds)
pub const GRACEFUL_SHUTDOWN_TIMEOUT_MS: i64 = 5000;

/// Poll interval while waiting for a terminated process to exit (100ms)
pub const KILL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bounded audit history capacity (oldest evicted first)
pub const HISTORY_CAPACITY: usize = 100;

/// Designated status task name
pub const STATUS_TASK: &str = "status";

/// Timeout for the status task (it only reads state)
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(30);

/// Completion marker required in the status task's output
pub const STATUS_VERIFY_PATTERN: &str = "Status Check Complete";
