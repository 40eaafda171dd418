// Task Catalog Port - lookups against the external runner's definitions
//
// The catalog answers point-in-time questions about the task-runner
// workspace. All methods fail closed: an unreadable definition file means
// "does not exist", never an error. A task can vanish between check and
// launch; that race is benign because the launcher reports the failure in
// the run outcome instead of crashing.

use crate::domain::TaskName;

/// Read-only view of the task-runner workspace.
pub trait TaskCatalog: Send + Sync {
    /// Whether the definition file declares the task (anchored at
    /// start-of-line). I/O errors return false.
    fn task_exists(&self, task: &TaskName) -> bool;

    /// Whether the workspace root and its definition file are readable.
    /// Used by the health check.
    fn accessible(&self) -> bool;

    /// Whether the managed environment's marker directory exists. Used as
    /// the status aggregator's filesystem fallback for "installed".
    fn environment_marker_present(&self) -> bool;
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory catalog for coordinator and status tests.
    pub struct MockCatalog {
        tasks: Vec<String>,
        accessible: AtomicBool,
        marker: AtomicBool,
    }

    impl MockCatalog {
        pub fn new(tasks: &[&str]) -> Self {
            Self {
                tasks: tasks.iter().map(|t| t.to_string()).collect(),
                accessible: AtomicBool::new(true),
                marker: AtomicBool::new(false),
            }
        }

        pub fn set_accessible(&self, value: bool) {
            self.accessible.store(value, Ordering::SeqCst);
        }

        pub fn set_marker_present(&self, value: bool) {
            self.marker.store(value, Ordering::SeqCst);
        }
    }

    impl TaskCatalog for MockCatalog {
        fn task_exists(&self, task: &TaskName) -> bool {
            self.tasks.iter().any(|t| t == task.as_str())
        }

        fn accessible(&self) -> bool {
            self.accessible.load(Ordering::SeqCst)
        }

        fn environment_marker_present(&self) -> bool {
            self.marker.load(Ordering::SeqCst)
        }
    }
}
