// Task identity and input validation

use serde::{Deserialize, Serialize};

use crate::error::ExecError;

/// Maximum accepted task-name length (input DoS guard)
pub const MAX_TASK_NAME_LEN: usize = 100;

/// A validated task name.
///
/// Valid iff the raw string fully matches `[A-Za-z0-9_-]+` and is at most
/// [`MAX_TASK_NAME_LEN`] characters. The whitelist of permitted names is
/// enforced by the embedding layer; this type is the defense-in-depth
/// character/length gate applied before any name reaches a subprocess
/// argument vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskName(String);

impl TaskName {
    /// Validate and wrap a raw task name.
    ///
    /// Pure: no I/O, no side effects. Used as the first gate before any
    /// task is accepted.
    pub fn parse(raw: &str) -> Result<Self, ExecError> {
        if raw.is_empty() || raw.len() > MAX_TASK_NAME_LEN {
            return Err(ExecError::InvalidCommand(raw.to_string()));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ExecError::InvalidCommand(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TaskName {
    type Error = ExecError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<TaskName> for String {
    fn from(name: TaskName) -> Self {
        name.0
    }
}
