// Output Sink Port - live line streaming to observers
//
// The launcher delivers each completed stdout line synchronously and in
// emission order. A sink failure is converted into a warning on the run;
// it never aborts the run.

use thiserror::Error;
use tokio::sync::mpsc;

/// A sink rejected a line.
#[derive(Error, Debug)]
#[error("sink rejected line: {0}")]
pub struct SinkError(pub String);

/// Per-line observer of a running task's stdout.
pub trait OutputSink: Send + Sync {
    /// Deliver one completed output line (without its trailing newline).
    fn deliver(&self, line: &str) -> Result<(), SinkError>;
}

/// Sink backed by a plain closure.
pub struct FnSink<F>(F);

impl<F> FnSink<F>
where
    F: Fn(&str) -> Result<(), SinkError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> OutputSink for FnSink<F>
where
    F: Fn(&str) -> Result<(), SinkError> + Send + Sync,
{
    fn deliver(&self, line: &str) -> Result<(), SinkError> {
        (self.0)(line)
    }
}

/// Sink forwarding lines into an unbounded channel, for callers that
/// relay output to a socket or UI from another task.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl OutputSink for ChannelSink {
    fn deliver(&self, line: &str) -> Result<(), SinkError> {
        self.tx
            .send(line.to_string())
            .map_err(|_| SinkError("channel receiver dropped".to_string()))
    }
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Sink that records every delivered line (test observer).
    #[derive(Default)]
    pub struct CollectSink {
        lines: Mutex<Vec<String>>,
    }

    impl CollectSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }
    }

    impl OutputSink for CollectSink {
        fn deliver(&self, line: &str) -> Result<(), SinkError> {
            self.lines.lock().unwrap().push(line.to_string());
            Ok(())
        }
    }

    /// Sink that fails on every line (for warning-path tests).
    pub struct FailingSink;

    impl OutputSink for FailingSink {
        fn deliver(&self, _line: &str) -> Result<(), SinkError> {
            Err(SinkError("observer disconnected".to_string()))
        }
    }
}
