// Port Layer - Interfaces for external dependencies

pub mod output_sink;
pub mod process_launcher;
pub mod task_catalog;
pub mod time_provider;

// Re-exports
pub use output_sink::{ChannelSink, FnSink, OutputSink, SinkError};
pub use process_launcher::{LaunchError, LaunchOutcome, ProcessLauncher, SpawnNotifier};
pub use task_catalog::TaskCatalog;
pub use time_provider::TimeProvider;
