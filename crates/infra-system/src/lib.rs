// Helmsman Infrastructure - System Adapters
// Implements: ProcessLauncher, TaskCatalog

pub mod makefile_catalog;
pub mod subprocess_launcher;

pub use makefile_catalog::MakefileCatalog;
pub use subprocess_launcher::SubprocessLauncher;
