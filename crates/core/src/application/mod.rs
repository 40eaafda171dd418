// Application Layer - Use Cases and Business Logic

pub mod constants;
pub mod coordinator;
pub mod history;
pub mod registry;
pub mod status;

// Re-exports
pub use coordinator::{Coordinator, ExecuteRequest, Health};
pub use history::ExecutionHistory;
pub use registry::{RunRegistry, RunState, RunToken};
pub use status::{ServiceStatus, StatusAggregator, SystemStatus};
