// Status Aggregator - derives managed-environment state
//
// Runs the designated status task through the coordinator and parses its
// output for recognized markers. Degrades to a filesystem heuristic when
// the task fails, and never returns an error: callers always get a
// best-effort SystemStatus.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::application::constants::{STATUS_TASK, STATUS_TIMEOUT, STATUS_VERIFY_PATTERN};
use crate::application::coordinator::{Coordinator, ExecuteRequest};
use crate::domain::strip_ansi;
use crate::port::TimeProvider;

/// Mutually exclusive environment state markers in the status output.
const MARKER_RUNNING: &str = "✓ Workstation: Running";
const MARKER_STOPPED: &str = "⚠ Workstation: Stopped";
const MARKER_NOT_CREATED: &str = "○ Workstation: Not Created";

/// Container naming convention for managed services.
const SERVICE_PREFIX: &str = "helm_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub status: String,
    pub container: String,
}

/// Best-effort snapshot of the managed environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub installed: bool,
    pub running: bool,
    pub services: Vec<ServiceStatus>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub last_updated_ms: i64,
}

pub struct StatusAggregator {
    coordinator: Arc<Coordinator>,
    time_provider: Arc<dyn TimeProvider>,
}

impl StatusAggregator {
    pub fn new(coordinator: Arc<Coordinator>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            coordinator,
            time_provider,
        }
    }

    /// Derive the environment status. Never errors; every failure path
    /// degrades to the filesystem fallback with an explanatory entry.
    pub async fn system_status(&self) -> SystemStatus {
        // Assume nothing works until the output proves otherwise.
        let mut status = SystemStatus {
            installed: false,
            running: false,
            services: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            last_updated_ms: self.time_provider.now_millis(),
        };

        let request = ExecuteRequest::new(STATUS_TASK)
            .with_verify_pattern(STATUS_VERIFY_PATTERN)
            .with_timeout(STATUS_TIMEOUT);

        match self.coordinator.execute(request).await {
            Ok(result) => {
                if result.fully_successful() {
                    let plain = strip_ansi(&result.output);
                    self.parse_markers(&plain, &mut status);
                    status.services = parse_services(&plain);
                } else {
                    status.errors.push(format!(
                        "status task failed: exit_code={:?}",
                        result.exit_code
                    ));
                    self.filesystem_fallback(&mut status);
                }
                status.warnings.extend(result.warnings);
            }
            Err(e) => {
                error!(error = %e, "status task could not be executed");
                status.errors.push(format!("status check failed: {e}"));
                self.filesystem_fallback(&mut status);
            }
        }

        status
    }

    fn parse_markers(&self, output: &str, status: &mut SystemStatus) {
        if output.contains(MARKER_RUNNING) {
            status.installed = true;
            status.running = true;
        } else if output.contains(MARKER_STOPPED) {
            status.installed = true;
            status.running = false;
        } else if output.contains(MARKER_NOT_CREATED) {
            status.installed = false;
            status.running = false;
        } else {
            warn!("status output contained no recognized environment marker");
            status
                .warnings
                .push("could not determine environment state from status output".to_string());
        }
    }

    fn filesystem_fallback(&self, status: &mut SystemStatus) {
        if self.coordinator.catalog().environment_marker_present() {
            status.installed = true;
            status
                .warnings
                .push("environment detected via filesystem marker (fallback)".to_string());
        }
    }
}

/// Extract running services from container listing lines
/// (`helm_<name> ... Up ...`).
fn parse_services(output: &str) -> Vec<ServiceStatus> {
    let mut services = Vec::new();
    for line in output.lines() {
        if !line.contains(SERVICE_PREFIX) || !line.contains("Up") {
            continue;
        }
        let mut parts = line.split_whitespace();
        let Some(container) = parts.next() else {
            continue;
        };
        // Require at least a second column so a bare name never matches.
        if parts.next().is_none() {
            continue;
        }
        if let Some(name) = container.strip_prefix(SERVICE_PREFIX) {
            services.push(ServiceStatus {
                name: name.to_string(),
                status: "running".to_string(),
                container: container.to_string(),
            });
        }
    }
    services
}
