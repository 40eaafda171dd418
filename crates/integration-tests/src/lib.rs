//! Shared fixtures for Helmsman end-to-end tests.
//!
//! Each [`Workbench`] is a disposable task-runner workspace: a Makefile
//! declaring the test targets plus a small shell script standing in for
//! `make`, so tests exercise real child processes without depending on
//! the host toolchain.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::Duration;

use tempfile::TempDir;

use helmsman_core::application::constants::DEFAULT_TIMEOUT;
use helmsman_core::application::{Coordinator, StatusAggregator};
use helmsman_core::port::time_provider::SystemTimeProvider;
use helmsman_infra_system::{MakefileCatalog, SubprocessLauncher};

const MAKEFILE: &str = "\
ok:
\t@echo ok
fail:
\t@echo fail
slow:
\t@echo slow
status:
\t@echo status
";

/// How the fixture's `status` task behaves.
#[derive(Debug, Clone, Copy)]
pub enum StatusBehavior {
    Running,
    Stopped,
    Failing,
}

pub struct Workbench {
    dir: TempDir,
    runner: PathBuf,
}

impl Workbench {
    pub fn new() -> Self {
        Self::with_status(StatusBehavior::Running)
    }

    pub fn with_status(behavior: StatusBehavior) -> Self {
        init_tracing();

        let dir = tempfile::tempdir().expect("create workspace");
        std::fs::write(dir.path().join("Makefile"), MAKEFILE).expect("write Makefile");

        let status_body = match behavior {
            StatusBehavior::Running => {
                "echo \"✓ Workstation: Running\"\n\
                 echo \"helm_db      Up 2 hours\"\n\
                 echo \"helm_web     Up 2 hours\"\n\
                 echo \"Status Check Complete\"\n\
                 exit 0"
            }
            StatusBehavior::Stopped => {
                "echo \"⚠ Workstation: Stopped\"\n\
                 echo \"Status Check Complete\"\n\
                 exit 0"
            }
            StatusBehavior::Failing => "echo \"status broken\" >&2\nexit 1",
        };

        // `slow` execs so the signaled pid is the one holding the stdout
        // pipe; a forked sleep would keep the pipe open after the shell dies.
        let script = format!(
            "#!/bin/sh\n\
             case \"$1\" in\n\
             ok) echo \"line one\"; echo \"task finished: DONE\"; exit 0;;\n\
             fail) echo \"failing\"; echo \"boom\" >&2; exit 3;;\n\
             slow) echo \"starting\"; exec sleep 30;;\n\
             status)\n{status_body};;\n\
             *) echo \"no rule to make target '$1'\" >&2; exit 2;;\n\
             esac\n"
        );

        let runner = dir.path().join("runner.sh");
        std::fs::write(&runner, script).expect("write runner");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&runner, std::fs::Permissions::from_mode(0o755))
                .expect("chmod runner");
        }

        Self { dir, runner }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn coordinator(&self) -> Arc<Coordinator> {
        self.coordinator_with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn coordinator_with_timeout(&self, default_timeout: Duration) -> Arc<Coordinator> {
        let catalog = Arc::new(MakefileCatalog::new(self.root()).expect("catalog"));
        let launcher = Arc::new(SubprocessLauncher::new(
            self.runner.to_string_lossy().into_owned(),
            self.root(),
        ));
        Arc::new(
            Coordinator::new(
                catalog,
                launcher,
                Arc::new(SystemTimeProvider),
                default_timeout,
            )
            .expect("coordinator"),
        )
    }

    pub fn aggregator(&self) -> StatusAggregator {
        StatusAggregator::new(self.coordinator(), Arc::new(SystemTimeProvider))
    }
}

impl Default for Workbench {
    fn default() -> Self {
        Self::new()
    }
}

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("helmsman=debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}
