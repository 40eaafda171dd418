// Makefile-backed task catalog
// Anchored lookups against the task runner's definition file; all reads
// fail closed so a broken workspace degrades to "task does not exist".

use std::fs;
use std::path::{Path, PathBuf};

use regex::RegexBuilder;
use tracing::{error, info};

use helmsman_core::domain::TaskName;
use helmsman_core::error::ExecError;
use helmsman_core::port::TaskCatalog;

/// Task definition file expected in the workspace root.
const DEFINITION_FILE: &str = "Makefile";

/// Marker directory whose presence approximates "environment installed"
/// when the status task itself cannot answer.
const ENVIRONMENT_MARKER_DIR: &str = ".vagrant";

#[derive(Debug)]
pub struct MakefileCatalog {
    root: PathBuf,
    definition_file: PathBuf,
    marker_dir: PathBuf,
}

impl MakefileCatalog {
    /// Bind the catalog to a workspace root, failing fast if the root or
    /// its definition file is missing. Lookups after construction still
    /// re-read the file, so later corruption degrades instead of erroring.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ExecError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ExecError::Config(format!(
                "task-runner root does not exist or is not a directory: {}",
                root.display()
            )));
        }
        let definition_file = root.join(DEFINITION_FILE);
        if !definition_file.is_file() {
            return Err(ExecError::Config(format!(
                "{DEFINITION_FILE} not found in: {}",
                root.display()
            )));
        }
        let marker_dir = root.join(ENVIRONMENT_MARKER_DIR);
        info!(root = %root.display(), "task catalog initialized");
        Ok(Self {
            root,
            definition_file,
            marker_dir,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TaskCatalog for MakefileCatalog {
    fn task_exists(&self, task: &TaskName) -> bool {
        let content = match fs::read_to_string(&self.definition_file) {
            Ok(content) => content,
            Err(e) => {
                error!(
                    file = %self.definition_file.display(),
                    error = %e,
                    "definition file read failed, treating task as unknown"
                );
                return false;
            }
        };
        // Target definitions are anchored at start-of-line: `<name>:`.
        let pattern = format!("^{}:", regex::escape(task.as_str()));
        match RegexBuilder::new(&pattern).multi_line(true).build() {
            Ok(re) => re.is_match(&content),
            Err(e) => {
                error!(error = %e, "definition lookup pattern failed to compile");
                false
            }
        }
    }

    fn accessible(&self) -> bool {
        self.root.is_dir() && fs::File::open(&self.definition_file).is_ok()
    }

    fn environment_marker_present(&self) -> bool {
        self.marker_dir.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn task(name: &str) -> TaskName {
        TaskName::parse(name).unwrap()
    }

    fn workspace(makefile: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(DEFINITION_FILE), makefile).unwrap();
        dir
    }

    #[test]
    fn finds_targets_anchored_at_line_start() {
        let dir = workspace("install:\n\t@echo install\n\ntest: install\n\t@echo test\n");
        let catalog = MakefileCatalog::new(dir.path()).unwrap();

        assert!(catalog.task_exists(&task("install")));
        assert!(catalog.task_exists(&task("test")));
        assert!(!catalog.task_exists(&task("deploy")));
    }

    #[test]
    fn name_appearing_mid_line_is_not_a_target() {
        // `install` only appears as a prerequisite, never as a definition.
        let dir = workspace("all: install-deps\n\t@echo ok\n");
        let catalog = MakefileCatalog::new(dir.path()).unwrap();

        assert!(!catalog.task_exists(&task("install")));
        // Prefix of a real target must not match either.
        assert!(!catalog.task_exists(&task("al")));
    }

    #[test]
    fn construction_fails_without_definition_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = MakefileCatalog::new(dir.path()).unwrap_err();
        assert!(matches!(err, ExecError::Config(_)));

        let err = MakefileCatalog::new("/nonexistent/helmsman-root").unwrap_err();
        assert!(matches!(err, ExecError::Config(_)));
    }

    #[test]
    fn lookup_fails_closed_when_file_disappears() {
        let dir = workspace("build:\n\t@echo build\n");
        let catalog = MakefileCatalog::new(dir.path()).unwrap();
        assert!(catalog.task_exists(&task("build")));

        fs::remove_file(dir.path().join(DEFINITION_FILE)).unwrap();
        assert!(!catalog.task_exists(&task("build")));
        assert!(!catalog.accessible());
    }

    #[test]
    fn environment_marker_detection() {
        let dir = workspace("status:\n");
        let catalog = MakefileCatalog::new(dir.path()).unwrap();
        assert!(!catalog.environment_marker_present());

        fs::create_dir(dir.path().join(ENVIRONMENT_MARKER_DIR)).unwrap();
        assert!(catalog.environment_marker_present());
    }
}
