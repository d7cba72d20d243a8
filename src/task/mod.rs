//! Task directories: manifest, discovery and candidate solutions.
//!
//! A task directory looks like:
//!
//! ```text
//! my-task/
//! ├── task.yml              name, flag, optional main / local-port
//! ├── docker-compose.yml    optional multi-service environment
//! ├── distfiles/            optional, mounted read-only into containers
//! └── solution/
//!     ├── exploit/Dockerfile
//!     └── quick/solve.bash
//! ```

pub mod discovery;
pub mod manifest;
pub mod solution;

use std::path::{Path, PathBuf};

pub use discovery::discover_task_dirs;
pub use manifest::{manifest_path, TaskManifest, MANIFEST_FILE};
pub use solution::{
    discover_solutions, solutions_dir, SolutionKind, SolutionSpec, DOCKERFILE, SOLUTIONS_DIR,
    SOLVE_SCRIPT,
};

use crate::error::ManifestError;

/// Environment descriptor that marks a task with a multi-service environment.
pub const COMPOSE_FILE: &str = "docker-compose.yml";
/// Folder of distribution files handed to container solutions.
pub const DISTFILES_DIR: &str = "distfiles";

/// A task directory together with its parsed manifest.
#[derive(Debug, Clone)]
pub struct Task {
    /// Directory containing `task.yml`.
    pub dir: PathBuf,
    /// Parsed manifest.
    pub manifest: TaskManifest,
}

impl Task {
    /// Loads the task rooted at `dir`.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self, ManifestError> {
        let dir = dir.into();
        let manifest = TaskManifest::load(&dir)?;
        Ok(Self { dir, manifest })
    }

    /// The task's declared name.
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    /// Last component of the task directory, exposed to script solutions as `HOST`.
    pub fn dir_name(&self) -> String {
        self.dir
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Whether the task declares a multi-service environment.
    pub fn has_environment(&self) -> bool {
        self.compose_path().is_file()
    }

    /// Path of the environment descriptor.
    pub fn compose_path(&self) -> PathBuf {
        self.dir.join(COMPOSE_FILE)
    }

    /// Path of the distribution files folder.
    pub fn distfiles_dir(&self) -> PathBuf {
        self.dir.join(DISTFILES_DIR)
    }

    /// Path of the solutions folder.
    pub fn solutions_dir(&self) -> PathBuf {
        solutions_dir(&self.dir)
    }
}

/// Returns true when `dir` has a solutions folder.
pub fn has_solutions(dir: &Path) -> bool {
    solutions_dir(dir).is_dir()
}
