//! Configuration for verification runs.

use std::path::PathBuf;
use std::time::Duration;

use crate::docker::{generate_run_id, DockerCli, DEFAULT_COMPOSE_BIN, DEFAULT_DOCKER_BIN};
use crate::storage::STDOUT_PATH;

/// Default per-solution time budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Settings for one verification run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Root directory scanned for tasks.
    pub root: PathBuf,
    /// Store file, or `-` for stdout.
    pub store_path: PathBuf,
    /// Budget each solution gets, independently of the others.
    pub timeout: Duration,
    /// Run identifier, also the isolated network name.
    pub run_id: String,
    /// Re-verify tasks even when their digest is unchanged.
    pub force: bool,
    /// docker binary.
    pub docker_bin: String,
    /// compose binary, optionally with leading arguments.
    pub compose_bin: String,
}

impl RunConfig {
    /// Creates a configuration with defaults and a fresh run id.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            store_path: PathBuf::from(STDOUT_PATH),
            timeout: DEFAULT_TIMEOUT,
            run_id: generate_run_id(),
            force: false,
            docker_bin: DEFAULT_DOCKER_BIN.to_string(),
            compose_bin: DEFAULT_COMPOSE_BIN.to_string(),
        }
    }

    /// Sets the store path.
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    /// Sets the per-solution timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the generated run id / network name.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Enables or disables forced re-verification.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Sets the docker binary.
    pub fn with_docker_bin(mut self, bin: impl Into<String>) -> Self {
        self.docker_bin = bin.into();
        self
    }

    /// Sets the compose binary.
    pub fn with_compose_bin(mut self, bin: impl Into<String>) -> Self {
        self.compose_bin = bin.into();
        self
    }

    /// Name of the isolated network for this run.
    pub fn network(&self) -> &str {
        &self.run_id
    }

    /// CLI wrapper for the configured binaries.
    pub fn docker_cli(&self) -> DockerCli {
        DockerCli::new(self.docker_bin.clone(), &self.compose_bin)
    }
}
