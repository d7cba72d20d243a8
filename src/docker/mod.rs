//! Docker environment management for task verification.
//!
//! This module wraps the `docker` and `docker-compose` command line tools and
//! manages the per-task environment: an isolated network plus the services
//! described by the task's `docker-compose.yml`.

pub mod compose;
pub mod network;

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info, warn};

pub use compose::{
    remove_if_exists, write_override, ComposeOverride, ComposeProject, NetworkConfig,
    OVERRIDE_FILE,
};
pub use network::{create_network, generate_run_id, remove_network, NETWORK_PREFIX};

use crate::error::DockerError;
use crate::execution::{run_captured, CapturedOutput};
use crate::runner::{DiagnosticStage, Diagnostics};
use crate::task::Task;

/// Default docker binary.
pub const DEFAULT_DOCKER_BIN: &str = "docker";
/// Default compose binary.
pub const DEFAULT_COMPOSE_BIN: &str = "docker-compose";

/// Invokes the docker and compose command line tools.
#[derive(Debug, Clone)]
pub struct DockerCli {
    docker: String,
    compose: Vec<String>,
}

impl DockerCli {
    /// Creates a CLI wrapper.
    ///
    /// `compose` may contain arguments, e.g. `"docker compose"`.
    pub fn new(docker: impl Into<String>, compose: &str) -> Self {
        let mut compose: Vec<String> = compose.split_whitespace().map(String::from).collect();
        if compose.is_empty() {
            compose.push(DEFAULT_COMPOSE_BIN.to_string());
        }
        Self {
            docker: docker.into(),
            compose,
        }
    }

    /// A bare `docker` command.
    pub fn docker_command(&self) -> Command {
        Command::new(&self.docker)
    }

    /// A compose command running in `dir`.
    pub fn compose_command(&self, dir: &Path) -> Command {
        let mut cmd = Command::new(&self.compose[0]);
        cmd.args(&self.compose[1..]).current_dir(dir);
        cmd
    }

    /// Runs `docker <args>` and fails on a non-zero exit.
    pub async fn docker(&self, args: &[&str]) -> Result<CapturedOutput, DockerError> {
        let mut cmd = self.docker_command();
        cmd.args(args);
        run_checked(cmd, &self.docker, args).await
    }

    /// Runs `<compose> <args>` in `dir` and fails on a non-zero exit.
    pub async fn compose(&self, dir: &Path, args: &[&str]) -> Result<CapturedOutput, DockerError> {
        let mut cmd = self.compose_command(dir);
        cmd.args(args);
        run_checked(cmd, &self.compose.join(" "), args).await
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new(DEFAULT_DOCKER_BIN, DEFAULT_COMPOSE_BIN)
    }
}

async fn run_checked(
    cmd: Command,
    program: &str,
    args: &[&str],
) -> Result<CapturedOutput, DockerError> {
    let command = format!("{} {}", program, args.join(" "));
    debug!("Running: {}", command);

    let out = run_captured(cmd, None)
        .await
        .map_err(|source| DockerError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if out.success() {
        Ok(out)
    } else {
        Err(DockerError::NonZeroExit {
            command,
            code: out.exit_code(),
            output: out.text().trim().to_string(),
        })
    }
}

/// A running task environment. Must be passed to
/// [`EnvironmentManager::teardown`].
#[derive(Debug)]
pub struct EnvironmentHandle {
    network: String,
    project: ComposeProject,
    active: bool,
}

impl EnvironmentHandle {
    /// Isolated network the services are attached to.
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Whether the environment has not been torn down yet.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for EnvironmentHandle {
    fn drop(&mut self) {
        if self.active {
            warn!(
                network = %self.network,
                dir = %self.project.dir().display(),
                "Environment was not torn down properly"
            );
        }
    }
}

/// Brings task environments up and down on a per-run network.
#[derive(Debug, Clone)]
pub struct EnvironmentManager {
    cli: DockerCli,
    network: String,
}

impl EnvironmentManager {
    /// Creates a manager that attaches environments to `network`.
    pub fn new(cli: DockerCli, network: impl Into<String>) -> Self {
        Self {
            cli,
            network: network.into(),
        }
    }

    /// The run's network name.
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Creates the network, writes the override and starts the services.
    ///
    /// Every step is best effort: a failure is recorded in `diagnostics` and
    /// the handle is returned anyway, so solutions still run and teardown
    /// still cleans up whatever did come up.
    pub async fn setup(&self, task: &Task, diagnostics: &mut Diagnostics) -> EnvironmentHandle {
        info!(task = %task.name(), network = %self.network, "Setting up environment");

        if let Err(e) = create_network(&self.cli, &self.network).await {
            diagnostics.push(DiagnosticStage::NetworkCreate, e);
        }

        let mut handle = EnvironmentHandle {
            network: self.network.clone(),
            project: ComposeProject::new(&task.dir),
            active: true,
        };

        if let Err(e) = handle.project.attach_to_network(&self.network) {
            diagnostics.push(DiagnosticStage::OverrideWrite, e);
            return handle;
        }
        if let Err(e) = handle.project.up(&self.cli).await {
            diagnostics.push(DiagnosticStage::ComposeUp, e);
        }
        handle
    }

    /// Stops the services, deletes the override and removes the network.
    ///
    /// Never fails; problems end up in `diagnostics`.
    pub async fn teardown(&self, mut handle: EnvironmentHandle, diagnostics: &mut Diagnostics) {
        if let Err(e) = handle.project.down(&self.cli).await {
            diagnostics.push(DiagnosticStage::ComposeDown, e);
        }
        if let Err(e) = handle.project.remove_override() {
            diagnostics.push(DiagnosticStage::OverrideRemove, e);
        }
        if let Err(e) = remove_network(&self.cli, &handle.network).await {
            diagnostics.push(DiagnosticStage::NetworkRemove, e);
        }
        handle.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_with_arguments() {
        let cli = DockerCli::new("docker", "docker compose");
        let cmd = cli.compose_command(Path::new("/tmp"));
        let std_cmd = cmd.as_std();

        assert_eq!(std_cmd.get_program(), "docker");
        let args: Vec<_> = std_cmd.get_args().collect();
        assert_eq!(args, vec!["compose"]);
        assert_eq!(std_cmd.get_current_dir(), Some(Path::new("/tmp")));
    }

    #[test]
    fn test_empty_compose_falls_back() {
        let cli = DockerCli::new("docker", "  ");
        let cmd = cli.compose_command(Path::new("."));
        assert_eq!(cmd.as_std().get_program(), DEFAULT_COMPOSE_BIN);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_error() {
        let cli = DockerCli::new("false", "false");
        let err = cli.docker(&["network", "ls"]).await.unwrap_err();
        assert!(matches!(err, DockerError::NonZeroExit { .. }));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let cli = DockerCli::new("/nonexistent/docker", "/nonexistent/compose");
        let err = cli.docker(&["version"]).await.unwrap_err();
        assert!(matches!(err, DockerError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_failed_setup_still_yields_handle_and_cleans_up() {
        use crate::task::TaskManifest;

        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("docker-compose.yml"), "services: {}\n").unwrap();
        let task = Task {
            dir: temp.path().to_path_buf(),
            manifest: TaskManifest {
                name: "Svc".to_string(),
                flag: "FLAG{v}".to_string(),
                main: Some("svc".to_string()),
                local_port: Some(80),
            },
        };
        let manager = EnvironmentManager::new(
            DockerCli::new("/nonexistent/docker", "/nonexistent/compose"),
            "verify-test",
        );
        let mut diagnostics = Diagnostics::new("Svc");

        let handle = manager.setup(&task, &mut diagnostics).await;
        assert!(handle.is_active());
        assert_eq!(handle.network(), "verify-test");
        assert!(diagnostics.has_stage(DiagnosticStage::NetworkCreate));
        assert!(diagnostics.has_stage(DiagnosticStage::ComposeUp));
        assert!(temp.path().join(OVERRIDE_FILE).exists());

        manager.teardown(handle, &mut diagnostics).await;
        assert!(diagnostics.has_stage(DiagnosticStage::ComposeDown));
        assert!(diagnostics.has_stage(DiagnosticStage::NetworkRemove));
        assert!(!temp.path().join(OVERRIDE_FILE).exists());
    }
}
