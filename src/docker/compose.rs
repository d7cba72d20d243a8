//! docker-compose override generation and project lifecycle.
//!
//! Tasks ship a `docker-compose.yml`. Instead of editing it, an override
//! file is dropped next to it; compose merges `docker-compose.override.yml`
//! implicitly, which moves every service onto the run's isolated network.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::DockerCli;
use crate::error::DockerError;

/// File name compose picks up automatically next to `docker-compose.yml`.
pub const OVERRIDE_FILE: &str = "docker-compose.override.yml";

/// Network entry of a compose file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Actual docker network name.
    pub name: String,
    /// The network is created and removed outside of compose.
    #[serde(default)]
    pub external: bool,
}

/// Contents of a generated override file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeOverride {
    /// Compose file version.
    pub version: String,
    /// Network definitions, keyed by compose network name.
    pub networks: BTreeMap<String, NetworkConfig>,
}

impl ComposeOverride {
    /// Override that replaces the `default` network with `network`.
    pub fn for_network(network: &str) -> Self {
        let mut networks = BTreeMap::new();
        networks.insert(
            "default".to_string(),
            NetworkConfig {
                name: network.to_string(),
                external: true,
            },
        );
        Self {
            version: "3.5".to_string(),
            networks,
        }
    }

    /// Renders the override as YAML.
    pub fn to_yaml(&self) -> Result<String, DockerError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Writes an override for `network` into `dir` and returns its path.
pub fn write_override(dir: &Path, network: &str) -> Result<PathBuf, DockerError> {
    let path = dir.join(OVERRIDE_FILE);
    let yaml = ComposeOverride::for_network(network).to_yaml()?;
    fs::write(&path, yaml).map_err(|source| DockerError::Override {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), network, "Wrote compose override");
    Ok(path)
}

/// A compose project rooted at a task directory.
#[derive(Debug, Clone)]
pub struct ComposeProject {
    dir: PathBuf,
    override_path: Option<PathBuf>,
}

impl ComposeProject {
    /// Creates a project for the compose file in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            override_path: None,
        }
    }

    /// Project directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the override file, once written.
    pub fn override_path(&self) -> Option<&Path> {
        self.override_path.as_deref()
    }

    /// Writes the network override into the project directory.
    pub fn attach_to_network(&mut self, network: &str) -> Result<(), DockerError> {
        self.override_path = Some(write_override(&self.dir, network)?);
        Ok(())
    }

    /// Builds and starts the services in detached mode.
    pub async fn up(&self, cli: &DockerCli) -> Result<(), DockerError> {
        info!(dir = %self.dir.display(), "Starting compose services");
        cli.compose(&self.dir, &["up", "--build", "-d"]).await?;
        Ok(())
    }

    /// Stops and removes the services.
    pub async fn down(&self, cli: &DockerCli) -> Result<(), DockerError> {
        info!(dir = %self.dir.display(), "Stopping compose services");
        cli.compose(&self.dir, &["down"]).await?;
        Ok(())
    }

    /// Deletes the override file if one was written.
    pub fn remove_override(&mut self) -> std::io::Result<()> {
        match self.override_path.take() {
            Some(path) => remove_if_exists(&path),
            None => Ok(()),
        }
    }
}

/// Removes a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
