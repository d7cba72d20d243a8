//! `docker run` argument construction for container solutions.

use std::path::PathBuf;

use uuid::Uuid;

/// Value injected for `HOST` / `PORT` when the task declares none.
pub const PLACEHOLDER_ENV: (&str, &str) = ("DUMMY", "a");

/// Volume mount configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    /// Host path.
    pub host_path: PathBuf,
    /// Container path.
    pub container_path: PathBuf,
    /// Whether the mount is read-only.
    pub readonly: bool,
}

impl VolumeMount {
    /// Creates a read-only volume mount.
    pub fn readonly(host: impl Into<PathBuf>, container: impl Into<PathBuf>) -> Self {
        Self {
            host_path: host.into(),
            container_path: container.into(),
            readonly: true,
        }
    }

    /// Returns the Docker mount string format.
    pub fn to_docker_mount(&self) -> String {
        let ro = if self.readonly { ":ro" } else { "" };
        format!(
            "{}:{}{}",
            self.host_path.display(),
            self.container_path.display(),
            ro
        )
    }
}

/// One `docker run` of a solution image.
#[derive(Debug, Clone)]
pub struct ContainerRun {
    /// Container name, also exposed to the solution as `HOST-SELF`.
    pub name: String,
    /// Image tag to run.
    pub image: String,
    /// Network to attach to, if the task has an environment.
    pub network: Option<String>,
    /// Environment variables, in order.
    pub env_vars: Vec<(String, String)>,
    /// Volume mounts.
    pub volumes: Vec<VolumeMount>,
}

impl ContainerRun {
    /// Creates a run of `image` under a fresh unique container name.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            name: Uuid::new_v4().to_string(),
            image: image.into(),
            network: None,
            env_vars: Vec::new(),
            volumes: Vec::new(),
        }
    }

    /// Attaches the container to `network`.
    pub fn with_network(mut self, network: Option<&str>) -> Self {
        self.network = network.map(String::from);
        self
    }

    /// Adds an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Adds an environment variable, or the harmless placeholder when absent.
    pub fn with_env_or_placeholder(self, key: &str, value: Option<String>) -> Self {
        match value {
            Some(value) => self.with_env(key, value),
            None => self.with_env(PLACEHOLDER_ENV.0, PLACEHOLDER_ENV.1),
        }
    }

    /// Adds a volume mount.
    pub fn with_volume(mut self, mount: VolumeMount) -> Self {
        self.volumes.push(mount);
        self
    }

    /// Arguments for `docker`, starting with `run`.
    pub fn docker_run_args(&self) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--name".to_string(),
            self.name.clone(),
            "--rm".to_string(),
        ];

        if let Some(ref network) = self.network {
            args.push("--network".to_string());
            args.push(network.clone());
        }

        for (key, value) in &self.env_vars {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }

        for volume in &self.volumes {
            args.push("-v".to_string());
            args.push(volume.to_docker_mount());
        }

        args.push(self.image.clone());
        args
    }
}
