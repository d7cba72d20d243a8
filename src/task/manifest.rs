//! Task manifest (`task.yml`) loading.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

/// File name of the task manifest inside a task directory.
pub const MANIFEST_FILE: &str = "task.yml";

/// Declared metadata of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskManifest {
    /// Unique task name, the join key for results and digests.
    pub name: String,
    /// Secret flag a passing solution must print.
    pub flag: String,
    /// Hostname of the primary service in the task environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    /// Port the primary service listens on.
    #[serde(
        default,
        rename = "local-port",
        skip_serializing_if = "Option::is_none"
    )]
    pub local_port: Option<u16>,
}

impl TaskManifest {
    /// Parses a manifest from YAML text.
    ///
    /// `path` is only used for error messages.
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self, ManifestError> {
        let manifest: TaskManifest =
            serde_yaml::from_str(content).map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if manifest.name.trim().is_empty() {
            return Err(ManifestError::EmptyField {
                path: path.to_path_buf(),
                field: "name",
            });
        }
        if manifest.flag.is_empty() {
            return Err(ManifestError::EmptyField {
                path: path.to_path_buf(),
                field: "flag",
            });
        }

        Ok(manifest)
    }

    /// Loads the manifest of the task rooted at `task_dir`.
    pub fn load(task_dir: &Path) -> Result<Self, ManifestError> {
        let path = manifest_path(task_dir);
        let content = fs::read_to_string(&path).map_err(|source| ManifestError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_yaml(&content, &path)
    }

    /// Returns the primary service endpoint when both parts are declared.
    pub fn service_endpoint(&self) -> Option<(&str, u16)> {
        match (self.main.as_deref(), self.local_port) {
            (Some(host), Some(port)) => Some((host, port)),
            _ => None,
        }
    }
}

/// Path of the manifest file for a task directory.
pub fn manifest_path(task_dir: &Path) -> PathBuf {
    task_dir.join(MANIFEST_FILE)
}
