//! Error types for verify-tasks operations.
//!
//! Defines error types for the major subsystems:
//! - Task manifest loading
//! - Content digests used for change detection
//! - Docker and docker-compose invocations
//! - Persisted result store
//! - Per-task verification
//! - Run configuration

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading a task manifest (`task.yml`).
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Manifest '{path}' has an empty '{field}' field")]
    EmptyField { path: PathBuf, field: &'static str },
}

/// Errors that can occur while computing a task digest.
#[derive(Debug, Error)]
pub enum DigestError {
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Failed to walk '{path}': {message}")]
    Walk { path: PathBuf, message: String },

    #[error("File name contains a newline: {0}")]
    NewlineInName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during docker operations.
#[derive(Debug, Error)]
pub enum DockerError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with code {code}: {output}")]
    NonZeroExit {
        command: String,
        code: i32,
        output: String,
    },

    #[error("Failed to write compose override '{path}': {source}")]
    Override {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors that can occur while loading or saving the result store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read store '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store '{path}' is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write store '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that abort the verification of a single task.
///
/// These never stop the run: the orchestrator logs them and moves on.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Solutions directory not found: {0}")]
    MissingSolutions(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors in the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Directory not found: {0}")]
    MissingRoot(PathBuf),

    #[error("Invalid duration '{0}': expected values like 30s, 10m or 1h30m")]
    InvalidDuration(String),
}
