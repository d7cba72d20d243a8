//! verify-tasks: solution verification for CTF-style task trees.
//!
//! This library discovers tasks, detects which of them changed since the
//! last run, runs their solutions against an isolated environment and keeps
//! a persistent pass/fail matrix.

// Core modules
pub mod change;
pub mod cli;
pub mod docker;
pub mod error;
pub mod execution;
pub mod pipeline;
pub mod runner;
pub mod storage;
pub mod task;
pub mod utils;

// Re-export commonly used error types
pub use error::{ConfigError, DigestError, DockerError, ManifestError, StoreError, TaskError};
