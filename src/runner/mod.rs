//! Task runner for solution verification.
//!
//! # Architecture
//!
//! ```text
//! task dir → TaskRunner → EnvironmentManager::setup
//!                       → Verifier (per solution, fresh deadline)
//!                       → EnvironmentManager::teardown → TaskOutcome
//! ```
//!
//! The runner:
//! 1. Loads the manifest and the runnable solutions
//! 2. Brings up the task environment on the run's network, if there is one
//! 3. Runs every solution under its own deadline and matches the flag
//! 4. Tears the environment down, whatever happened before
//!
//! # Example
//!
//! ```ignore
//! use verify_tasks::runner::{RunConfig, TaskRunner};
//!
//! let config = RunConfig::new("./tasks").with_timeout(Duration::from_secs(60));
//! let runner = TaskRunner::from_config(&config);
//! let outcome = runner.run(Path::new("./tasks/echo-service")).await?;
//!
//! println!("{} passed", outcome.result.passed());
//! ```

pub mod config;
pub mod executor;
pub mod result;
pub mod sandbox;
pub mod verifier;

pub use config::{RunConfig, DEFAULT_TIMEOUT};
pub use executor::TaskRunner;
pub use result::{
    Diagnostic, DiagnosticStage, Diagnostics, SolutionResult, TaskOutcome, TaskResult, TaskStage,
};
pub use sandbox::{ContainerRun, VolumeMount, PLACEHOLDER_ENV};
pub use verifier::{flag_matches, Capture, Verifier, VerifyContext};
