//! Verification pipeline over a whole task tree.
//!
//! # Pipeline Flow
//!
//! 1. **Load**: the prior store is read (a missing file is an empty store)
//! 2. **Discovery**: task directories are collected under the root
//! 3. **Change detection**: tasks whose digest matches the stored one are skipped
//! 4. **Verification**: every remaining task goes through the [`TaskRunner`]
//! 5. **Merge**: each result is folded into the store, which is saved after
//!    every task and once more at the end
//!
//! # Example
//!
//! ```rust,ignore
//! use verify_tasks::pipeline::Orchestrator;
//! use verify_tasks::runner::RunConfig;
//!
//! let config = RunConfig::new("./tasks").with_store_path("results.json");
//! let summary = Orchestrator::new(config).run().await?;
//!
//! println!("{} verified, {} unchanged", summary.verified, summary.unchanged);
//! ```
//!
//! [`TaskRunner`]: crate::runner::TaskRunner

pub mod orchestrator;

pub use orchestrator::{Orchestrator, PipelineError, RunSummary};
