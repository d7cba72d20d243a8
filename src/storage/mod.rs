//! Persistent result storage.
//!
//! The store is a single JSON file holding the pass/fail matrix of every
//! verified task and the content digest each task was last verified at.
//!
//! # Usage
//!
//! ```rust,ignore
//! use verify_tasks::storage::PersistedStore;
//!
//! let mut store = PersistedStore::load(Path::new("verify.json"))?;
//! store.merge(task_result, Some(&digest));
//! store.save(Path::new("verify.json"))?;
//! ```

pub mod store;

pub use store::{is_stdout, PersistedStore, STDOUT_PATH};
