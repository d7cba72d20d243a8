//! External process execution.
//!
//! Thin layer over `tokio::process` that every docker, compose and solution
//! invocation goes through.

pub mod process;

pub use process::{run_captured, CapturedOutput};
