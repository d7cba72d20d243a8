//! Command-line interface for verify-tasks.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli};
