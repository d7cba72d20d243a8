//! Shared utility functions for verify-tasks.

pub mod duration;

pub use duration::parse_duration;
