//! Command-line interface for gauntlet.
//!
//! Provides the evaluation run, offline grading of stored submissions and
//! printing of the task prompt.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli};
