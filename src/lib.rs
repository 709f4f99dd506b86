//! gauntlet: reliability benchmark for autonomous code-repair agents.
//!
//! An agent is handed a data-processing routine with cascading defects and
//! iterates through a sandboxed Python tool until it submits a fix. Each
//! submission is graded against escalating tiers of synthetic inputs, and
//! pass rates are aggregated over many independent trials.

// Core modules
pub mod cli;
pub mod error;
pub mod grading;
pub mod llm;
pub mod runner;
pub mod sandbox;
pub mod scaffold;

// Re-export commonly used error types
pub use error::{LlmError, RoutineError, SandboxError};
