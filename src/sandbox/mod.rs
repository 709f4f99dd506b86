//! Sandboxed code execution.
//!
//! Two capabilities sit behind the [`Sandbox`] trait:
//!
//! 1. `evaluate`: run a free-form fragment and capture what it prints. This
//!    backs the agent's `python_expression` tool and never fails across the
//!    boundary; every failure comes back inside [`ExecOutcome`].
//! 2. `resolve` / `invoke`: load submitted source into a fresh namespace,
//!    look up a named entry point and call it with [`Value`] arguments. This
//!    backs the grading harness.
//!
//! Nothing persists between calls: every call gets its own namespace.

pub mod python;
pub mod value;

pub use python::PythonSandbox;
pub use value::Value;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RoutineError;

/// Captured result of evaluating a fragment.
///
/// Exactly one of `result` / `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecOutcome {
    pub result: Option<String>,
    pub error: Option<String>,
}

impl ExecOutcome {
    /// Output captured from a fragment that ran to completion.
    pub fn output(result: impl Into<String>) -> Self {
        Self {
            result: Some(result.into()),
            error: None,
        }
    }

    /// A fragment that failed.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Configuration for a sandbox backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Interpreter executable.
    pub interpreter: String,
    /// Wall-clock limit for a single call.
    pub timeout: Duration,
}

impl SandboxConfig {
    /// Creates a configuration for the given interpreter with defaults.
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self::new("python3")
    }
}

/// Isolated evaluation context for untrusted code.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Run a fragment and capture its standard output.
    ///
    /// Returns `"Executed"` as the result when the fragment prints nothing.
    async fn evaluate(&self, fragment: &str) -> ExecOutcome;

    /// Load `source` and check that `entry` names a callable.
    async fn resolve(&self, source: &str, entry: &str) -> Result<(), RoutineError>;

    /// Load `source` into a fresh namespace and call `entry(*args)`.
    async fn invoke(&self, source: &str, entry: &str, args: Vec<Value>)
        -> Result<Value, RoutineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_outcome_serializes_both_keys() {
        let ok = serde_json::to_value(ExecOutcome::output("Executed")).unwrap();
        assert_eq!(ok, serde_json::json!({"result": "Executed", "error": null}));

        let err = serde_json::to_value(ExecOutcome::failure("division by zero")).unwrap();
        assert_eq!(
            err,
            serde_json::json!({"result": null, "error": "division by zero"})
        );
    }

    #[test]
    fn test_sandbox_config_builder() {
        let config = SandboxConfig::new("python3.12").with_timeout(Duration::from_secs(5));
        assert_eq!(config.interpreter, "python3.12");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(SandboxConfig::default().interpreter, "python3");
    }
}
