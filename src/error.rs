//! Error types for gauntlet operations.
//!
//! Each enum maps onto one fault class of the evaluation:
//! - `LlmError`: transport faults talking to the remote model
//! - `SandboxError`: infrastructure faults in the execution sandbox
//! - `RoutineError`: faults attributable to a submitted routine

use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: ANTHROPIC_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

/// Errors raised by the sandbox itself, independent of the code it runs.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Failed to start interpreter '{interpreter}': {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Sandbox call timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Malformed driver response: {0}")]
    Protocol(String),

    /// The driver accepted a request but the process ended before replying.
    #[error("interpreter exited with {status}: {stderr}")]
    Exited { status: String, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while loading or invoking a submitted routine.
#[derive(Debug, Error)]
pub enum RoutineError {
    /// The entry point is absent or not callable.
    #[error("{entry} missing")]
    MissingEntry { entry: String },

    /// The source raised while being loaded.
    #[error("{0}")]
    Load(String),

    /// The routine raised during invocation. Holds the exception text.
    #[error("{0}")]
    Raised(String),

    /// The routine did not return within the sandbox timeout.
    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The routine returned something the harness could not inspect.
    #[error("{0}")]
    Malformed(String),

    /// The sandbox failed underneath the routine.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

impl RoutineError {
    /// Splits infrastructure failures from faults of the routine itself.
    ///
    /// Timeouts and interpreter deaths after the request was accepted
    /// surface from the sandbox but are charged to the routine.
    pub fn into_routine_fault(self) -> Result<RoutineError, SandboxError> {
        match self {
            RoutineError::Sandbox(SandboxError::Timeout { seconds }) => {
                Ok(RoutineError::Timeout { seconds })
            }
            RoutineError::Sandbox(exited @ SandboxError::Exited { .. }) => {
                Ok(RoutineError::Raised(exited.to_string()))
            }
            RoutineError::Sandbox(e) => Err(e),
            other => Ok(other),
        }
    }
}
