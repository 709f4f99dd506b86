//! CPython-backed sandbox.
//!
//! Each call spawns a fresh `python3 -I` process running an embedded driver
//! script, sends one JSON request on stdin and reads one reply line back.

use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value as Json};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{ExecOutcome, Sandbox, SandboxConfig, Value};
use crate::error::{RoutineError, SandboxError};

/// Driver script executed by the interpreter.
const DRIVER: &str = include_str!("driver.py");

/// Prefix of the reply line written by the driver.
const REPLY_MARKER: &str = "@@gauntlet-reply@@";

/// Line the driver writes once it has parsed a request.
const ACCEPT_MARKER: &str = "@@gauntlet-accepted@@";

/// Maximum stderr characters quoted in protocol errors.
const STDERR_TAIL: usize = 400;

/// Reply to a `resolve` or `call` request.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum CallReply {
    Ok {
        #[serde(default)]
        value: Option<Json>,
    },
    Missing,
    LoadError {
        error: String,
    },
    Raised {
        error: String,
    },
    Unencodable {
        error: String,
    },
}

/// Sandbox that runs code in short-lived CPython processes.
#[derive(Debug, Clone, Default)]
pub struct PythonSandbox {
    config: SandboxConfig,
}

impl PythonSandbox {
    /// Creates a sandbox with the given configuration.
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Returns the sandbox configuration.
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Checks whether the configured interpreter can be started.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.config.interpreter)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Sends one request to a fresh driver process and returns its reply.
    async fn exchange(&self, request: &Json) -> Result<Json, SandboxError> {
        let payload = serde_json::to_vec(request)?;

        let mut child = Command::new(&self.config.interpreter)
            .args(["-I", "-c", DRIVER])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SandboxError::Spawn {
                interpreter: self.config.interpreter.clone(),
                source,
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SandboxError::Protocol("interpreter stdin unavailable".to_string()))?;

        let seconds = self.config.timeout.as_secs();
        let round_trip = async move {
            stdin.write_all(&payload).await?;
            drop(stdin);
            child.wait_with_output().await
        };

        let output = timeout(self.config.timeout, round_trip)
            .await
            .map_err(|_| SandboxError::Timeout { seconds })??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let Some(reply) = stdout
            .lines()
            .rev()
            .find_map(|line| line.strip_prefix(REPLY_MARKER))
        else {
            let stderr = stderr_tail(&output.stderr);
            let status = output.status.to_string();
            // Once the driver has accepted the request, a silent exit is the
            // submitted code taking the interpreter down.
            if stdout.lines().any(|line| line == ACCEPT_MARKER) {
                return Err(SandboxError::Exited { status, stderr });
            }
            return Err(SandboxError::Protocol(format!(
                "driver exited with {} and no reply: {}",
                status, stderr
            )));
        };

        Ok(serde_json::from_str(reply)?)
    }

    /// Runs a `resolve` or `call` request and maps the reply.
    async fn call(&self, request: Json) -> Result<Option<Value>, RoutineError> {
        let reply = self.exchange(&request).await?;
        let reply: CallReply = serde_json::from_value(reply).map_err(SandboxError::from)?;

        match reply {
            CallReply::Ok { value } => Ok(value.as_ref().map(Value::from_json)),
            CallReply::Missing => Err(RoutineError::MissingEntry {
                entry: request["entry"].as_str().unwrap_or_default().to_string(),
            }),
            CallReply::LoadError { error } => Err(RoutineError::Load(error)),
            CallReply::Raised { error } => Err(RoutineError::Raised(error)),
            CallReply::Unencodable { error } => Err(RoutineError::Malformed(format!(
                "return value could not be inspected: {}",
                error
            ))),
        }
    }
}

/// Last `STDERR_TAIL` characters of stderr, trimmed.
fn stderr_tail(stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let skip = stderr.chars().count().saturating_sub(STDERR_TAIL);
    stderr.chars().skip(skip).collect::<String>().trim().to_string()
}

#[async_trait]
impl Sandbox for PythonSandbox {
    async fn evaluate(&self, fragment: &str) -> ExecOutcome {
        debug!(fragment_len = fragment.len(), "Evaluating fragment");
        let request = json!({"op": "eval", "fragment": fragment});

        match self.exchange(&request).await {
            Ok(reply) => serde_json::from_value(reply).unwrap_or_else(|e| {
                ExecOutcome::failure(format!("malformed sandbox reply: {}", e))
            }),
            Err(e) => {
                warn!(error = %e, "Fragment evaluation failed in sandbox");
                ExecOutcome::failure(e.to_string())
            }
        }
    }

    async fn resolve(&self, source: &str, entry: &str) -> Result<(), RoutineError> {
        let request = json!({"op": "resolve", "source": source, "entry": entry});
        self.call(request).await.map(|_| ())
    }

    async fn invoke(
        &self,
        source: &str,
        entry: &str,
        args: Vec<Value>,
    ) -> Result<Value, RoutineError> {
        let args: Vec<Json> = args.iter().map(Value::to_json).collect();
        let request = json!({"op": "call", "source": source, "entry": entry, "args": args});
        self.call(request)
            .await
            .map(|value| value.unwrap_or(Value::None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_marker_matches() {
        assert!(DRIVER.contains(REPLY_MARKER));
        assert!(DRIVER.contains(ACCEPT_MARKER));
    }

    #[test]
    fn test_stderr_tail_keeps_the_end() {
        let long = format!("{}Traceback end", "x".repeat(1000));
        let tail = stderr_tail(long.as_bytes());
        assert_eq!(tail.chars().count(), STDERR_TAIL);
        assert!(tail.ends_with("Traceback end"));
        assert_eq!(stderr_tail(b"  boom\n"), "boom");
    }

    #[test]
    fn test_call_reply_parsing() {
        let reply: CallReply =
            serde_json::from_value(json!({"status": "raised", "error": "boom"})).unwrap();
        assert!(matches!(reply, CallReply::Raised { error } if error == "boom"));

        let reply: CallReply = serde_json::from_value(json!({"status": "missing"})).unwrap();
        assert!(matches!(reply, CallReply::Missing));

        let reply: CallReply =
            serde_json::from_value(json!({"status": "ok", "value": null})).unwrap();
        assert!(matches!(reply, CallReply::Ok { value: None }));
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_contained() {
        let sandbox = PythonSandbox::new(SandboxConfig::new("definitely-not-a-python-binary"));
        assert!(!sandbox.is_available().await);

        let outcome = sandbox.evaluate("print(1)").await;
        assert!(outcome.result.is_none());
        assert!(outcome
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("definitely-not-a-python-binary"));

        let err = sandbox
            .invoke("def process_batch(e, s): pass", "process_batch", vec![])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RoutineError::Sandbox(SandboxError::Spawn { .. })
        ));
    }
}
