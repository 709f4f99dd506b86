//! Python expression tool backed by the sandbox.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use super::{string_arg, Tool, ToolError, ToolOutput};
use crate::sandbox::Sandbox;

/// Runs a code fragment and reports what it printed.
///
/// Sandbox failures come back inside the payload's `error` field, so the
/// model sees them as ordinary results it can react to.
pub struct PythonExpressionTool {
    sandbox: Arc<dyn Sandbox>,
}

impl PythonExpressionTool {
    pub fn new(sandbox: Arc<dyn Sandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for PythonExpressionTool {
    fn name(&self) -> &str {
        "python_expression"
    }

    fn description(&self) -> &str {
        "Execute Python (math, stats available)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {"type": "string"}
            },
            "required": ["expression"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let expression = string_arg(&args, "expression")?;
        let outcome = self.sandbox.evaluate(&expression).await;
        debug!(success = outcome.is_success(), "python_expression finished");

        let payload = serde_json::to_value(&outcome)
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        Ok(ToolOutput::new(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RoutineError;
    use crate::sandbox::{ExecOutcome, Value as PyValue};
    use std::sync::Mutex;

    /// Records fragments and fails on anything containing "raise".
    #[derive(Default)]
    struct RecordingSandbox {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Sandbox for RecordingSandbox {
        async fn evaluate(&self, fragment: &str) -> ExecOutcome {
            self.seen.lock().unwrap().push(fragment.to_string());
            if fragment.contains("raise") {
                ExecOutcome::failure("boom")
            } else {
                ExecOutcome::output("Executed")
            }
        }

        async fn resolve(&self, _: &str, _: &str) -> Result<(), RoutineError> {
            Ok(())
        }

        async fn invoke(&self, _: &str, _: &str, _: Vec<PyValue>) -> Result<PyValue, RoutineError> {
            Ok(PyValue::None)
        }
    }

    #[tokio::test]
    async fn test_failure_is_reported_in_payload() {
        let sandbox = Arc::new(RecordingSandbox::default());
        let tool = PythonExpressionTool::new(sandbox.clone());

        let output = tool
            .execute(json!({"expression": "raise ValueError('boom')"}))
            .await
            .unwrap();
        assert_eq!(output.payload, json!({"result": null, "error": "boom"}));
        assert!(output.submission.is_none());
    }

    #[tokio::test]
    async fn test_missing_expression_runs_empty_fragment() {
        let sandbox = Arc::new(RecordingSandbox::default());
        let tool = PythonExpressionTool::new(sandbox.clone());

        let output = tool.execute(json!({})).await.unwrap();
        assert_eq!(output.payload["result"], "Executed");
        assert_eq!(sandbox.seen.lock().unwrap().as_slice(), [String::new()]);
    }
}
