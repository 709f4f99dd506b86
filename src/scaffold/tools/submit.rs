//! Submission acceptor.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{string_arg, Tool, ToolError, ToolOutput};

/// Accepts the agent's final `process_batch` implementation.
#[derive(Debug, Default)]
pub struct SubmitCodeTool;

impl SubmitCodeTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for SubmitCodeTool {
    fn name(&self) -> &str {
        "submit_code"
    }

    fn description(&self) -> &str {
        "Submit improved process_batch implementation."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": {"type": "string"}
            },
            "required": ["code"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let code = string_arg(&args, "code")?;
        let payload = json!({"code": code, "submitted": true});
        Ok(ToolOutput::submitted(payload, code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_echoes_code() {
        let output = SubmitCodeTool::new()
            .execute(json!({"code": "def process_batch(e, s): ..."}))
            .await
            .unwrap();
        assert_eq!(output.payload["submitted"], true);
        assert_eq!(output.payload["code"], "def process_batch(e, s): ...");
        assert_eq!(
            output.submission.as_deref(),
            Some("def process_batch(e, s): ...")
        );
    }

    #[tokio::test]
    async fn test_submit_without_code_is_empty() {
        let output = SubmitCodeTool::new().execute(json!({})).await.unwrap();
        assert_eq!(output.submission.as_deref(), Some(""));
    }
}
