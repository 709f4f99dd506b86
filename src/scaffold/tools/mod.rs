//! Tool definitions and registry for the scaffold system.
//!
//! This module defines the `Tool` trait and provides a registry for managing
//! the tools the LLM agent may invoke.

pub mod python;
pub mod submit;

pub use python::PythonExpressionTool;
pub use submit::SubmitCodeTool;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::llm::ToolDefinition;
use crate::sandbox::Sandbox;

/// Errors that can occur during tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Invalid parameters provided to the tool.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Tool execution failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// No tool is registered under the requested name.
    #[error("Tool not available: {0}")]
    NotAvailable(String),
}

/// Result of a tool execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Structured result echoed back to the model.
    pub payload: Value,
    /// Code accepted as the agent's submission, if this tool submits.
    pub submission: Option<String>,
}

impl ToolOutput {
    /// A plain result with no submission attached.
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            submission: None,
        }
    }

    /// A result that also records a submission.
    pub fn submitted(payload: Value, code: impl Into<String>) -> Self {
        Self {
            payload,
            submission: Some(code.into()),
        }
    }
}

/// Trait for tools that can be executed by the agent.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the unique name of the tool.
    fn name(&self) -> &str;

    /// Returns a description of what the tool does.
    fn description(&self) -> &str;

    /// Returns the JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the argument object supplied by the model.
    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError>;

    /// Declaration sent to the model.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
        }
    }
}

/// Registry for managing available tools.
///
/// Tools keep their registration order so the declarations sent to the model
/// are stable across runs.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Create a registry with `python_expression` and `submit_code`.
    pub fn with_default_tools(sandbox: Arc<dyn Sandbox>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PythonExpressionTool::new(sandbox)));
        registry.register(Arc::new(SubmitCodeTool::new()));
        registry
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(index) => self.tools[index] = tool,
            None => self.tools.push(tool),
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// List all registered tool names.
    pub fn list_tools(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool declarations in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Route one invocation to the named tool.
    pub async fn dispatch(&self, name: &str, args: Value) -> Result<ToolOutput, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotAvailable(format!("Tool '{}' not found", name)))?;
        tool.execute(args).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract a string argument, treating a missing key as empty.
pub(crate) fn string_arg(args: &Value, key: &str) -> Result<String, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ToolError::InvalidParameters(format!(
            "'{}' must be a string, got {}",
            key, other
        ))),
    }
}
