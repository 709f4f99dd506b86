//! Agent tool-dispatch loop.
//!
//! One loop holds one conversation with the model:
//! 1. Send the conversation and tool declarations
//! 2. Dispatch every tool invocation in the response, in order
//! 3. Append the assistant turn and the correlated tool results
//! 4. Stop on submission, on a turn without tool use, or when the step
//!    budget runs out

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::tools::ToolRegistry;
use crate::error::LlmError;
use crate::llm::{ContentBlock, GenerationRequest, LlmProvider, Message, Usage, DEFAULT_MODEL};

/// Configuration for the agent loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum number of model turns.
    pub max_steps: usize,
    /// Model to use for LLM requests.
    pub model: String,
    /// Output token budget per model turn.
    pub max_tokens: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 18,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 3200,
        }
    }
}

impl AgentConfig {
    /// Create a new agent configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of steps.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the maximum tokens for responses.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// A non-empty submission was recorded.
    Submitted,
    /// The model answered without invoking any tool.
    NoToolUse,
    /// The step budget ran out.
    StepBudgetExhausted,
}

/// Result of one agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutcome {
    /// Last code passed to `submit_code`, if any.
    pub submission: Option<String>,
    /// Number of model turns taken.
    pub steps_taken: usize,
    /// Number of tool invocations dispatched.
    pub tool_calls: usize,
    pub termination: Termination,
    /// Tokens summed over every model turn.
    pub usage: Usage,
    /// Full conversation, starting with the prompt turn.
    pub conversation: Vec<Message>,
}

impl AgentOutcome {
    /// The submission, treating empty code as no submission.
    pub fn final_submission(&self) -> Option<&str> {
        self.submission.as_deref().filter(|code| !code.is_empty())
    }
}

/// Main agent execution loop.
pub struct AgentLoop {
    /// LLM provider for generating responses.
    llm_client: Arc<dyn LlmProvider>,
    /// Tool registry with available tools.
    tool_registry: Arc<ToolRegistry>,
    /// Agent configuration.
    config: AgentConfig,
}

impl AgentLoop {
    /// Create an agent loop over a shared tool registry.
    pub fn new(
        llm_client: Arc<dyn LlmProvider>,
        tool_registry: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            llm_client,
            tool_registry,
            config,
        }
    }

    /// Get the agent configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run the loop for a prompt.
    ///
    /// Transport failures propagate; every tool failure is reported back to
    /// the model as an error result instead.
    pub async fn run(&self, prompt: &str) -> Result<AgentOutcome, LlmError> {
        let tools = self.tool_registry.definitions();
        let mut conversation = vec![Message::user(prompt)];
        let mut submission: Option<String> = None;
        let mut tool_calls = 0;
        let mut steps_taken = 0;
        let mut termination = Termination::StepBudgetExhausted;
        let mut usage = Usage::default();

        while steps_taken < self.config.max_steps {
            steps_taken += 1;

            let request = GenerationRequest::new(self.config.model.clone(), conversation.clone())
                .with_max_tokens(self.config.max_tokens)
                .with_tools(tools.clone());

            let response = self.llm_client.generate(request).await?;
            usage.input_tokens = usage.input_tokens.saturating_add(response.usage.input_tokens);
            usage.output_tokens = usage.output_tokens.saturating_add(response.usage.output_tokens);
            debug!(
                step = steps_taken,
                blocks = response.content.len(),
                stop_reason = ?response.stop_reason,
                "Model turn received"
            );

            let mut results = Vec::new();
            for block in &response.content {
                let ContentBlock::ToolUse { id, name, input } = block else {
                    continue;
                };
                tool_calls += 1;

                let result = match self.tool_registry.dispatch(name, input.clone()).await {
                    Ok(output) => {
                        if let Some(code) = output.submission {
                            info!(step = steps_taken, code_len = code.len(), "Submission recorded");
                            submission = Some(code);
                        }
                        ContentBlock::tool_result(id.clone(), output.payload.to_string(), false)
                    }
                    Err(e) => {
                        warn!(step = steps_taken, tool = %name, error = %e, "Tool invocation failed");
                        let payload = json!({"error": e.to_string()});
                        ContentBlock::tool_result(id.clone(), payload.to_string(), true)
                    }
                };
                results.push(result);
            }

            if results.is_empty() {
                termination = Termination::NoToolUse;
                break;
            }

            let assistant: Vec<ContentBlock> = response
                .content
                .into_iter()
                .filter(ContentBlock::is_echoable)
                .collect();
            conversation.push(Message::assistant_blocks(assistant));
            conversation.push(Message::user_blocks(results));

            if submission.as_deref().is_some_and(|code| !code.is_empty()) {
                termination = Termination::Submitted;
                break;
            }
        }

        info!(
            steps = steps_taken,
            tool_calls,
            termination = ?termination,
            submitted = submission.is_some(),
            "Agent loop finished"
        );

        Ok(AgentOutcome {
            submission,
            steps_taken,
            tool_calls,
            termination,
            usage,
            conversation,
        })
    }
}
