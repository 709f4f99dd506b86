//! Scaffold system for agent execution.
//!
//! The scaffold exposes tools to the LLM and drives the tool-dispatch loop
//! until the agent submits code, stops calling tools, or runs out of steps.
//!
//! # Example
//!
//! ```ignore
//! use gauntlet::scaffold::{build_prompt, AgentConfig, AgentLoop, ToolRegistry};
//! use gauntlet::llm::AnthropicClient;
//! use gauntlet::sandbox::PythonSandbox;
//!
//! let llm_client = Arc::new(AnthropicClient::from_env()?);
//! let tools = Arc::new(ToolRegistry::with_default_tools(Arc::new(PythonSandbox::default())));
//! let agent = AgentLoop::new(llm_client, tools, AgentConfig::default());
//! let outcome = agent.run(&build_prompt()).await?;
//! ```

pub mod agent_loop;
pub mod prompts;
pub mod tools;

pub use agent_loop::{AgentConfig, AgentLoop, AgentOutcome, Termination};
pub use prompts::{build_prompt, build_prompt_for, BUGGY_PIPELINE};
pub use tools::{
    PythonExpressionTool, SubmitCodeTool, Tool, ToolError, ToolOutput, ToolRegistry,
};
