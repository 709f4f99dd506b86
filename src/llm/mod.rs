//! LLM integration for gauntlet.
//!
//! The remote model is consumed as an opaque turn-taking call: a request
//! carrying the conversation and tool declarations goes out, an ordered list
//! of content blocks (text or tool invocations) comes back.
//!
//! ```ignore
//! use gauntlet::llm::{AnthropicClient, GenerationRequest, LlmProvider, Message};
//!
//! let client = AnthropicClient::from_env()?;
//! let request = GenerationRequest::new("", vec![Message::user("Hello!")]);
//! let response = client.generate(request).await?;
//! println!("{}", response.text());
//! ```

pub mod anthropic;

pub use anthropic::{
    AnthropicClient, ContentBlock, GenerationRequest, GenerationResponse, LlmProvider, Message,
    MessageContent, Role, ToolDefinition, Usage, ANTHROPIC_BASE_URL, DEFAULT_MODEL,
};
