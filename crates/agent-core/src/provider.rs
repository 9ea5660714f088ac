//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for all reasoning capabilities (OpenAI, Ollama, etc.)
//! allowing the agent to work with any backend without code changes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{GenerationOptions, LlmProvider};
//!
//! let provider = OpenAiProvider::from_config(config)?;
//! let completion = provider.complete(&messages, &tools, &options).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{Message, MessageMetadata};
use crate::tool::{ToolCall, ToolSchema};

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "gpt-4o-mini", "llama3.2")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 { 0.2 }

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

/// Response from an LLM completion
#[derive(Clone, Debug, Default)]
pub struct Completion {
    /// The generated text
    pub content: String,

    /// Tool calls requested natively by the model
    pub tool_calls: Vec<ToolCall>,

    /// Provider metadata in the provider's own key layout
    pub metadata: MessageMetadata,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Default::default()
        }
    }
}

/// Token usage statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The agent works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "openai", "ollama")
    fn name(&self) -> &str;

    /// Check if the provider is available and configured correctly
    async fn health_check(&self) -> Result<bool>;

    /// Whether tool schemas are passed natively rather than described in the prompt
    fn supports_tools(&self) -> bool {
        true
    }

    /// Generate a completion from messages, offering the given tools
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Completion>;
}
