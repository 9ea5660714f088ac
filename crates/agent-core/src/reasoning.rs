//! Reasoning Loop
//!
//! Implements the ReAct (Reason + Act) pattern for agent behavior.
//! The agent observes, thinks, acts (via tools), and responds.

use std::borrow::Cow;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{ToolCall, ToolRegistry};

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Maximum reasoning iterations before giving up
    pub max_iterations: usize,

    /// Generation options
    pub generation: GenerationOptions,

    /// Describe tools in a system message instead of passing them natively
    pub inject_tool_descriptions: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            generation: GenerationOptions::default(),
            inject_tool_descriptions: false,
        }
    }
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Messages as sent to the provider; the tool section is never stored
    fn prompt_messages<'a>(&self, conversation: &'a Conversation) -> Cow<'a, [Message]> {
        if self.config.inject_tool_descriptions && !self.tools.is_empty() {
            let mut messages = Vec::with_capacity(conversation.len() + 1);
            messages.push(Message::system(self.tools.generate_prompt_section()));
            messages.extend_from_slice(conversation.messages());
            Cow::Owned(messages)
        } else {
            Cow::Borrowed(conversation.messages())
        }
    }

    /// Run the reasoning loop until the model answers without calling tools.
    ///
    /// Every assistant turn and tool result is appended to `conversation`.
    /// Provider errors abort the run; tool failures are fed back to the model.
    pub async fn run(&self, conversation: &mut Conversation) -> Result<String> {
        let schemas = if self.config.inject_tool_descriptions {
            Vec::new()
        } else {
            self.tools.schemas()
        };

        let mut iterations = 0;

        loop {
            iterations += 1;

            if iterations > self.config.max_iterations {
                return Err(AgentError::MaxIterations(self.config.max_iterations));
            }

            // Get completion from provider
            let completion = self.provider
                .complete(&self.prompt_messages(conversation), &schemas, &self.config.generation)
                .await?;

            let mut calls = completion.tool_calls;
            if calls.is_empty() && self.config.inject_tool_descriptions {
                calls.extend(parse_tool_call(&completion.content));
            }
            for call in &mut calls {
                if call.id.is_none() {
                    call.id = Some(uuid::Uuid::new_v4().to_string());
                }
            }

            let content = completion.content;
            conversation.push(
                Message::assistant(content.clone())
                    .with_tool_calls(calls.clone())
                    .with_metadata(completion.metadata),
            );

            if calls.is_empty() {
                return Ok(content);
            }

            for call in &calls {
                tracing::debug!(tool = %call.name, "Executing tool");
                let outcome = self.tools.execute(call).await;
                conversation.push(
                    Message::tool(outcome.render(), call.id.clone()).with_name(&call.name),
                );
            }
        }
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }
}

/// Parse a fenced ```` ```tool ```` block, or a bare JSON object with a
/// `"tool"` key, from model text.
fn parse_tool_call(content: &str) -> Option<ToolCall> {
    let tool_start = "```tool";
    let tool_end = "```";

    if let Some(start_idx) = content.find(tool_start) {
        let after_marker = &content[start_idx + tool_start.len()..];
        if let Some(end_idx) = after_marker.find(tool_end) {
            let json_str = after_marker[..end_idx].trim();
            if let Ok(call) = serde_json::from_str::<ToolCall>(json_str) {
                return Some(call);
            }
        }
    }

    parse_inline_tool_call(content)
}

fn parse_inline_tool_call(content: &str) -> Option<ToolCall> {
    if !content.contains(r#""tool""#) {
        return None;
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;

    if end <= start {
        return None;
    }

    serde_json::from_str::<ToolCall>(&content[start..=end]).ok()
}
