//! OpenAI-compatible LLM Provider
//!
//! Implementation of `LlmProvider` over the `/chat/completions` API with
//! native function calling.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, MessageMetadata, Role},
    provider::{Completion, GenerationOptions, LlmProvider},
    tool::{ToolCall, ToolSchema},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::errors;

/// OpenAI provider configuration
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// API base, up to and including the version segment
    pub base_url: String,

    /// Bearer token
    pub api_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: String::new(),
            timeout_secs: 120,
        }
    }
}

impl OpenAiConfig {
    /// Read `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `PROVIDER_TIMEOUT_SECS`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let api_key = lookup("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::Config("OPENAI_API_KEY is not set".into()))?;

        Ok(Self {
            base_url: lookup("OPENAI_BASE_URL")
                .filter(|u| !u.trim().is_empty())
                .unwrap_or(defaults.base_url),
            api_key,
            timeout_secs: crate::parse_var(&lookup, "PROVIDER_TIMEOUT_SECS")?
                .unwrap_or(defaults.timeout_secs),
        })
    }
}

// -- Wire types --------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    r#type: &'static str,
    function: WireFunction<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(default = "function_type")]
    r#type: String,
    function: WireFunctionCall,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

// -- Provider ----------------------------------------------------------------

/// OpenAI-compatible chat provider
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    /// Create from configuration
    pub fn from_config(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Convert agent messages to the chat wire format
    fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|m| match m.role {
                Role::System => WireMessage::text("system", &m.content),
                Role::User => WireMessage::text("user", &m.content),
                Role::Assistant => WireMessage {
                    role: "assistant",
                    content: (!m.content.is_empty() || m.tool_calls.is_empty())
                        .then(|| m.content.clone()),
                    tool_calls: m.tool_calls.iter().map(WireToolCall::from_call).collect(),
                    tool_call_id: None,
                },
                // A tool result needs the id of the call it answers.
                Role::Tool => match &m.tool_call_id {
                    Some(id) => WireMessage {
                        role: "tool",
                        content: Some(m.content.clone()),
                        tool_calls: Vec::new(),
                        tool_call_id: Some(id.clone()),
                    },
                    None => WireMessage::text("user", &format!("Tool result: {}", m.content)),
                },
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolSchema]) -> Vec<WireTool<'_>> {
        tools
            .iter()
            .map(|t| WireTool {
                r#type: "function",
                function: WireFunction {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters,
                },
            })
            .collect()
    }

    /// Convert a chat response to an agent completion
    fn convert_completion(response: ChatResponse, requested_model: &str) -> Result<Completion> {
        let model = response.model.unwrap_or_else(|| requested_model.to_string());
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Provider("openai returned no choices".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(WireToolCall::into_call)
            .collect();

        let mut response_metadata = Map::new();
        response_metadata.insert("model_name".into(), json!(model));
        if let Some(usage) = response.usage {
            response_metadata.insert("token_usage".into(), usage);
        }
        if let Some(reason) = choice.finish_reason {
            response_metadata.insert("finish_reason".into(), json!(reason));
        }

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            metadata: MessageMetadata {
                response_metadata: Some(response_metadata),
                ..Default::default()
            },
        })
    }
}

impl WireMessage {
    fn text(role: &'static str, content: &str) -> Self {
        Self {
            role,
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

impl WireToolCall {
    fn from_call(call: &ToolCall) -> Self {
        let arguments = match &call.args {
            Value::String(raw) => raw.clone(),
            other => other.to_string(),
        };
        Self {
            id: call.id.clone(),
            r#type: function_type(),
            function: WireFunctionCall {
                name: call.name.clone(),
                arguments,
            },
        }
    }

    fn into_call(self) -> ToolCall {
        // Invalid JSON arguments are passed through as text.
        let args = serde_json::from_str(&self.function.arguments)
            .unwrap_or(Value::String(self.function.arguments));
        let call = ToolCall::new(self.function.name, args);
        match self.id {
            Some(id) => call.with_id(id),
            None => call,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.url("models"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await;

        match response {
            Ok(r) if r.status().is_success() => Ok(true),
            Ok(r) => {
                tracing::warn!(status = %r.status(), "OpenAI health check failed");
                Ok(false)
            }
            Err(e) => {
                tracing::warn!("OpenAI health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let request = ChatRequest {
            model: &options.model,
            messages: Self::convert_messages(messages),
            tools: Self::convert_tools(tools),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        tracing::debug!(model = %options.model, messages = messages.len(), tools = tools.len(), "Chat completion request");

        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| errors::from_send("openai", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(errors::from_status("openai", status, &body));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("openai: malformed response: {e}")))?;

        Self::convert_completion(body, &options.model)
    }
}
