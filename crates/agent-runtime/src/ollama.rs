//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` for local Ollama inference through
//! `ollama-rs`, non-streaming.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, MessageMetadata, Role},
    provider::{Completion, GenerationOptions, LlmProvider},
    tool::{ToolCall, ToolSchema},
};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    error::OllamaError,
    generation::{
        chat::{ChatMessage, ChatMessageResponse, MessageRole, request::ChatMessageRequest},
        tools::{ToolCall as OllamaToolCall, ToolCallFunction, ToolInfo},
    },
    models::ModelOptions,
};
use reqwest::{Client, Url};
use serde_json::{Map, json};

use crate::errors;

/// Ollama provider configuration
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Pass tool schemas natively; models without tool support get them
    /// described in the system prompt instead
    pub native_tools: bool,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
            timeout_secs: 120,
            native_tools: true,
        }
    }
}

impl OllamaConfig {
    /// Read `OLLAMA_HOST`, `OLLAMA_PORT`, `OLLAMA_NATIVE_TOOLS` and `PROVIDER_TIMEOUT_SECS`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            host: lookup("OLLAMA_HOST")
                .map(|h| h.trim().trim_end_matches('/').to_string())
                .filter(|h| !h.is_empty())
                .unwrap_or(defaults.host),
            port: crate::parse_var(&lookup, "OLLAMA_PORT")?.unwrap_or(defaults.port),
            timeout_secs: crate::parse_var(&lookup, "PROVIDER_TIMEOUT_SECS")?
                .unwrap_or(defaults.timeout_secs),
            native_tools: crate::parse_var(&lookup, "OLLAMA_NATIVE_TOOLS")?
                .unwrap_or(defaults.native_tools),
        };
        Url::parse(&config.host)
            .map_err(|e| AgentError::Config(format!("OLLAMA_HOST '{}' is not a URL: {e}", config.host)))?;
        Ok(config)
    }
}

/// Ollama LLM provider
pub struct OllamaProvider {
    client: Ollama,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create from configuration
    pub fn from_config(config: OllamaConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client: Ollama::new_with_client(config.host.as_str(), config.port, http),
            config,
        })
    }

    /// Convert agent messages to Ollama format
    fn convert_messages(messages: &[Message]) -> Vec<ChatMessage> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => MessageRole::System,
                    Role::User => MessageRole::User,
                    Role::Assistant => MessageRole::Assistant,
                    Role::Tool => MessageRole::Tool,
                };
                let mut message = ChatMessage::new(role, m.content.clone());
                message.tool_calls = m
                    .tool_calls
                    .iter()
                    .map(|c| OllamaToolCall {
                        function: ToolCallFunction {
                            name: c.name.clone(),
                            arguments: c.args.clone(),
                        },
                    })
                    .collect();
                message
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolSchema]) -> Result<Vec<ToolInfo>> {
        tools
            .iter()
            .map(|t| {
                serde_json::from_value(json!({
                    "type": "Function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                }))
                .map_err(|e| AgentError::Provider(format!("ollama: tool '{}' has an unusable schema: {e}", t.name)))
            })
            .collect()
    }

    /// Build Ollama generation options
    fn build_options(opts: &GenerationOptions) -> ModelOptions {
        let options = ModelOptions::default().temperature(opts.temperature);
        match opts.max_tokens {
            Some(max) => options.num_predict(i32::try_from(max).unwrap_or(i32::MAX)),
            None => options,
        }
    }

    /// Convert Ollama response to agent completion
    fn convert_completion(response: ChatMessageResponse) -> Completion {
        let mut response_metadata = Map::new();
        response_metadata.insert("model".into(), json!(response.model));

        let usage_metadata = response.final_data.as_ref().map(|data| {
            let input = u64::from(data.prompt_eval_count);
            let output = u64::from(data.eval_count);
            let mut usage = Map::new();
            usage.insert("input_tokens".into(), json!(input));
            usage.insert("output_tokens".into(), json!(output));
            usage.insert("total_tokens".into(), json!(input.saturating_add(output)));
            usage
        });

        let tool_calls = response
            .message
            .tool_calls
            .into_iter()
            .map(|c| ToolCall::new(c.function.name, c.function.arguments))
            .collect();

        Completion {
            content: response.message.content,
            tool_calls,
            metadata: MessageMetadata {
                response_metadata: Some(response_metadata),
                usage_metadata,
                ..Default::default()
            },
        }
    }
}

/// Transport failures keep their connect/timeout classification
fn from_ollama(err: &OllamaError) -> AgentError {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if let Some(http) = e.downcast_ref::<reqwest::Error>() {
            return errors::from_send("ollama", http);
        }
        source = e.source();
    }
    AgentError::Provider(format!("ollama: {err}"))
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }

    fn supports_tools(&self) -> bool {
        self.config.native_tools
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let mut request = ChatMessageRequest::new(options.model.clone(), Self::convert_messages(messages))
            .options(Self::build_options(options));
        if self.config.native_tools && !tools.is_empty() {
            request = request.tools(Self::convert_tools(tools)?);
        }

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| from_ollama(&e))?;

        Ok(Self::convert_completion(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = OllamaConfig::default();
        assert_eq!(config.host, "http://localhost");
        assert_eq!(config.port, 11434);
        assert!(config.native_tools);
    }

    #[test]
    fn test_config_from_lookup() {
        let config = OllamaConfig::from_lookup(|key| match key {
            "OLLAMA_HOST" => Some("http://gpu-box/".into()),
            "OLLAMA_NATIVE_TOOLS" => Some("false".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.host, "http://gpu-box");
        assert!(!config.native_tools);

        let err = OllamaConfig::from_lookup(|key| (key == "OLLAMA_PORT").then(|| "eleven".into()));
        assert!(matches!(err, Err(AgentError::Config(_))));

        let err = OllamaConfig::from_lookup(|key| (key == "OLLAMA_HOST").then(|| "not a url".into()));
        assert!(matches!(err, Err(AgentError::Config(_))));
    }

    #[test]
    fn test_message_conversion() {
        let messages = vec![
            Message::system("You are helpful."),
            Message::user("Hello"),
            Message::assistant("").with_tool_calls(vec![ToolCall::new("lookup_order", json!({"order_id": "42"}))]),
            Message::tool("shipped", Some("c1".into())),
        ];

        let converted = OllamaProvider::convert_messages(&messages);
        assert_eq!(converted.len(), 4);
        assert_eq!(converted[2].tool_calls[0].function.name, "lookup_order");
        assert_eq!(converted[2].tool_calls[0].function.arguments["order_id"], "42");
        assert!(matches!(converted[3].role, MessageRole::Tool));
    }

    #[test]
    fn test_tool_conversion() {
        let tools = vec![ToolSchema {
            name: "lookup_order".into(),
            description: "Look up an order".into(),
            parameters: json!({
                "type": "object",
                "properties": {"input_data": {"type": "string"}},
                "required": ["input_data"]
            }),
        }];
        let converted = OllamaProvider::convert_tools(&tools).unwrap();
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].function.name, "lookup_order");
    }

    #[test]
    fn test_response_conversion() {
        let response: ChatMessageResponse = serde_json::from_value(json!({
            "model": "llama3.2",
            "created_at": "2024-07-22T20:33:28.123648Z",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{"function": {"name": "lookup_order", "arguments": {"order_id": "42"}}}]
            },
            "done": true,
            "done_reason": "stop",
            "total_duration": 885_095_291_u64,
            "load_duration": 3_753_500,
            "prompt_eval_count": 30,
            "prompt_eval_duration": 25_000_000,
            "eval_count": 12,
            "eval_duration": 70_000_000
        }))
        .unwrap();

        let completion = OllamaProvider::convert_completion(response);
        assert_eq!(completion.tool_calls[0].name, "lookup_order");
        assert_eq!(completion.tool_calls[0].args["order_id"], "42");
        let usage = completion.metadata.usage_metadata.unwrap();
        assert_eq!(usage["total_tokens"], 42);
        assert_eq!(completion.metadata.response_metadata.unwrap()["model"], "llama3.2");
    }
}
