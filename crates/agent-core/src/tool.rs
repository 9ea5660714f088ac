//! Tool System
//!
//! Uniform contract for callables the reasoning loop may invoke.
//! Tools are registered per request and invoked by the reasoning loop.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call ID for pairing with the tool result message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Tool identifier
    #[serde(alias = "tool")]
    pub name: String,

    /// Arguments exactly as the model produced them
    #[serde(alias = "arguments", default = "empty_object")]
    pub args: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            args,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Outcome of one tool invocation.
///
/// Exactly one of `response` / `error` is set, matching `success`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,

    pub tool_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn success(tool_name: impl Into<String>, response: impl Into<Value>) -> Self {
        Self {
            success: true,
            tool_name: tool_name.into(),
            response: Some(response.into()),
            error: None,
        }
    }

    pub fn failure(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            tool_name: tool_name.into(),
            response: None,
            error: Some(error.into()),
        }
    }

    /// String form handed back to the reasoning loop as the tool result
    pub fn render(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| match (&self.response, &self.error) {
            (_, Some(err)) => format!("Error: {err}"),
            (Some(resp), None) => resp.to_string(),
            (None, None) => String::new(),
        })
    }
}

impl From<(String, AgentError)> for ExecutionOutcome {
    fn from((tool_name, err): (String, AgentError)) -> Self {
        Self::failure(tool_name, err.to_string())
    }
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// JSON Schema object describing the single input
    pub parameters: Value,
}

/// Tool trait - implement to add new capabilities
///
/// `invoke` must never fail: transport or parse problems become an
/// unsuccessful [`ExecutionOutcome`]. Implementations may be invoked
/// concurrently and should hold no mutable state across calls.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Execute with an opaque payload (JSON text or a structured value)
    async fn invoke(&self, payload: Value) -> ExecutionOutcome;

    /// Execute and render the outcome as the string the model sees
    async fn call(&self, payload: Value) -> String {
        self.invoke(payload).await.render()
    }
}

/// Ordered registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_shared(Arc::new(tool))
    }

    /// Register a shared tool; names must be unique
    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.schema().name;
        if self.get(&name).is_some() {
            return Err(AgentError::Validation(format!("duplicate tool name '{name}'")));
        }
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.schema().name == name).cloned()
    }

    /// Execute a tool call; unknown tools yield a failed outcome
    pub async fn execute(&self, call: &ToolCall) -> ExecutionOutcome {
        let Some(tool) = self.get(&call.name) else {
            tracing::warn!(tool = %call.name, "Model requested unknown tool");
            return (call.name.clone(), AgentError::ToolNotFound(call.name.clone())).into();
        };

        let outcome = tool.invoke(call.args.clone()).await;
        if outcome.success {
            tracing::debug!(tool = %call.name, "Tool succeeded");
        } else {
            tracing::warn!(tool = %call.name, error = ?outcome.error, "Tool failed");
        }
        outcome
    }

    /// Get all tool schemas, in registration order
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.schema().name).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// System prompt section for providers without native tool calling
    pub fn generate_prompt_section(&self) -> String {
        use std::fmt::Write;

        let mut prompt = String::from("## Available Tools\n\n");
        prompt.push_str("You can use the following tools by responding with a JSON block:\n\n");
        prompt.push_str("```tool\n{\"tool\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}\n```\n\n");

        for schema in self.schemas() {
            let _ = writeln!(prompt, "### {}", schema.name);
            let _ = writeln!(prompt, "{}", schema.description);
            if let Some(props) = schema.parameters.get("properties").and_then(Value::as_object) {
                if !props.is_empty() {
                    prompt.push_str("**Parameters:**\n");
                    for (name, prop) in props {
                        let ty = prop.get("type").and_then(Value::as_str).unwrap_or("any");
                        let _ = writeln!(prompt, "- `{name}` ({ty})");
                    }
                }
            }
            prompt.push('\n');
        }

        prompt
    }
}
