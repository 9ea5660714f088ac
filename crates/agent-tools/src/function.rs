//! Function Tool Invoker
//!
//! Dispatches a [`FunctionTool`] by name. Known names map to a [`Builtin`]
//! that synthesizes an acknowledgment from its arguments (and records it
//! through the feedback sink when one is configured). Unknown names echo
//! their arguments back so the call is never silently dropped.

use std::sync::Arc;

use agent_core::{ExecutionOutcome, Tool, ToolSchema};
use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::descriptor::FunctionTool;
use crate::feedback::FeedbackSink;
use crate::payload;

/// Behaviors available to function tools by name
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    SubmitFeedback,
    RequestFeedback,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "submit_feedback" => Some(Self::SubmitFeedback),
            "request_feedback" => Some(Self::RequestFeedback),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::SubmitFeedback => "submit_feedback",
            Self::RequestFeedback => "request_feedback",
        }
    }

    /// Path on the application backend, relative to its base URL
    pub const fn backend_path(self) -> &'static str {
        match self {
            Self::SubmitFeedback => "api/feedback/submit",
            Self::RequestFeedback => "api/feedback/request",
        }
    }

    /// Acknowledgment built from the call's arguments
    pub fn acknowledge(self, args: &Value) -> String {
        match self {
            Self::SubmitFeedback => format!(
                "Feedback submitted: rating {}, feedback \"{}\"",
                field(args, "rating"),
                field(args, "feedback_text"),
            ),
            Self::RequestFeedback => format!("Feedback requested with {args}"),
        }
    }
}

fn field(args: &Value, key: &str) -> String {
    match args.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "unspecified".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Invokable form of a [`FunctionTool`]
#[derive(Clone)]
pub struct FunctionToolInvoker {
    tool: FunctionTool,
    builtin: Option<Builtin>,
    sink: Option<Arc<dyn FeedbackSink>>,
}

impl FunctionToolInvoker {
    pub fn new(tool: FunctionTool, sink: Option<Arc<dyn FeedbackSink>>) -> Self {
        Self {
            builtin: Builtin::from_name(&tool.name),
            tool,
            sink,
        }
    }

}

/// Function arguments: JSON when possible, otherwise the raw text as `input`
fn arguments(payload: Value) -> Value {
    match payload {
        Value::String(text) => payload::decode(Value::String(text.clone()))
            .unwrap_or_else(|_| json!({ "input": text })),
        other => payload::decode(other).unwrap_or_else(|_| Value::Object(Map::new())),
    }
}

/// JSON schema for a declared parameter shape
fn parameter_schema(shape: &Value) -> Value {
    match shape {
        Value::Object(_) => shape.clone(),
        Value::String(ty) => {
            let ty = match ty.trim().to_ascii_lowercase().as_str() {
                "int" | "integer" => "integer",
                "float" | "number" => "number",
                "bool" | "boolean" => "boolean",
                "dict" | "object" => "object",
                "list" | "array" => "array",
                "str" | "string" => "string",
                _ => return json!({"type": "string", "description": ty}),
            };
            json!({ "type": ty })
        }
        _ => json!({}),
    }
}

#[async_trait]
impl Tool for FunctionToolInvoker {
    fn schema(&self) -> ToolSchema {
        let properties: Map<String, Value> = self
            .tool
            .parameters
            .iter()
            .map(|(name, shape)| (name.clone(), parameter_schema(shape)))
            .collect();

        ToolSchema {
            name: self.tool.name.clone(),
            description: self.tool.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": properties,
            }),
        }
    }

    async fn invoke(&self, payload: Value) -> ExecutionOutcome {
        let name = &self.tool.name;
        let args = arguments(payload);

        let Some(builtin) = self.builtin else {
            tracing::info!(tool = %name, "Function tool has no built-in behavior, echoing");
            return ExecutionOutcome::success(
                name,
                format!("Function '{name}' is not implemented; received arguments: {args}"),
            );
        };

        let ack = builtin.acknowledge(&args);
        let Some(sink) = &self.sink else {
            return ExecutionOutcome::success(name, ack);
        };

        match sink.record(builtin, &args).await {
            Ok(message) => ExecutionOutcome::success(name, format!("{ack}. Backend: {message}")),
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "Feedback backend call failed");
                ExecutionOutcome::failure(name, e.to_string())
            }
        }
    }
}
