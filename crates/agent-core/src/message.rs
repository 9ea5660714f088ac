//! Conversation Messages
//!
//! Standard message format used across the agent system. A thread's
//! messages, serialized, are the raw execution trace handed to
//! [`crate::trace::extract`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tool::ToolCall;

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result (injected as context)
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text content
    pub content: String,

    /// Tool name (for tool messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Tool calls requested by the assistant in this turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Call this tool message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Provider metadata, kept in the provider's own key layout
    #[serde(flatten)]
    pub metadata: MessageMetadata,
}

/// Provider-reported metadata attached to assistant messages.
///
/// Providers disagree on key names (`token_usage` vs `usage_metadata`,
/// `model_name` vs `model`), so values are stored as-is and normalized
/// later by the trace extractor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_metadata: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<Map<String, Value>>,

    /// Custom key-value pairs
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl MessageMetadata {
    pub fn is_empty(&self) -> bool {
        self.response_metadata.is_none() && self.usage_metadata.is_none() && self.extra.is_empty()
    }
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            timestamp: Utc::now(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            metadata: MessageMetadata::default(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a tool result message
    pub fn tool(content: impl Into<String>, tool_call_id: Option<String>) -> Self {
        let mut msg = Self::new(Role::Tool, content);
        msg.tool_call_id = tool_call_id;
        msg
    }

    /// Add a name to the message
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Conversation history with utility methods
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Drop everything after the first `len` messages
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    /// Keep at most `max` messages, dropping the oldest first.
    ///
    /// A tool message is never left at the front without the assistant
    /// turn that requested it.
    pub fn retain_recent(&mut self, max: usize) {
        if self.messages.len() <= max {
            return;
        }
        let mut start = self.messages.len() - max;
        while start < self.messages.len() && self.messages[start].role == Role::Tool {
            start += 1;
        }
        self.messages.drain(..start);
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert!(msg.metadata.is_empty());
    }

    #[test]
    fn test_conversation() {
        let mut conv = Conversation::new();
        conv.push(Message::system("You are helpful."));
        conv.push(Message::user("Hi"));
        conv.push(Message::assistant("Hello!"));

        assert_eq!(conv.len(), 3);
        assert_eq!(conv.messages()[2].role, Role::Assistant);
    }

    #[test]
    fn test_metadata_is_flattened() {
        let mut meta = MessageMetadata::default();
        let mut rm = Map::new();
        rm.insert("model_name".into(), json!("gpt-4o-mini"));
        meta.response_metadata = Some(rm);

        let value = serde_json::to_value(Message::assistant("ok").with_metadata(meta)).unwrap();
        assert_eq!(value["response_metadata"]["model_name"], "gpt-4o-mini");
        assert!(value.get("usage_metadata").is_none());
        assert!(value.get("tool_calls").is_none());
    }

    #[test]
    fn test_retain_recent_skips_orphaned_tool_messages() {
        let mut conv = Conversation::new();
        conv.push(Message::user("q"));
        conv.push(Message::assistant("").with_tool_calls(vec![ToolCall::new("lookup", json!({}))]));
        conv.push(Message::tool("{}", Some("1".into())));
        conv.push(Message::assistant("done"));

        conv.retain_recent(2);
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].content, "done");
    }
}
