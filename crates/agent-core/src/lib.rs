//! # agent-core
//!
//! Core agent logic: a provider-agnostic reasoning loop over a per-request
//! tool set, with conversation memory partitioned by thread.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        AgentSession                          │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐   │
//! │  │  Reasoning  │  │    Tools    │  │   LlmProvider       │   │
//! │  │    Loop     │──│   Registry  │──│   (Strategy)        │   │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘   │
//! │         │                                                    │
//! │  ┌─────────────────────┐        ┌──────────────────────┐     │
//! │  │ ConversationStore   │──trace─│  trace::extract      │     │
//! │  │ (keyed by thread)   │        │  (usage, model, ...) │     │
//! │  └─────────────────────┘        └──────────────────────┘     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between OpenAI, Ollama,
//! or any other provider without changing agent logic.

pub mod provider;
pub mod tool;
pub mod reasoning;
pub mod message;
pub mod error;
pub mod memory;
pub mod session;
pub mod trace;

pub use error::{AgentError, Result};
pub use memory::{ConversationStore, InMemoryConversationStore, ThreadId};
pub use message::{Conversation, Message, Role};
pub use provider::{Completion, GenerationOptions, LlmProvider, TokenUsage};
pub use reasoning::{Agent, AgentConfig};
pub use session::{AgentSession, SessionConfig};
pub use tool::{ExecutionOutcome, Tool, ToolCall, ToolRegistry, ToolSchema};
pub use trace::{AgentResult, ToolCallRecord};
