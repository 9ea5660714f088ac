//! Agent Session
//!
//! Builds one reasoning agent per request from a shared provider, the
//! request's adapted tools and the thread's memory slot, and runs a single
//! reasoning-and-acting cycle.

use std::sync::Arc;

use crate::error::Result;
use crate::memory::{ConversationStore, ThreadId};
use crate::message::Message;
use crate::provider::{GenerationOptions, LlmProvider};
use crate::reasoning::{Agent, AgentConfig};
use crate::tool::ToolRegistry;
use crate::trace::{self, AgentResult};

/// Per-process session settings
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Model identity and temperature for every run
    pub generation: GenerationOptions,

    /// Maximum reasoning iterations per run
    pub max_iterations: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            generation: GenerationOptions::default(),
            max_iterations: AgentConfig::default().max_iterations,
        }
    }
}

/// Runs reasoning cycles against thread-keyed memory
#[derive(Clone)]
pub struct AgentSession {
    provider: Arc<dyn LlmProvider>,
    memory: Arc<dyn ConversationStore>,
    config: SessionConfig,
}

impl AgentSession {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        memory: Arc<dyn ConversationStore>,
        config: SessionConfig,
    ) -> Self {
        Self {
            provider,
            memory,
            config,
        }
    }

    /// Run one cycle on `thread_id`.
    ///
    /// Appends a system message carrying `context` and a user message to
    /// the thread, then lets the agent reason until it answers. The thread
    /// stays locked for the whole run. If the provider fails or the run is
    /// cancelled, the thread is restored to its state before the run.
    ///
    /// The returned trace is the thread's full accumulated history.
    pub async fn run(
        &self,
        context: &str,
        user_message: &str,
        thread_id: &ThreadId,
        tools: ToolRegistry,
    ) -> Result<AgentResult> {
        let agent = Agent::new(
            self.provider.clone(),
            Arc::new(tools),
            AgentConfig {
                max_iterations: self.config.max_iterations,
                generation: self.config.generation.clone(),
                inject_tool_descriptions: !self.provider.supports_tools(),
            },
        );

        let mut thread = self.memory.checkout(thread_id).await?;
        tracing::debug!(
            thread_id = %thread_id,
            history = thread.base_len(),
            tools = agent.tools().len(),
            "Thread checked out"
        );

        thread.push(Message::system(context));
        thread.push(Message::user(user_message));

        if let Err(e) = agent.run(&mut thread).await {
            tracing::error!(thread_id = %thread_id, error = %e, "Reasoning run failed");
            thread.rollback();
            return Err(e);
        }

        let raw = trace::trace_from_messages(thread.messages());
        thread.commit();

        Ok(trace::extract(&raw?))
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    pub fn memory(&self) -> &Arc<dyn ConversationStore> {
        &self.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::memory::InMemoryConversationStore;
    use crate::message::{MessageMetadata, Role};
    use crate::provider::Completion;
    use crate::tool::{ExecutionOutcome, Tool, ToolCall, ToolSchema};
    use async_trait::async_trait;
    use serde_json::{Map, Value, json};
    use std::time::Duration;

    /// Answers with the number of messages it was sent.
    struct Counting {
        fail: bool,
    }

    #[async_trait]
    impl LlmProvider for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(!self.fail)
        }

        async fn complete(
            &self,
            messages: &[Message],
            _tools: &[ToolSchema],
            options: &GenerationOptions,
        ) -> Result<Completion> {
            if self.fail {
                return Err(AgentError::ProviderUnavailable("connection refused".into()));
            }
            let mut rm = Map::new();
            rm.insert("model_name".into(), json!(options.model));
            rm.insert(
                "token_usage".into(),
                json!({"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}),
            );
            Ok(Completion {
                content: format!("seen {}", messages.len()),
                tool_calls: Vec::new(),
                metadata: MessageMetadata {
                    response_metadata: Some(rm),
                    ..Default::default()
                },
            })
        }
    }

    fn session(fail: bool) -> AgentSession {
        AgentSession::new(
            Arc::new(Counting { fail }),
            Arc::new(InMemoryConversationStore::new()),
            SessionConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_first_turn() {
        let session = session(false);
        let thread = ThreadId::parse("default_thread").unwrap();

        let result = session
            .run("You are a helpful assistant.", "Hello, how can I assist you today?", &thread, ToolRegistry::new())
            .await
            .unwrap();

        assert_eq!(result.final_message.as_deref(), Some("seen 2"));
        assert_eq!(result.message_count, 3);
        assert!(result.tool_calls.is_empty());
        assert_eq!(result.model_name.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(result.token_usage.unwrap().total_tokens, 12);
    }

    #[tokio::test]
    async fn test_history_accumulates_per_thread() {
        let session = session(false);
        let a = ThreadId::parse("a").unwrap();
        let b = ThreadId::parse("b").unwrap();

        session.run("ctx", "one", &a, ToolRegistry::new()).await.unwrap();
        let second = session.run("ctx", "two", &a, ToolRegistry::new()).await.unwrap();
        let other = session.run("ctx", "three", &b, ToolRegistry::new()).await.unwrap();

        assert_eq!(second.message_count, 6);
        assert_eq!(second.final_message.as_deref(), Some("seen 5"));
        assert_eq!(other.message_count, 3);

        let roles: Vec<Role> = session.memory().get(&a).await.unwrap().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![
            Role::System, Role::User, Role::Assistant,
            Role::System, Role::User, Role::Assistant,
        ]);
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_thread_untouched() {
        let session = session(true);
        let thread = ThreadId::parse("t").unwrap();

        let err = session.run("ctx", "hi", &thread, ToolRegistry::new()).await.unwrap_err();
        assert!(err.is_reasoning_failure());
        assert!(session.memory().get(&thread).await.unwrap().is_empty());
    }

    /// Always asks for the `slow` tool.
    struct CallsSlowTool;

    #[async_trait]
    impl LlmProvider for CallsSlowTool {
        fn name(&self) -> &str {
            "calls-slow-tool"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _tools: &[ToolSchema],
            _options: &GenerationOptions,
        ) -> Result<Completion> {
            Ok(Completion::with_tool_calls(vec![ToolCall::new("slow", json!({})).with_id("call_1")]))
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "slow".into(),
                description: "Takes a while".into(),
                parameters: json!({"type": "object"}),
            }
        }

        async fn invoke(&self, _payload: Value) -> ExecutionOutcome {
            tokio::time::sleep(Duration::from_secs(5)).await;
            ExecutionOutcome::success("slow", "done")
        }
    }

    #[tokio::test]
    async fn test_cancelled_run_leaves_thread_untouched() {
        let session = AgentSession::new(
            Arc::new(CallsSlowTool),
            Arc::new(InMemoryConversationStore::new()),
            SessionConfig::default(),
        );
        let thread = ThreadId::parse("t").unwrap();
        let mut tools = ToolRegistry::new();
        tools.register(SlowTool).unwrap();

        let run = session.run("ctx", "hi", &thread, tools);
        assert!(tokio::time::timeout(Duration::from_millis(100), run).await.is_err());

        assert!(session.memory().get(&thread).await.unwrap().is_empty());
    }
}
