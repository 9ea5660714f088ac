//! Tool Adapter
//!
//! Converts validated descriptors into the tools a reasoning run can invoke.

use std::sync::Arc;
use std::time::Duration;

use agent_core::{Tool, ToolRegistry};
use reqwest::Client;

use crate::descriptor::ToolDescriptor;
use crate::feedback::FeedbackSink;
use crate::function::FunctionToolInvoker;
use crate::http::HttpToolInvoker;

/// Default bound on a single tool call
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds per-request tool registries.
///
/// Holds the shared HTTP client and the optional feedback sink; adapting
/// descriptors performs no I/O.
#[derive(Clone)]
pub struct ToolAdapter {
    client: Client,
    timeout: Duration,
    sink: Option<Arc<dyn FeedbackSink>>,
}

impl ToolAdapter {
    pub const fn new(client: Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            sink: None,
        }
    }

    #[must_use]
    pub fn with_feedback_sink(mut self, sink: Arc<dyn FeedbackSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    pub const fn has_feedback_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Adapt one descriptor
    pub fn adapt_one(&self, descriptor: &ToolDescriptor) -> Arc<dyn Tool> {
        match descriptor {
            ToolDescriptor::Http(tool) => Arc::new(HttpToolInvoker::new(
                tool.clone(),
                self.client.clone(),
                self.timeout,
            )),
            ToolDescriptor::Function(tool) => {
                Arc::new(FunctionToolInvoker::new(tool.clone(), self.sink.clone()))
            }
        }
    }

    /// Adapt a request's descriptors, in order.
    ///
    /// Fails with a validation error if two descriptors share a name.
    pub fn adapt(&self, descriptors: &[ToolDescriptor]) -> agent_core::Result<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        for descriptor in descriptors {
            registry.register_shared(self.adapt_one(descriptor))?;
        }
        tracing::debug!(tools = ?registry.names(), "Adapted request tools");
        Ok(registry)
    }
}

impl Default for ToolAdapter {
    fn default() -> Self {
        Self::new(Client::new(), DEFAULT_TOOL_TIMEOUT)
    }
}
