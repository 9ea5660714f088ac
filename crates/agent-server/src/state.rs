//! Application State

use std::sync::Arc;

use agent_core::trace::CostRates;
use agent_core::{AgentSession, ConversationStore, LlmProvider, SessionConfig};
use agent_tools::ToolAdapter;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Reasoning capability plus thread-keyed memory
    pub session: AgentSession,

    /// Builds each request's tools from its descriptors
    pub adapter: ToolAdapter,

    /// Pricing for `estimated_cost` (None if not configured)
    pub cost_rates: Option<CostRates>,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        memory: Arc<dyn ConversationStore>,
        adapter: ToolAdapter,
        config: SessionConfig,
    ) -> Self {
        Self {
            session: AgentSession::new(provider, memory, config),
            adapter,
            cost_rates: None,
        }
    }

    #[must_use]
    pub fn with_cost_rates(mut self, rates: Option<CostRates>) -> Self {
        self.cost_rates = rates;
        self
    }
}
