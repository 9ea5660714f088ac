//! dynamic-agent HTTP Server
//!
//! Axum-based server exposing the dynamic tool-adaptation agent.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{ConversationStore, InMemoryConversationStore, LlmProvider};
use agent_runtime::{OllamaProvider, OpenAiProvider};
use agent_server::{AppState, ProviderSettings, ServerConfig};
use agent_tools::{HttpFeedbackSink, ToolAdapter};

/// Upper bound on how often idle threads are swept
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    // Initialize LLM provider
    let provider: Arc<dyn LlmProvider> = match config.provider.clone() {
        ProviderSettings::OpenAi(settings) => Arc::new(OpenAiProvider::from_config(settings)?),
        ProviderSettings::Ollama(settings) => Arc::new(OllamaProvider::from_config(settings)?),
    };

    match provider.health_check().await {
        Ok(true) => tracing::info!(provider = provider.name(), "✓ Reasoning provider reachable"),
        Ok(false) | Err(_) => {
            tracing::warn!(provider = provider.name(), "⚠ Reasoning provider not available - requests will fail");
        }
    }
    tracing::info!(
        model = %config.session.generation.model,
        temperature = config.session.generation.temperature,
        max_iterations = config.session.max_iterations,
        "Agent configured"
    );

    // Conversation memory
    let memory = Arc::new(InMemoryConversationStore::new().with_max_messages(config.memory_max_messages));
    if let Some(ttl) = config.memory_idle_ttl {
        let memory = memory.clone();
        let every = ttl.min(MAX_SWEEP_INTERVAL);
        tracing::info!(idle_ttl_secs = ttl.as_secs(), "Idle thread eviction enabled");
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                memory.evict_idle(ttl).await;
            }
        });
    }

    // Tool adaptation
    let client = reqwest::Client::new();
    let mut adapter = ToolAdapter::new(client.clone(), config.tool_timeout);
    if let Some(base) = &config.backend_url {
        adapter = adapter.with_feedback_sink(Arc::new(HttpFeedbackSink::new(client, base, config.tool_timeout)?));
        tracing::info!(backend = %base, "✓ Feedback backend configured");
    } else {
        tracing::info!("Feedback backend not configured - feedback tools acknowledge only");
    }

    let state = AppState::new(provider, memory, adapter, config.session.clone())
        .with_cost_rates(config.cost_rates);
    let app = agent_server::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("🚀 dynamic-agent server running on http://{}", config.bind_addr);
    tracing::info!("  GET  /health         - Health check");
    tracing::info!("  POST /agent/process  - Run one agent turn");

    axum::serve(listener, app).await?;

    Ok(())
}
