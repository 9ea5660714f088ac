//! # agent-runtime
//!
//! Reasoning capabilities for the dynamic-agent system.
//!
//! ## Providers
//!
//! - **OpenAI** (default): any OpenAI-compatible `/chat/completions` API
//! - **Ollama**: local inference via `ollama-rs`
//!
//! Both pass tool schemas natively and report usage in the metadata layout
//! the trace extractor understands.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::{OpenAiConfig, OpenAiProvider};
//!
//! let provider = OpenAiProvider::from_config(OpenAiConfig::from_lookup(|k| std::env::var(k).ok())?)?;
//! let session = AgentSession::new(Arc::new(provider), memory, SessionConfig::default());
//! ```

mod errors;
pub mod ollama;
pub mod openai;

pub use ollama::{OllamaConfig, OllamaProvider};
pub use openai::{OpenAiConfig, OpenAiProvider};

// Re-export core types for convenience
pub use agent_core::{AgentError, GenerationOptions, LlmProvider, Message, Result, Role};

/// Parse an optional variable, reporting malformed values as configuration errors
pub(crate) fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| AgentError::Config(format!("{key} has an invalid value '{v}'")))
        })
        .transpose()
}
