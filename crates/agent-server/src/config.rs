//! Server Configuration
//!
//! Read once at startup from the environment (after `.env` is loaded).

use std::str::FromStr;
use std::time::Duration;

use agent_core::trace::CostRates;
use agent_core::{AgentError, GenerationOptions, Result, SessionConfig};
use agent_runtime::{OllamaConfig, OpenAiConfig};
use agent_tools::adapter::DEFAULT_TOOL_TIMEOUT;

/// Model used with Ollama when `AGENT_MODEL` is unset
const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

/// Which reasoning capability backs the agent
#[derive(Clone, Debug)]
pub enum ProviderSettings {
    OpenAi(OpenAiConfig),
    Ollama(OllamaConfig),
}

impl ProviderSettings {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OpenAi(_) => "openai",
            Self::Ollama(_) => "ollama",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub provider: ProviderSettings,
    pub session: SessionConfig,
    pub tool_timeout: Duration,

    /// Application backend for feedback side effects
    pub backend_url: Option<String>,

    pub memory_idle_ttl: Option<Duration>,
    pub memory_max_messages: Option<usize>,
    pub cost_rates: Option<CostRates>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match text("LLM_PROVIDER").as_deref().map(str::trim) {
            None | Some("openai") => ProviderSettings::OpenAi(OpenAiConfig::from_lookup(&lookup)?),
            Some("ollama") => ProviderSettings::Ollama(OllamaConfig::from_lookup(&lookup)?),
            Some(other) => {
                return Err(AgentError::Config(format!(
                    "LLM_PROVIDER must be 'openai' or 'ollama', got '{other}'"
                )));
            }
        };

        let defaults = SessionConfig::default();
        let model = text("AGENT_MODEL").unwrap_or_else(|| match provider {
            ProviderSettings::OpenAi(_) => defaults.generation.model.clone(),
            ProviderSettings::Ollama(_) => DEFAULT_OLLAMA_MODEL.into(),
        });
        let session = SessionConfig {
            generation: GenerationOptions {
                model,
                temperature: parse(&lookup, "AGENT_TEMPERATURE")?
                    .unwrap_or(defaults.generation.temperature),
                max_tokens: parse(&lookup, "AGENT_MAX_TOKENS")?,
            },
            max_iterations: parse(&lookup, "AGENT_MAX_ITERATIONS")?
                .unwrap_or(defaults.max_iterations),
        };
        if session.max_iterations == 0 {
            return Err(AgentError::Config("AGENT_MAX_ITERATIONS must be at least 1".into()));
        }

        let memory_idle_ttl = parse::<u64>(&lookup, "MEMORY_IDLE_TTL_SECS")?.map(Duration::from_secs);
        if memory_idle_ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(AgentError::Config("MEMORY_IDLE_TTL_SECS must be at least 1".into()));
        }

        let cost_rates = match (
            parse::<f64>(&lookup, "COST_PROMPT_PER_1K")?,
            parse::<f64>(&lookup, "COST_COMPLETION_PER_1K")?,
        ) {
            (Some(prompt_per_1k), Some(completion_per_1k)) => Some(CostRates {
                prompt_per_1k,
                completion_per_1k,
            }),
            (None, None) => None,
            _ => {
                return Err(AgentError::Config(
                    "COST_PROMPT_PER_1K and COST_COMPLETION_PER_1K must be set together".into(),
                ));
            }
        };

        Ok(Self {
            bind_addr: text("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".into()),
            provider,
            session,
            tool_timeout: parse(&lookup, "TOOL_TIMEOUT_SECS")?
                .map_or(DEFAULT_TOOL_TIMEOUT, Duration::from_secs),
            backend_url: text("APP_BACKEND_URL").or_else(|| text("NODE_API_BASE")),
            memory_idle_ttl,
            memory_max_messages: parse(&lookup, "MEMORY_MAX_MESSAGES")?,
            cost_rates,
        })
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| AgentError::Config(format!("{key} has an invalid value '{v}'")))
        })
        .transpose()
}
