//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Rate limited by the provider
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication with the provider failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Maximum iterations reached in reasoning loop
    #[error("Maximum iterations ({0}) reached")]
    MaxIterations(usize),

    /// Malformed request or tool descriptor
    #[error("Validation error: {0}")]
    Validation(String),

    /// Tool payload is not valid structured text
    #[error("Payload parse error: {0}")]
    PayloadParse(String),

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Trace has no messages
    #[error("Execution trace contains no messages")]
    EmptyTrace,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if error is retryable by the caller
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_) | Self::RateLimited(_)
        )
    }

    /// Whether this error originates in the caller's input
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Whether the reasoning capability itself failed
    pub const fn is_reasoning_failure(&self) -> bool {
        matches!(
            self,
            Self::Provider(_)
                | Self::ProviderUnavailable(_)
                | Self::RateLimited(_)
                | Self::Auth(_)
                | Self::MaxIterations(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(_) => "The AI service encountered an error.".into(),
            Self::ProviderUnavailable(_) => "The AI service is currently unavailable. Please try again.".into(),
            Self::RateLimited(_) => "The AI service is rate limiting requests. Please wait a moment.".into(),
            Self::Auth(_) => "The AI service rejected our credentials.".into(),
            Self::MaxIterations(_) => "The request took too long to process. Please try a simpler query.".into(),
            Self::Validation(msg) => format!("Invalid request: {msg}"),
            Self::PayloadParse(msg) => format!("Invalid tool input: {msg}"),
            Self::ToolNotFound(name) => format!("The tool '{name}' is not available."),
            _ => "An unexpected error occurred.".into(),
        }
    }

    /// Stable machine-readable code for API error bodies
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::PayloadParse(_) => "PAYLOAD_PARSE_ERROR",
            Self::ToolNotFound(_) => "TOOL_ERROR",
            Self::Provider(_)
            | Self::ProviderUnavailable(_)
            | Self::RateLimited(_)
            | Self::Auth(_)
            | Self::MaxIterations(_) => "REASONING_ERROR",
            Self::EmptyTrace => "EMPTY_TRACE",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
