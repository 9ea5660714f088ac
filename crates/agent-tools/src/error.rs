//! Error Types for Tool Adaptation

use std::time::Duration;

use agent_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolsError>;

#[derive(Error, Debug)]
pub enum ToolsError {
    #[error("Invalid tool descriptor: {0}")]
    Validation(String),

    #[error("Payload is not valid JSON: {0}")]
    PayloadParse(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl From<ToolsError> for AgentError {
    fn from(err: ToolsError) -> Self {
        match err {
            ToolsError::Validation(msg) => Self::Validation(msg),
            ToolsError::PayloadParse(msg) => Self::PayloadParse(msg),
            other => Self::Other(other.to_string()),
        }
    }
}
