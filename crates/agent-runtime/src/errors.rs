//! HTTP failure mapping shared by the providers.

use agent_core::AgentError;
use reqwest::StatusCode;

/// Longest provider error body kept in an error message
const MAX_BODY: usize = 300;

pub fn from_send(provider: &str, err: &reqwest::Error) -> AgentError {
    if err.is_timeout() || err.is_connect() {
        AgentError::ProviderUnavailable(format!("{provider}: {err}"))
    } else {
        AgentError::Provider(format!("{provider}: {err}"))
    }
}

pub fn from_status(provider: &str, status: StatusCode, body: &str) -> AgentError {
    let body: String = body.chars().take(MAX_BODY).collect();
    let detail = format!("{provider} returned {status}: {body}");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited(detail),
        s if s.is_server_error() => AgentError::ProviderUnavailable(detail),
        _ => AgentError::Provider(detail),
    }
}
