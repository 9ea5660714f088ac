//! HTTP Handlers

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use agent_core::{
    AgentError, ThreadId, TokenUsage, ToolCallRecord,
    trace::{self, CostEstimate},
};
use agent_tools::{RawToolDescriptor, ToolDescriptor};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provider: String,
    pub provider_connected: bool,
    pub threads: usize,
}

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub business_id: i64,
    pub agent_id: i64,
    pub thread_id: String,
    pub user_message: String,
    /// System instructions for this turn
    pub context: String,
    /// Validated after deserialization so descriptor problems surface as 400s
    pub tools: Vec<RawToolDescriptor>,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub business_id: i64,
    pub agent_id: i64,
    pub thread_id: String,
    pub ai_response: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub conversation_length: usize,
    pub model_name: Option<String>,
    pub token_usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<CostEstimate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: &AgentError) -> ApiError {
    let status = match err {
        AgentError::Validation(_) => StatusCode::BAD_REQUEST,
        AgentError::Provider(_)
        | AgentError::ProviderUnavailable(_)
        | AgentError::RateLimited(_)
        | AgentError::Auth(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.user_message(),
            code: err.code().into(),
        }),
    )
}

fn rejection_error(rejection: &JsonRejection) -> ApiError {
    tracing::warn!(status = %rejection.status(), "Rejected request body: {}", rejection.body_text());
    (
        rejection.status(),
        Json(ErrorResponse {
            error: rejection.body_text(),
            code: "INVALID_REQUEST".into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider = state.session.provider();
    let provider_connected = provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        provider: provider.name().to_string(),
        provider_connected,
        threads: state.session.memory().thread_count().await,
    })
}

/// Run one reasoning-and-acting cycle with the request's tools
pub async fn process_agent(
    State(state): State<AppState>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| rejection_error(&e))?;

    tracing::info!(
        business_id = request.business_id,
        agent_id = request.agent_id,
        thread_id = %request.thread_id,
        tools = request.tools.len(),
        "Processing agent request"
    );
    tracing::debug!(thread_id = %request.thread_id, user_message = %request.user_message, "Agent input");

    let thread_id = ThreadId::parse(request.thread_id.as_str()).map_err(|e| api_error(&e))?;

    let descriptors = request
        .tools
        .into_iter()
        .map(ToolDescriptor::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| api_error(&AgentError::from(e)))?;
    let tools = state.adapter.adapt(&descriptors).map_err(|e| {
        tracing::warn!(thread_id = %thread_id, error = %e, "Tool adaptation failed");
        api_error(&e)
    })?;

    let result = state
        .session
        .run(&request.context, &request.user_message, &thread_id, tools)
        .await
        .map_err(|e| {
            tracing::error!(thread_id = %thread_id, error = %e, "Agent run failed");
            api_error(&e)
        })?;

    let ai_response = result
        .final_message
        .ok_or(AgentError::EmptyTrace)
        .map_err(|e| api_error(&e))?;
    let estimated_cost = state
        .cost_rates
        .zip(result.token_usage)
        .map(|(rates, usage)| trace::estimate_cost(&usage, &rates));

    tracing::info!(
        thread_id = %thread_id,
        conversation_length = result.message_count,
        tool_calls = result.tool_calls.len(),
        model = result.model_name.as_deref().unwrap_or("unknown"),
        total_tokens = result.token_usage.map(|u| u.total_tokens),
        estimated_cost_usd = estimated_cost.map(|c| c.total_cost_usd),
        "Agent run complete"
    );
    tracing::debug!(thread_id = %thread_id, ai_response = %ai_response, "Agent output");

    Ok(Json(ProcessResponse {
        business_id: request.business_id,
        agent_id: request.agent_id,
        thread_id: thread_id.to_string(),
        ai_response,
        tool_calls: result.tool_calls,
        conversation_length: result.message_count,
        model_name: result.model_name,
        token_usage: result.token_usage,
        estimated_cost,
    }))
}
