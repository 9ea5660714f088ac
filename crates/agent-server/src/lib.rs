//! # agent-server
//!
//! HTTP surface for the dynamic agent.
//!
//! - `POST /agent/process` adapts the request's tools, runs one reasoning
//!   cycle on the caller's thread and returns the reply with the tool calls
//!   it made, token usage and model identity.
//! - `GET /health` reports provider connectivity and live thread count.

pub mod config;
pub mod handlers;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::{ProviderSettings, ServerConfig};
pub use state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/agent/process", post(handlers::process_agent))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
