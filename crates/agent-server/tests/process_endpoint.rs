//! `POST /agent/process` and `GET /health` exercised in-process.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use agent_core::message::MessageMetadata;
use agent_core::trace::CostRates;
use agent_core::{
    AgentError, Completion, GenerationOptions, InMemoryConversationStore, LlmProvider, Message,
    Result, Role, SessionConfig, ToolCall, ToolSchema,
};
use agent_server::{AppState, router};
use agent_tools::ToolAdapter;
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Query;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Map, Value, json};
use tower::ServiceExt;

/// Plays back canned completions and records every prompt it receives.
#[derive(Default)]
struct Scripted {
    replies: Mutex<VecDeque<Result<Completion>>>,
    prompts: Mutex<Vec<Vec<Message>>>,
    offered_tools: Mutex<Vec<Vec<String>>>,
}

impl Scripted {
    fn new(replies: Vec<Result<Completion>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        })
    }
}

#[async_trait]
impl LlmProvider for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        self.offered_tools
            .lock()
            .unwrap()
            .push(tools.iter().map(|t| t.name.clone()).collect());

        let mut completion = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Completion::text("Happy to help.")))?;

        let mut meta = Map::new();
        meta.insert("model_name".into(), json!(options.model));
        meta.insert(
            "token_usage".into(),
            json!({"prompt_tokens": 100, "completion_tokens": 20, "total_tokens": 120}),
        );
        completion.metadata = MessageMetadata {
            response_metadata: Some(meta),
            ..Default::default()
        };
        Ok(completion)
    }
}

fn app(provider: Arc<Scripted>) -> Router {
    router(
        AppState::new(
            provider,
            Arc::new(InMemoryConversationStore::new()),
            ToolAdapter::default(),
            SessionConfig::default(),
        )
        .with_cost_rates(Some(CostRates {
            prompt_per_1k: 0.15,
            completion_per_1k: 0.6,
        })),
    )
}

fn request(thread_id: &str, user_message: &str, tools: Value) -> Value {
    json!({
        "business_id": 7,
        "agent_id": 3,
        "thread_id": thread_id,
        "user_message": user_message,
        "context": "You are a support assistant for Acme.",
        "tools": tools
    })
}

async fn post(app: &Router, body: &Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/agent/process")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn spawn_orders_api() -> String {
    let app = Router::new().route(
        "/orders",
        get(|Query(query): Query<HashMap<String, String>>| async move {
            Json(json!({"status": if query.get("order_id").map(String::as_str) == Some("42") { "shipped" } else { "unknown" }}))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_plain_turn_without_tools() {
    let app = app(Scripted::new(vec![]));

    let (status, body) = post(&app, &request("default_thread", "Hello, how can I assist you today?", json!([]))).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["business_id"], 7);
    assert_eq!(body["agent_id"], 3);
    assert_eq!(body["thread_id"], "default_thread");
    assert_eq!(body["ai_response"], "Happy to help.");
    assert_eq!(body["tool_calls"], json!([]));
    assert_eq!(body["conversation_length"], 3);
    assert_eq!(body["model_name"], "gpt-4o-mini");
    assert_eq!(body["token_usage"]["total_tokens"], 120);
    assert!(body["estimated_cost"]["total_cost_usd"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_http_tool_lookup() {
    let base = spawn_orders_api().await;
    let provider = Scripted::new(vec![
        Ok(Completion::with_tool_calls(vec![
            ToolCall::new("lookup_order", json!({"input_data": "{\"order_id\": \"42\"}"})).with_id("call_1"),
        ])),
        Ok(Completion::text("Your order 42 has shipped.")),
    ]);
    let app = app(provider.clone());

    let tools = json!([{
        "name": "lookup_order",
        "description": "Look up an order by id",
        "endpoint": format!("{base}/orders"),
        "method": "GET"
    }]);
    let (status, body) = post(&app, &request("orders-thread", "Where is order 42?", tools)).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ai_response"], "Your order 42 has shipped.");
    assert_eq!(
        body["tool_calls"],
        json!([{"name": "lookup_order", "parameters": {"order_id": "42"}}])
    );
    // system, user, assistant (call), tool, assistant
    assert_eq!(body["conversation_length"], 5);

    let prompts = provider.prompts.lock().unwrap();
    let tool_result = prompts[1].iter().find(|m| m.role == Role::Tool).unwrap();
    let outcome: Value = serde_json::from_str(&tool_result.content).unwrap();
    assert_eq!(outcome["success"], true);
    assert_eq!(outcome["tool_name"], "lookup_order");
    assert_eq!(outcome["response"], json!({"status": "shipped"}));
    assert_eq!(provider.offered_tools.lock().unwrap()[0], vec!["lookup_order"]);
}

#[tokio::test]
async fn test_feedback_function_tool() {
    let provider = Scripted::new(vec![
        Ok(Completion::with_tool_calls(vec![ToolCall::new(
            "submit_feedback",
            json!({"rating": 5, "feedback_text": "great"}),
        )])),
        Ok(Completion::text("Thanks for the feedback!")),
    ]);
    let app = app(provider.clone());

    let tools = json!([{
        "name": "submit_feedback",
        "description": "Record customer feedback",
        "parameters": {"rating": "integer", "feedback_text": "string"}
    }]);
    let (status, body) = post(&app, &request("fb", "Five stars, great service", tools)).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body["tool_calls"],
        json!([{"name": "submit_feedback", "parameters": {"rating": 5, "feedback_text": "great"}}])
    );

    let prompts = provider.prompts.lock().unwrap();
    let tool_result = prompts[1].iter().find(|m| m.role == Role::Tool).unwrap();
    let outcome: Value = serde_json::from_str(&tool_result.content).unwrap();
    assert_eq!(outcome["success"], true);
    let text = outcome["response"].as_str().unwrap();
    assert!(text.contains('5') && text.contains("great"), "{text}");
}

#[tokio::test]
async fn test_history_accumulates_on_thread() {
    let provider = Scripted::new(vec![]);
    let app = app(provider.clone());

    post(&app, &request("t1", "first", json!([]))).await;
    let (_, body) = post(&app, &request("t1", "second", json!([]))).await;
    assert_eq!(body["conversation_length"], 6);

    let (_, other) = post(&app, &request("t2", "elsewhere", json!([]))).await;
    assert_eq!(other["conversation_length"], 3);

    // The second turn on t1 saw the first turn.
    let prompts = provider.prompts.lock().unwrap();
    assert_eq!(prompts[1].len(), 5);
    assert_eq!(prompts[1][1].content, "first");
}

#[tokio::test]
async fn test_malformed_tools_are_rejected() {
    let provider = Scripted::new(vec![]);
    let app = app(provider.clone());

    let ambiguous = json!([{
        "name": "both", "description": "", "endpoint": "http://x.local/y", "parameters": {}
    }]);
    let (status, body) = post(&app, &request("t", "hi", ambiguous)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["error"].as_str().unwrap().contains("ambiguous"));

    let duplicate = json!([
        {"name": "dup", "description": "", "endpoint": "http://x.local/y"},
        {"name": "dup", "description": "", "parameters": {}}
    ]);
    let (status, _) = post(&app, &request("t", "hi", duplicate)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // No reasoning work was started.
    assert!(provider.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_fields_are_client_errors() {
    let app = app(Scripted::new(vec![]));

    let (status, body) = post(&app, &json!({"business_id": 1, "agent_id": 1, "thread_id": "t"})).await;
    assert!(status.is_client_error());
    assert_eq!(body["code"], "INVALID_REQUEST");

    let (status, _) = post(&app, &request("   ", "hi", json!([]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_provider_failure_is_server_error() {
    let provider = Scripted::new(vec![Err(AgentError::ProviderUnavailable("connection refused".into()))]);
    let app = app(provider);

    let (status, body) = post(&app, &request("t", "hi", json!([]))).await;
    assert!(status.is_server_error());
    assert_eq!(body["code"], "REASONING_ERROR");

    // The failed turn left no trace on the thread.
    let (status, body) = post(&app, &request("t", "hi again", json!([]))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["conversation_length"], 3);
}

#[tokio::test]
async fn test_health() {
    let app = app(Scripted::new(vec![]));
    post(&app, &request("t", "hi", json!([]))).await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["provider"], "scripted");
    assert_eq!(body["provider_connected"], true);
    assert_eq!(body["threads"], 1);
}
