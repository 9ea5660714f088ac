//! Feedback backend
//!
//! Built-in feedback tools record their side effect through a
//! [`FeedbackSink`]. Without a sink they only acknowledge.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;

use crate::error::{Result, ToolsError};
use crate::function::Builtin;

/// Destination for feedback-type side effects
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    /// Record one built-in invocation; returns the backend's message
    async fn record(&self, kind: Builtin, args: &Value) -> Result<String>;
}

/// Posts feedback to the application backend
#[derive(Clone, Debug)]
pub struct HttpFeedbackSink {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpFeedbackSink {
    pub fn new(client: Client, base_url: &str, timeout: Duration) -> Result<Self> {
        // Joined paths are relative, so the base must end in a slash.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| ToolsError::Validation(format!("invalid backend URL '{base_url}': {e}")))?;
        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    fn url_for(&self, kind: Builtin) -> Result<Url> {
        self.base_url
            .join(kind.backend_path())
            .map_err(|e| ToolsError::Backend(e.to_string()))
    }
}

#[async_trait]
impl FeedbackSink for HttpFeedbackSink {
    async fn record(&self, kind: Builtin, args: &Value) -> Result<String> {
        let url = self.url_for(kind)?;
        tracing::debug!(tool = kind.name(), %url, "Recording feedback");

        let response = self
            .client
            .post(url)
            .json(args)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolsError::Timeout(self.timeout)
                } else {
                    ToolsError::Network(e)
                }
            })?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ToolsError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
            .unwrap_or_else(|| "Tool executed successfully".to_string());
        Ok(message)
    }
}
