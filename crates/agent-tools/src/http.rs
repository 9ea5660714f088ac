//! HTTP Tool Invoker
//!
//! Calls the endpoint named by an [`HttpTool`] descriptor: `GET` sends the
//! decoded payload as query parameters, `POST` sends it as a JSON body.

use std::time::Duration;

use agent_core::{ExecutionOutcome, Tool, ToolSchema};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::descriptor::{HttpMethod, HttpTool};
use crate::error::{Result, ToolsError};
use crate::payload::{self, INPUT_KEY};

/// Longest error body carried back to the model
const MAX_ERROR_BODY: usize = 512;

/// Invokable form of an [`HttpTool`]
#[derive(Clone, Debug)]
pub struct HttpToolInvoker {
    tool: HttpTool,
    client: Client,
    timeout: Duration,
}

impl HttpToolInvoker {
    pub const fn new(tool: HttpTool, client: Client, timeout: Duration) -> Self {
        Self {
            tool,
            client,
            timeout,
        }
    }

    async fn send(&self, payload: Value) -> Result<Value> {
        let payload = payload::merge_params(&self.tool.params, payload::decode(payload)?);

        let mut request = match self.tool.method {
            HttpMethod::Get => self
                .client
                .get(self.tool.endpoint.clone())
                .query(&payload::query_pairs(&payload)?),
            HttpMethod::Post => self.client.post(self.tool.endpoint.clone()).json(&payload),
        };
        for (name, value) in &self.tool.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        tracing::debug!(
            tool = %self.tool.name,
            method = %self.tool.method,
            endpoint = %self.tool.endpoint,
            "Calling tool endpoint"
        );

        let response = request.timeout(self.timeout).send().await.map_err(|e| {
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
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

#[async_trait]
impl Tool for HttpToolInvoker {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.tool.name.clone(),
            description: self.tool.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": {
                    INPUT_KEY: {
                        "type": "string",
                        "description": "JSON object with the request parameters"
                    }
                },
                "required": [INPUT_KEY]
            }),
        }
    }

    async fn invoke(&self, payload: Value) -> ExecutionOutcome {
        match self.send(payload).await {
            Ok(response) => ExecutionOutcome::success(&self.tool.name, response),
            Err(e) => {
                tracing::warn!(tool = %self.tool.name, error = %e, "HTTP tool call failed");
                ExecutionOutcome::failure(&self.tool.name, e.to_string())
            }
        }
    }
}
