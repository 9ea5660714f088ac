//! Tool Descriptors
//!
//! Request-supplied description of a callable capability. The wire form
//! ([`RawToolDescriptor`]) is validated into the [`ToolDescriptor`] tagged
//! union at deserialization time: a descriptor with an `endpoint` is an HTTP
//! tool, one with `parameters` is a function tool, and anything with both or
//! neither is rejected.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ToolsError;

/// HTTP method for endpoint-backed tools
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
}

impl FromStr for HttpMethod {
    type Err = ToolsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            other => Err(ToolsError::Validation(format!(
                "unsupported method '{other}', expected GET or POST"
            ))),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// Tool backed by a remote HTTP endpoint
#[derive(Clone, Debug, PartialEq)]
pub struct HttpTool {
    pub name: String,
    pub description: String,
    pub endpoint: Url,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    /// Static parameters merged under every payload
    pub params: Map<String, Value>,
}

/// Tool dispatched by name to an in-process behavior
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionTool {
    pub name: String,
    pub description: String,
    /// Parameter name to type/shape descriptor
    pub parameters: Map<String, Value>,
}

/// A validated tool descriptor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawToolDescriptor", into = "RawToolDescriptor")]
pub enum ToolDescriptor {
    Http(HttpTool),
    Function(FunctionTool),
}

impl ToolDescriptor {
    pub fn name(&self) -> &str {
        match self {
            Self::Http(tool) => &tool.name,
            Self::Function(tool) => &tool.name,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Http(tool) => &tool.description,
            Self::Function(tool) => &tool.description,
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Function(_) => "function",
        }
    }
}

/// Tool descriptor as it arrives on the wire
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawToolDescriptor {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,
}

impl TryFrom<RawToolDescriptor> for ToolDescriptor {
    type Error = ToolsError;

    fn try_from(raw: RawToolDescriptor) -> Result<Self, Self::Error> {
        let name = raw.name.trim().to_string();
        if name.is_empty() {
            return Err(ToolsError::Validation("tool name must not be empty".into()));
        }

        match (raw.endpoint, raw.parameters) {
            (Some(_), Some(_)) => Err(ToolsError::Validation(format!(
                "tool '{name}' is ambiguous: it sets both 'endpoint' and 'parameters'"
            ))),
            (None, None) => Err(ToolsError::Validation(format!(
                "tool '{name}' is ambiguous: it sets neither 'endpoint' nor 'parameters'"
            ))),
            (Some(endpoint), None) => {
                let endpoint = Url::parse(endpoint.trim()).map_err(|e| {
                    ToolsError::Validation(format!("tool '{name}' has an invalid endpoint: {e}"))
                })?;
                if !matches!(endpoint.scheme(), "http" | "https") {
                    return Err(ToolsError::Validation(format!(
                        "tool '{name}' endpoint must be http or https"
                    )));
                }
                let method = raw
                    .method
                    .as_deref()
                    .map(str::parse::<HttpMethod>)
                    .transpose()
                    .map_err(|e| match e {
                        ToolsError::Validation(msg) => ToolsError::Validation(format!("tool '{name}': {msg}")),
                        other => other,
                    })?
                    .unwrap_or_default();

                Ok(Self::Http(HttpTool {
                    name,
                    description: raw.description,
                    endpoint,
                    method,
                    headers: raw.headers.unwrap_or_default(),
                    params: raw.params.unwrap_or_default(),
                }))
            }
            (None, Some(parameters)) => Ok(Self::Function(FunctionTool {
                name,
                description: raw.description,
                parameters,
            })),
        }
    }
}

impl From<ToolDescriptor> for RawToolDescriptor {
    fn from(descriptor: ToolDescriptor) -> Self {
        match descriptor {
            ToolDescriptor::Http(tool) => Self {
                name: tool.name,
                description: tool.description,
                endpoint: Some(tool.endpoint.to_string()),
                method: Some(tool.method.to_string()),
                headers: (!tool.headers.is_empty()).then_some(tool.headers),
                params: (!tool.params.is_empty()).then_some(tool.params),
                parameters: None,
            },
            ToolDescriptor::Function(tool) => Self {
                name: tool.name,
                description: tool.description,
                parameters: Some(tool.parameters),
                ..Self::default()
            },
        }
    }
}
