//! Trace Extraction
//!
//! A reasoning run leaves behind a raw trace: the thread's messages, as
//! JSON, in whatever layout the provider and store produced. This module
//! normalizes that trace once into a canonical shape and derives the
//! response fields from it.
//!
//! Extraction is total. Unrecognized shapes resolve to `None` or empty
//! lists; only [`final_message`] can fail, and only on an empty trace.
//!
//! Recognized layouts:
//!
//! - trace: `{"messages": [...]}` (optionally with top-level `token_usage`
//!   / `usage`, `model_name` and `steps`) or a bare `[...]` of messages
//! - message: an object, a `[role, content]` pair, or a plain string
//! - usage: `prompt/completion` or `input/output` token counts, under
//!   `response_metadata`, `additional_kwargs`, `usage_metadata` or the
//!   message itself
//! - tool call: `{name, args}` / `{name, arguments}` or
//!   `{function: {name, arguments}}` with arguments as an object or JSON text

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::TokenUsage;

/// Containers that may hold provider metadata, in lookup order
const METADATA_KEYS: [&str; 3] = ["response_metadata", "additional_kwargs", "usage_metadata"];
const USAGE_KEYS: [&str; 2] = ["token_usage", "usage"];
const MODEL_KEYS: [&str; 2] = ["model_name", "model"];

const PROMPT_KEYS: [&str; 3] = ["prompt_tokens", "input_tokens", "prompt_eval_count"];
const COMPLETION_KEYS: [&str; 3] = ["completion_tokens", "output_tokens", "eval_count"];

/// A tool invocation as reported to the caller
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub parameters: Value,
}

/// One message in canonical form
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TraceMessage {
    pub role: Option<String>,
    pub content: String,
    pub usage: Option<TokenUsage>,
    pub model_name: Option<String>,
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Canonical trace; all extraction reads from this
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedTrace {
    pub messages: Vec<TraceMessage>,
    pub usage: Option<TokenUsage>,
    pub model_name: Option<String>,
    pub steps: Vec<ToolCallRecord>,
}

/// Raw trace plus the fields derived from it
#[derive(Clone, Debug, PartialEq)]
pub struct AgentResult {
    pub trace: Value,
    pub final_message: Option<String>,
    pub message_count: usize,
    pub token_usage: Option<TokenUsage>,
    pub model_name: Option<String>,
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Serialize a thread's messages into the raw trace layout
pub fn trace_from_messages(messages: &[Message]) -> Result<Value> {
    let mut trace = Map::new();
    trace.insert("messages".into(), serde_json::to_value(messages)?);
    Ok(Value::Object(trace))
}

/// Normalize a raw trace. Never fails.
pub fn normalize(trace: &Value) -> NormalizedTrace {
    let raw_messages: &[Value] = match trace {
        Value::Object(map) => map.get("messages").and_then(Value::as_array).map_or(&[][..], Vec::as_slice),
        Value::Array(items) => items.as_slice(),
        _ => &[],
    };

    let (usage, model_name, steps) = match trace {
        Value::Object(map) => (
            USAGE_KEYS.iter().find_map(|k| map.get(*k).and_then(parse_usage)),
            MODEL_KEYS.iter().find_map(|k| map.get(*k).and_then(non_empty_str)),
            map.get("steps").and_then(Value::as_array).map(|s| parse_steps(s)).unwrap_or_default(),
        ),
        _ => (None, None, Vec::new()),
    };

    NormalizedTrace {
        messages: raw_messages.iter().map(normalize_message).collect(),
        usage,
        model_name,
        steps,
    }
}

/// Content of the last message
pub fn final_message(trace: &NormalizedTrace) -> Result<&str> {
    trace
        .messages
        .last()
        .map(|m| m.content.as_str())
        .ok_or(AgentError::EmptyTrace)
}

/// Top-level usage first, else the last message's
pub fn token_usage(trace: &NormalizedTrace) -> Option<TokenUsage> {
    trace.usage.or_else(|| trace.messages.last().and_then(|m| m.usage))
}

/// The last message's model, else a top-level one
pub fn model_name(trace: &NormalizedTrace) -> Option<String> {
    trace
        .messages
        .last()
        .and_then(|m| m.model_name.clone())
        .or_else(|| trace.model_name.clone())
}

/// Every tool call in trace order, duplicates kept
pub fn tool_calls(trace: &NormalizedTrace) -> Vec<ToolCallRecord> {
    trace
        .steps
        .iter()
        .chain(trace.messages.iter().flat_map(|m| m.tool_calls.iter()))
        .cloned()
        .collect()
}

/// Derive all response fields from a raw trace
pub fn extract(trace: &Value) -> AgentResult {
    let normalized = normalize(trace);
    AgentResult {
        trace: trace.clone(),
        final_message: final_message(&normalized).ok().map(str::to_owned),
        message_count: normalized.messages.len(),
        token_usage: token_usage(&normalized),
        model_name: model_name(&normalized),
        tool_calls: tool_calls(&normalized),
    }
}

fn normalize_message(raw: &Value) -> TraceMessage {
    match raw {
        Value::Object(map) => TraceMessage {
            role: map.get("role").or_else(|| map.get("type")).and_then(non_empty_str),
            content: content_text(map.get("content")),
            usage: message_usage(map),
            model_name: message_model(map),
            tool_calls: message_tool_calls(map),
        },
        // ("system", "...") style seed tuples
        Value::Array(pair) if pair.len() == 2 => TraceMessage {
            role: non_empty_str(&pair[0]),
            content: content_text(pair.get(1)),
            ..TraceMessage::default()
        },
        Value::String(s) => TraceMessage {
            content: s.clone(),
            ..TraceMessage::default()
        },
        _ => TraceMessage::default(),
    }
}

fn content_text(content: Option<&Value>) -> String {
    match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(s) => Some(s.as_str()),
                Value::Object(p) => p.get("text").and_then(Value::as_str),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(""),
        Some(other) => other.to_string(),
    }
}

fn message_usage(map: &Map<String, Value>) -> Option<TokenUsage> {
    METADATA_KEYS
        .iter()
        .filter_map(|k| map.get(*k).and_then(Value::as_object))
        .find_map(|container| {
            USAGE_KEYS
                .iter()
                .find_map(|k| container.get(*k).and_then(parse_usage))
                .or_else(|| parse_usage_map(container))
        })
        .or_else(|| USAGE_KEYS.iter().find_map(|k| map.get(*k).and_then(parse_usage)))
}

fn message_model(map: &Map<String, Value>) -> Option<String> {
    METADATA_KEYS[..2]
        .iter()
        .filter_map(|k| map.get(*k).and_then(Value::as_object))
        .find_map(|container| MODEL_KEYS.iter().find_map(|k| container.get(*k).and_then(non_empty_str)))
        .or_else(|| MODEL_KEYS.iter().find_map(|k| map.get(*k).and_then(non_empty_str)))
}

fn message_tool_calls(map: &Map<String, Value>) -> Vec<ToolCallRecord> {
    let direct = map.get("tool_calls").and_then(Value::as_array);
    let nested = map
        .get("additional_kwargs")
        .and_then(|kw| kw.get("tool_calls"))
        .and_then(Value::as_array);

    direct
        .filter(|calls| !calls.is_empty())
        .or(nested)
        .map(|calls| calls.iter().filter_map(parse_tool_call).collect())
        .unwrap_or_default()
}

fn parse_tool_call(raw: &Value) -> Option<ToolCallRecord> {
    let function = raw.get("function").filter(|f| f.is_object());

    let name = raw
        .get("name")
        .and_then(non_empty_str)
        .or_else(|| function.and_then(|f| f.get("name")).and_then(non_empty_str))?;

    let parameters = ["args", "arguments"]
        .iter()
        .find_map(|k| raw.get(*k))
        .or_else(|| function.and_then(|f| f.get("arguments").or_else(|| f.get("args"))))
        .map_or_else(|| Value::Object(Map::new()), decode_arguments);

    Some(ToolCallRecord { name, parameters })
}

fn parse_steps(steps: &[Value]) -> Vec<ToolCallRecord> {
    steps
        .iter()
        .filter_map(|step| {
            let action = step
                .get("action")
                .or_else(|| step.as_array().and_then(|pair| pair.first()))?;
            let name = action.get("tool").and_then(non_empty_str)?;
            let parameters = action
                .get("tool_input")
                .map_or_else(|| Value::Object(Map::new()), decode_arguments);
            Some(ToolCallRecord { name, parameters })
        })
        .collect()
}

/// Wrapper key HTTP tools advertise for their single input
const INPUT_KEY: &str = "input_data";

/// Arguments sent as JSON text are decoded and a lone `input_data` wrapper
/// is unwrapped; anything else is kept as-is
fn decode_arguments(args: &Value) -> Value {
    match args {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(decoded @ Value::Object(_)) => decode_arguments(&decoded),
            Ok(decoded) => decoded,
            Err(_) => args.clone(),
        },
        Value::Object(map) if map.len() == 1 && map.contains_key(INPUT_KEY) => {
            decode_arguments(&map[INPUT_KEY])
        }
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    }
}

fn parse_usage(value: &Value) -> Option<TokenUsage> {
    value.as_object().and_then(parse_usage_map)
}

fn parse_usage_map(map: &Map<String, Value>) -> Option<TokenUsage> {
    let count = |keys: &[&str]| keys.iter().find_map(|k| map.get(*k).and_then(as_count));

    let prompt = count(&PROMPT_KEYS);
    let completion = count(&COMPLETION_KEYS);
    let total = count(&["total_tokens"]);

    if prompt.is_none() && completion.is_none() && total.is_none() {
        return None;
    }

    let prompt_tokens = prompt.unwrap_or(0);
    let completion_tokens = completion.unwrap_or(0);
    Some(TokenUsage {
        prompt_tokens,
        completion_tokens,
        total_tokens: total.unwrap_or_else(|| prompt_tokens.saturating_add(completion_tokens)),
    })
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

// ============================================================================
// Cost Estimation
// ============================================================================

/// USD prices per 1k tokens
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostRates {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_cost_usd: f64,
}

#[allow(clippy::cast_precision_loss)]
pub fn estimate_cost(usage: &TokenUsage, rates: &CostRates) -> CostEstimate {
    let cost = (usage.prompt_tokens as f64).mul_add(
        rates.prompt_per_1k,
        usage.completion_tokens as f64 * rates.completion_per_1k,
    ) / 1000.0;

    CostEstimate {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_cost_usd: cost,
    }
}
