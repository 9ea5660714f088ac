//! Tool payload decoding shared by the invokers.

use serde_json::{Map, Value};

use crate::error::{Result, ToolsError};

/// Parameter name advertised for tools that take one opaque input
pub const INPUT_KEY: &str = "input_data";

/// Decode a payload the model sent into structured data.
///
/// Strings are parsed as JSON; an empty string or `null` is an empty
/// object. An object whose only key is [`INPUT_KEY`] is unwrapped.
pub fn decode(payload: Value) -> Result<Value> {
    let value = match payload {
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                Value::Object(Map::new())
            } else {
                serde_json::from_str(text).map_err(|e| ToolsError::PayloadParse(e.to_string()))?
            }
        }
        Value::Null => Value::Object(Map::new()),
        other => other,
    };

    match value {
        Value::Object(mut map) if map.len() == 1 && map.contains_key(INPUT_KEY) => {
            decode(map.remove(INPUT_KEY).unwrap_or(Value::Null))
        }
        other => Ok(other),
    }
}

/// Overlay the payload on static params; payload keys win
pub fn merge_params(params: &Map<String, Value>, payload: Value) -> Value {
    match payload {
        Value::Object(map) if !params.is_empty() => {
            let mut merged = params.clone();
            merged.extend(map);
            Value::Object(merged)
        }
        other => other,
    }
}

/// Flatten an object payload into query pairs
pub fn query_pairs(payload: &Value) -> Result<Vec<(String, String)>> {
    let map = payload
        .as_object()
        .ok_or_else(|| ToolsError::PayloadParse("GET payload must be a JSON object".into()))?;

    Ok(map
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect())
}
