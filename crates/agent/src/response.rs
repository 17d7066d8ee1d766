use serde_json::{Map, Value};
use tracing::warn;

use ano_core::types::Context;

/// Parses an LLM reply into a JSON object, tolerating markdown code fences.
///
/// Anything that is not a JSON object comes back as `{"raw_text": text}`.
pub fn parse_json_response(text: &str) -> Context {
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }

    match serde_json::from_str::<Value>(cleaned.trim()) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            warn!(event_name = "llm.response.unparsed", "could not parse JSON object from response, keeping raw text");
            let mut fallback = Map::new();
            fallback.insert("raw_text".to_string(), Value::String(text.to_string()));
            fallback
        }
    }
}
