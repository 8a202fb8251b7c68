//! Ollama native generate API

use serde::Serialize;
use serde_json::Value;

use super::{Fragment, FragmentParseError};

pub(super) const ENDPOINT_PATH: &str = "/api/generate";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

pub(super) fn payload(model: &str, prompt: &str) -> Value {
    serde_json::to_value(GenerateRequest {
        model,
        prompt,
        stream: true,
    })
    .unwrap_or(Value::Null)
}

pub(super) fn parse_line(line: &str) -> Result<Fragment, FragmentParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Fragment::Skip);
    }

    let chunk: Value =
        serde_json::from_str(line).map_err(|e| FragmentParseError::new(line, e))?;

    // Only an object's string `response` carries text.
    Ok(match chunk.get("response").and_then(Value::as_str) {
        Some(text) if !text.is_empty() => Fragment::Delta(text.to_string()),
        _ => Fragment::Skip,
    })
}
