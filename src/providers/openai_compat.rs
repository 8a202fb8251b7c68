//! OpenAI-compatible chat completions API
//!
//! Works with any server that streams the OpenAI chat completions format:
//! - Ollama (`/v1` compatibility layer)
//! - vLLM (local server)
//! - LM Studio (local server)
//! - LocalAI (local server)
//!
//! Streamed responses are server-sent event lines:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hi"}}]}
//! data: [DONE]
//! ```

use serde::Serialize;
use serde_json::Value;

use crate::conversation::Message;

use super::{Fragment, FragmentParseError};

pub(super) const ENDPOINT_PATH: &str = "/v1/chat/completions";

const DONE_MARKER: &str = "[DONE]";

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    stream: bool,
}

pub(super) fn payload(model: &str, prompt: &str) -> Value {
    serde_json::to_value(ChatCompletionRequest {
        model,
        messages: vec![Message::user(prompt)],
        stream: true,
    })
    .unwrap_or(Value::Null)
}

pub(super) fn parse_line(line: &str) -> Result<Fragment, FragmentParseError> {
    let line = line.trim();

    // Comments, `event:` fields and keep-alive blanks carry no data.
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(Fragment::Skip);
    };
    let data = data.trim_start();

    if data == DONE_MARKER {
        return Ok(Fragment::Done);
    }
    if data.is_empty() {
        return Ok(Fragment::Skip);
    }

    let chunk: Value =
        serde_json::from_str(data).map_err(|e| FragmentParseError::new(line, e))?;

    // A top-level array never matches the `choices` segment.
    let content = chunk
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str);

    Ok(match content {
        Some(text) if !text.is_empty() => Fragment::Delta(text.to_string()),
        _ => Fragment::Skip,
    })
}
