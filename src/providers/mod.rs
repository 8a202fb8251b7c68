//! Upstream inference server flavors
//!
//! Two streaming APIs are understood: Ollama's native `/api/generate` and the
//! OpenAI-compatible `/v1/chat/completions`. Each flavor knows its endpoint,
//! how to build its request payload, and how to read one line of its response.

mod ollama;
mod openai_compat;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Upstream API flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Flavor {
    /// `POST /api/generate`, newline-delimited JSON, ends when the body closes.
    #[default]
    Generate,
    /// `POST /v1/chat/completions`, `data:` lines, ends at `data: [DONE]`.
    ChatCompletions,
}

impl Flavor {
    pub fn endpoint_path(self) -> &'static str {
        match self {
            Flavor::Generate => ollama::ENDPOINT_PATH,
            Flavor::ChatCompletions => openai_compat::ENDPOINT_PATH,
        }
    }

    /// Guess the flavor of a raw payload: chat-completions bodies carry `messages`.
    pub fn infer(payload: &Map<String, Value>) -> Self {
        if payload.contains_key("messages") {
            Flavor::ChatCompletions
        } else {
            Flavor::Generate
        }
    }

    /// Interpret one line of a streamed response.
    pub fn parse_line(self, line: &str) -> Result<Fragment, FragmentParseError> {
        match self {
            Flavor::Generate => ollama::parse_line(line),
            Flavor::ChatCompletions => openai_compat::parse_line(line),
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flavor::Generate => f.write_str("generate"),
            Flavor::ChatCompletions => f.write_str("chat-completions"),
        }
    }
}

/// One decoded unit of a response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Text to append to the reply.
    Delta(String),
    /// Explicit end-of-stream marker.
    Done,
    /// Valid but carries nothing to append (blank line, comment, empty delta).
    Skip,
}

#[derive(Debug, Error)]
#[error("malformed stream fragment {line:?}: {source}")]
pub struct FragmentParseError {
    pub line: String,
    #[source]
    pub source: serde_json::Error,
}

impl FragmentParseError {
    fn new(line: &str, source: serde_json::Error) -> Self {
        Self {
            line: line.to_string(),
            source,
        }
    }
}

/// Outbound streaming generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub flavor: Flavor,
    pub model: String,
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new(flavor: Flavor, model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            flavor,
            model: model.into(),
            prompt: prompt.into(),
        }
    }

    /// JSON body for the flavor's endpoint. `stream` is always set.
    pub fn payload(&self) -> Map<String, Value> {
        let value = match self.flavor {
            Flavor::Generate => ollama::payload(&self.model, &self.prompt),
            Flavor::ChatCompletions => openai_compat::payload(&self.model, &self.prompt),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}
