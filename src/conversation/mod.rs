//! Conversation types and transcript state
//!
//! A [`Transcript`] is an immutable snapshot. Every mutation returns a new
//! snapshot, so observers holding an older one never see a half-applied delta.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("an assistant reply is still streaming")]
    ReplyInProgress,

    #[error("no assistant reply is streaming")]
    NoReplyInProgress,
}

/// Ordered conversation turns.
///
/// Only the last message may change after it is recorded, and only while it is
/// an in-progress assistant reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    messages: Arc<Vec<Message>>,
    streaming: bool,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Whether the last message is an assistant reply still receiving deltas.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn push_user(&self, content: impl Into<String>) -> Result<Self, TranscriptError> {
        if self.streaming {
            return Err(TranscriptError::ReplyInProgress);
        }
        Ok(self.pushed(Message::user(content), false))
    }

    /// Start an empty assistant reply that deltas will be appended to.
    pub fn begin_assistant(&self) -> Result<Self, TranscriptError> {
        if self.streaming {
            return Err(TranscriptError::ReplyInProgress);
        }
        Ok(self.pushed(Message::assistant(String::new()), true))
    }

    pub fn append_to_last_assistant_message(&self, delta: &str) -> Result<Self, TranscriptError> {
        if !self.streaming {
            return Err(TranscriptError::NoReplyInProgress);
        }

        let mut messages = Vec::clone(&self.messages);
        match messages.last_mut() {
            Some(last) if last.role == Role::Assistant => last.content.push_str(delta),
            _ => return Err(TranscriptError::NoReplyInProgress),
        }

        Ok(Self {
            messages: Arc::new(messages),
            streaming: true,
        })
    }

    /// Finalize the in-progress reply, if any.
    pub fn finish(&self) -> Self {
        Self {
            messages: Arc::clone(&self.messages),
            streaming: false,
        }
    }

    /// Replace the in-progress reply with `error_text`, or append it as a new
    /// assistant message when no reply was started.
    pub fn fail(&self, error_text: impl Into<String>) -> Self {
        let error_text = error_text.into();
        if !self.streaming {
            return self.pushed(Message::assistant(error_text), false);
        }

        let mut messages = Vec::clone(&self.messages);
        if let Some(last) = messages.last_mut() {
            last.content = error_text;
        }
        Self {
            messages: Arc::new(messages),
            streaming: false,
        }
    }

    fn pushed(&self, message: Message, streaming: bool) -> Self {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.extend(self.messages.iter().cloned());
        messages.push(message);
        Self {
            messages: Arc::new(messages),
            streaming,
        }
    }
}
