//! Chat engine and storage components
//!
//! This module contains the chat session that assembles streamed replies, the
//! transports it sends requests through, and the key/value store behind the
//! life statistics.

mod chat;
mod memory;
mod transport;

pub use chat::{ChatSession, Phase, SessionSettings, SubmitError, SubmitOutcome};
pub use memory::{InMemoryStore, KeyValueStore, SqliteStore, StorageError};
pub use transport::{ByteStream, CompletionTransport, HttpTransport, TransportError};
