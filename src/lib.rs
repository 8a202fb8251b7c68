//! Folio - streaming chat relay for local inference servers
//!
//! Relays generation requests from browsers to Ollama or OpenAI-compatible
//! servers, assembles streamed replies into a conversation transcript, and
//! serves a few life statistics computed from a stored birth date.

use std::sync::Arc;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod conversation;
pub mod engine;
pub mod life;
pub mod providers;
pub mod routes;
pub mod stream;

use engine::KeyValueStore;
use life::BirthDateBook;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Shared upstream client; connections are pooled across requests.
    pub http: reqwest::Client,
    pub birth_dates: BirthDateBook,
}

impl AppState {
    pub fn new(http: reqwest::Client, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            http,
            birth_dates: BirthDateBook::new(store),
        }
    }
}

/// Build the HTTP application with its middleware.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
