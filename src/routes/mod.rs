//! API routes

mod life;
mod proxy;

use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;

use crate::AppState;

pub use proxy::{ProxyError, ProxyRequest};

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/ollama-proxy", post(proxy::forward))
        .route(
            "/api/birth-date",
            get(life::get_birth_date).put(life::put_birth_date),
        )
        .route("/api/life-stats", get(life::life_stats))
        .route("/api/time-lived", get(life::time_lived))
}
