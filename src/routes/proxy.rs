//! Relay from browser clients to an inference server
//!
//! Browsers usually cannot call a local inference server directly because of
//! cross-origin rules. This handler forwards the request and pipes the upstream
//! body back untouched, so it works with any streaming format.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::providers::Flavor;
use crate::AppState;

/// Relay request: the upstream address plus the generation payload to forward.
#[derive(Debug)]
pub struct ProxyRequest {
    pub target_server_url: String,
    pub flavor: Flavor,
    /// Everything else, forwarded verbatim
    pub payload: Map<String, Value>,
}

impl ProxyRequest {
    /// Split a raw JSON body into the relay fields and the payload to forward.
    ///
    /// `targetServerUrl` wins over the legacy `apiUrl` when both are usable
    /// strings. Neither is forwarded, and neither is `flavor`.
    pub fn from_body(body: &[u8]) -> Result<Self, ProxyError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| ProxyError::InvalidBody(e.to_string()))?;
        let Value::Object(mut payload) = value else {
            return Err(ProxyError::InvalidBody(
                "expected a JSON object".to_string(),
            ));
        };

        let target = [payload.remove("targetServerUrl"), payload.remove("apiUrl")]
            .into_iter()
            .flatten()
            .find_map(|candidate| match candidate {
                Value::String(url) if !url.trim().is_empty() => Some(url.trim().to_string()),
                _ => None,
            })
            .ok_or(ProxyError::MissingTarget)?;

        let flavor = match payload.remove("flavor") {
            None | Some(Value::Null) => Flavor::infer(&payload),
            Some(raw) => match serde_json::from_value(raw.clone()) {
                Ok(flavor) => flavor,
                Err(_) => {
                    warn!(flavor = %raw, "Unknown flavor, inferring from payload");
                    Flavor::infer(&payload)
                }
            },
        };

        Ok(Self {
            target_server_url: target,
            flavor,
            payload,
        })
    }
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("API URL is required")]
    MissingTarget,

    #[error("inference server responded with status {status}")]
    Upstream { status: u16 },

    #[error("failed to reach inference server: {0}")]
    Transport(#[from] reqwest::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProxyError::InvalidBody(_) | ProxyError::MissingTarget => StatusCode::BAD_REQUEST,
            ProxyError::Upstream { status } => {
                error!(upstream_status = status, "Relay failed: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::Transport(e) => {
                error!("Relay failed: {:?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match self {
            ProxyError::InvalidBody(_) | ProxyError::MissingTarget => self.to_string(),
            _ => "Failed to fetch from inference server".to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub async fn forward(State(state): State<AppState>, body: Bytes) -> Result<Response, ProxyError> {
    let ProxyRequest {
        target_server_url: target,
        flavor,
        payload,
    } = ProxyRequest::from_body(&body)?;

    let url = format!("{}{}", target.trim_end_matches('/'), flavor.endpoint_path());

    info!(%url, %flavor, "Forwarding generation request");

    let upstream = state.http.post(&url).json(&payload).send().await?;

    let status = upstream.status();
    if !status.is_success() {
        return Err(ProxyError::Upstream {
            status: status.as_u16(),
        });
    }

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(upstream.bytes_stream()),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::InMemoryStore;
    use axum::body::to_bytes;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app() -> axum::Router {
        let state = AppState::new(reqwest::Client::new(), Arc::new(InMemoryStore::new()));
        crate::app(state)
    }

    fn relay_request(body: Value) -> Request<Body> {
        raw_relay_request(body.to_string())
    }

    fn raw_relay_request(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/ollama-proxy")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn body_json_of(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_missing_target_is_bad_request() {
        let response = app().oneshot(relay_request(json!({}))).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json_of(response).await,
            json!({"error": "API URL is required"})
        );
    }

    #[tokio::test]
    async fn test_blank_target_is_bad_request() {
        let response = app()
            .oneshot(relay_request(json!({"targetServerUrl": "  ", "model": "m"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stream_is_piped_through() {
        let server = MockServer::start().await;
        let upstream_body = "{\"response\":\"Hi\"}\n{\"response\":\" there\"}\nnot-json\n";

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_json(json!({"model": "llama3.2", "prompt": "hello", "stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_string(upstream_body))
            .expect(1)
            .mount(&server)
            .await;

        let response = app()
            .oneshot(relay_request(json!({
                "targetServerUrl": format!("{}/", server.uri()),
                "model": "llama3.2",
                "prompt": "hello",
                "stream": true
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::CONNECTION], "keep-alive");

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes, upstream_body.as_bytes());
    }

    #[tokio::test]
    async fn test_legacy_api_url_field_and_chat_flavor() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_json(json!({
                "model": "llama3.2",
                "messages": [{"role": "user", "content": "hello"}],
                "stream": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("data: [DONE]\n"))
            .expect(1)
            .mount(&server)
            .await;

        let response = app()
            .oneshot(relay_request(json!({
                "apiUrl": server.uri(),
                "model": "llama3.2",
                "messages": [{"role": "user", "content": "hello"}],
                "stream": true
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_explicit_flavor_is_not_forwarded() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_json(json!({"model": "m", "prompt": "odd", "stream": true})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let response = app()
            .oneshot(relay_request(json!({
                "targetServerUrl": server.uri(),
                "flavor": "chat-completions",
                "model": "m",
                "prompt": "odd",
                "stream": true
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_upstream_error_status_is_server_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let response = app()
            .oneshot(relay_request(json!({
                "targetServerUrl": server.uri(),
                "model": "missing",
                "prompt": "hello"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json_of(response).await,
            json!({"error": "Failed to fetch from inference server"})
        );
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_server_error() {
        let response = app()
            .oneshot(relay_request(json!({
                "targetServerUrl": "http://127.0.0.1:9",
                "model": "m",
                "prompt": "hello"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_non_string_target_is_bad_request() {
        for target in [json!(123), json!(null), json!(["http://127.0.0.1:9"])] {
            let response = app()
                .oneshot(relay_request(json!({"targetServerUrl": target, "model": "m"})))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(
                body_json_of(response).await,
                json!({"error": "API URL is required"})
            );
        }
    }

    #[tokio::test]
    async fn test_non_object_body_is_bad_request() {
        for body in ["null", "[]", "\"http://127.0.0.1:9\"", "{not json", ""] {
            let response = app().oneshot(raw_relay_request(body)).await.unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {:?}", body);
            let error = body_json_of(response).await;
            assert!(error["error"].is_string(), "body {:?}", body);
        }
    }

    #[tokio::test]
    async fn test_both_target_fields_prefer_target_server_url() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_json(json!({"model": "m", "prompt": "hello"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let response = app()
            .oneshot(relay_request(json!({
                "targetServerUrl": server.uri(),
                "apiUrl": "http://127.0.0.1:9",
                "model": "m",
                "prompt": "hello"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_blank_target_falls_back_to_api_url() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let response = app()
            .oneshot(relay_request(json!({
                "targetServerUrl": "",
                "apiUrl": server.uri(),
                "model": "m",
                "prompt": "hello"
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_unknown_flavor_is_inferred() {
        let request = ProxyRequest::from_body(
            br#"{"apiUrl":"http://h","flavor":"bogus","messages":[]}"#,
        )
        .unwrap();

        assert_eq!(request.flavor, Flavor::ChatCompletions);
        assert_eq!(request.target_server_url, "http://h");
        assert_eq!(Value::Object(request.payload), json!({"messages": []}));
    }
}
