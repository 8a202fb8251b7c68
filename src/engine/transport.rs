//! Transport seam between the chat session and an inference server
//!
//! A transport opens one streaming generation request and hands back the raw
//! response body. It knows nothing about fragment formats.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::providers::GenerationRequest;

/// Raw response body chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP error! status: {0}")]
    Status(u16),

    #[error("stream interrupted: {0}")]
    Stream(String),
}

#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// Send `request` and return the response body once a success status arrives.
    async fn open(&self, request: &GenerationRequest) -> Result<ByteStream, TransportError>;
}

#[derive(Debug, Clone)]
enum Route {
    Direct { base_url: String },
    Proxy { proxy_url: String, target_url: String },
}

/// HTTP transport, either straight to the inference server or via the relay.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    route: Route,
}

impl HttpTransport {
    pub fn direct(client: Client, base_url: &str) -> Self {
        Self {
            client,
            route: Route::Direct {
                base_url: base_url.trim_end_matches('/').to_string(),
            },
        }
    }

    /// Post to `proxy_url`, asking the relay to forward to `target_url`.
    pub fn proxied(client: Client, proxy_url: &str, target_url: &str) -> Self {
        Self {
            client,
            route: Route::Proxy {
                proxy_url: proxy_url.to_string(),
                target_url: target_url.to_string(),
            },
        }
    }
}

#[async_trait]
impl CompletionTransport for HttpTransport {
    async fn open(&self, request: &GenerationRequest) -> Result<ByteStream, TransportError> {
        let mut body = request.payload();

        let url = match &self.route {
            Route::Direct { base_url } => format!("{}{}", base_url, request.flavor.endpoint_path()),
            Route::Proxy {
                proxy_url,
                target_url,
            } => {
                body.insert("targetServerUrl".into(), Value::String(target_url.clone()));
                body.insert("flavor".into(), Value::String(request.flavor.to_string()));
                proxy_url.clone()
            }
        };

        debug!(%url, flavor = %request.flavor, model = %request.model, "Opening completion stream");

        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        Ok(response
            .bytes_stream()
            .map_err(TransportError::Request)
            .boxed())
    }
}
