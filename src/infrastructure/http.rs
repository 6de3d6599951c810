//! JSON over HTTP/1.1, shared by the node and WebDriver adapters

use bytes::Bytes;
use http::{header, Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    #[error("Invalid URL {0:?}")]
    InvalidUrl(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("No response within {0:?}")]
    Timeout(Duration),

    #[error("Response body is not JSON ({status}): {reason}")]
    NotJson { status: u16, reason: String },
}

/// A response whose body parsed as JSON
#[derive(Debug, Clone, PartialEq)]
pub struct JsonResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Minimal JSON client with a per-request timeout
#[derive(Clone)]
pub struct JsonHttpClient {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl JsonHttpClient {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self { client, timeout }
    }

    pub fn parse_uri(url: &str) -> Result<Uri, HttpError> {
        url.parse()
            .map_err(|_| HttpError::InvalidUrl(url.to_string()))
    }

    /// Send `body` (if any) as JSON and parse the reply as JSON.
    ///
    /// Non-2xx statuses are returned, not raised: both protocols put their
    /// error details in the body.
    pub async fn send(
        &self,
        method: Method,
        uri: Uri,
        body: Option<&Value>,
    ) -> Result<JsonResponse, HttpError> {
        let payload = match body {
            Some(value) => Bytes::from(value.to_string()),
            None => Bytes::new(),
        };

        let request = Request::builder()
            .method(method)
            .uri(uri.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .body(Full::new(payload))
            .map_err(|_| HttpError::InvalidUrl(uri.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| HttpError::Timeout(self.timeout))?
            .map_err(|e| HttpError::Connection(e.to_string()))?;

        let (parts, incoming) = response.into_parts();
        let bytes = tokio::time::timeout(self.timeout, incoming.collect())
            .await
            .map_err(|_| HttpError::Timeout(self.timeout))?
            .map_err(|e| HttpError::Connection(e.to_string()))?
            .to_bytes();

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| HttpError::NotJson {
                status: parts.status.as_u16(),
                reason: e.to_string(),
            })?
        };

        Ok(JsonResponse {
            status: parts.status,
            body,
        })
    }
}
