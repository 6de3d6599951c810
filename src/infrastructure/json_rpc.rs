//! JSON-RPC 2.0 over HTTP POST

use http::{Method, Uri};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::http::{HttpError, JsonHttpClient};
use super::log_messages::transport as messages;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("RPC error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("Malformed RPC response: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Client for a single JSON-RPC endpoint
pub struct JsonRpcClient {
    endpoint: Uri,
    http: JsonHttpClient,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, RpcError> {
        Ok(Self {
            endpoint: JsonHttpClient::parse_uri(url)?,
            http: JsonHttpClient::new(timeout),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    /// Call `method` and decode its `result`
    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R, RpcError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "{}", messages::RPC_CALL);

        let response = self
            .http
            .send(Method::POST, self.endpoint.clone(), Some(&request))
            .await?;

        let decoded: RpcResponse = serde_json::from_value(response.body).map_err(|e| {
            RpcError::Malformed(format!("HTTP {} with unexpected body: {e}", response.status))
        })?;

        if let Some(error) = decoded.error {
            warn!(method, code = error.code, reason = %error.message, "{}", messages::RPC_REJECTED);
            return Err(RpcError::Remote {
                code: error.code,
                message: error.message,
            });
        }

        serde_json::from_value(decoded.result.unwrap_or(Value::Null))
            .map_err(|e| RpcError::Malformed(format!("{method} result: {e}")))
    }
}
