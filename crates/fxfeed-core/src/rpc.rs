//! JSON-RPC 2.0 client bound to a single endpoint.
//!
//! This is the only place that inspects raw provider failures. Every
//! failure leaves here as a [`TransportError`] whose kind was assigned by
//! [`classify_rpc_error`] or [`classify_http_status`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::http_client::{HttpClient, HttpRequest};
use crate::transport::{TransportError, TransportErrorKind};

/// JSON-RPC error codes providers use for throttling.
const RATE_LIMIT_CODES: [i64; 3] = [-32005, -32029, 429];

const RATE_LIMIT_PHRASES: [&str; 4] = [
    "rate limit",
    "too many requests",
    "request limit",
    "compute units per second",
];

const FILTER_EXPIRED_PHRASES: [&str; 3] =
    ["filter not found", "filter does not exist", "unknown filter"];

/// Maps a JSON-RPC error object to the transport taxonomy.
pub fn classify_rpc_error(code: i64, message: &str) -> TransportErrorKind {
    let lowered = message.to_ascii_lowercase();

    if FILTER_EXPIRED_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
    {
        return TransportErrorKind::FilterExpired;
    }

    if RATE_LIMIT_CODES.contains(&code)
        || RATE_LIMIT_PHRASES
            .iter()
            .any(|phrase| lowered.contains(phrase))
    {
        return TransportErrorKind::RateLimited;
    }

    TransportErrorKind::Rpc
}

/// Maps a non-2xx HTTP status to the transport taxonomy.
pub fn classify_http_status(status: u16) -> TransportErrorKind {
    match status {
        429 => TransportErrorKind::RateLimited,
        500..=599 => TransportErrorKind::Unavailable,
        _ => TransportErrorKind::Rpc,
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Clone, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl RpcErrorObject {
    fn into_transport_error(self, method: &str) -> TransportError {
        let kind = classify_rpc_error(self.code, &self.message);
        TransportError::new(
            kind,
            format!("{method} failed with rpc error {}: {}", self.code, self.message),
        )
    }
}

/// Raw log object as returned by `eth_getLogs` and `eth_getFilterChanges`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(default)]
    pub removed: bool,
}

/// JSON-RPC client for one endpoint.
pub struct JsonRpcClient {
    http_client: Arc<dyn HttpClient>,
    endpoint: Endpoint,
    timeout_ms: u64,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(http_client: Arc<dyn HttpClient>, endpoint: Endpoint, timeout_ms: u64) -> Self {
        Self {
            http_client,
            endpoint,
            timeout_ms,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::to_string(&RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        })
        .map_err(|e| TransportError::decode(format!("failed to encode {method} request: {e}")))?;

        debug!(endpoint = %self.endpoint, method, id, "rpc request");

        let request =
            HttpRequest::post_json(self.endpoint.as_str(), body).with_timeout_ms(self.timeout_ms);
        let response = self.http_client.execute(request).await.map_err(|error| {
            let message = format!("{method} transport error: {}", error.message());
            if error.is_timeout() {
                TransportError::timeout(message)
            } else {
                TransportError::connection(message)
            }
        })?;

        let parsed = serde_json::from_str::<RpcResponse>(&response.body);

        if !response.is_success() {
            // Prefer the JSON-RPC error body when the provider sends one.
            if response.status != 429 {
                if let Ok(RpcResponse {
                    error: Some(error), ..
                }) = parsed
                {
                    return Err(error.into_transport_error(method));
                }
            }
            return Err(TransportError::new(
                classify_http_status(response.status),
                format!("{method} returned http status {}", response.status),
            ));
        }

        let parsed = parsed.map_err(|e| {
            TransportError::decode(format!("failed to parse {method} response: {e}"))
        })?;

        if let Some(error) = parsed.error {
            return Err(error.into_transport_error(method));
        }

        parsed
            .result
            .ok_or_else(|| TransportError::decode(format!("{method} response has no result")))
    }

    pub async fn call_as<T>(&self, method: &str, params: Value) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        let value = self.call(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| TransportError::decode(format!("unexpected {method} result shape: {e}")))
    }
}
