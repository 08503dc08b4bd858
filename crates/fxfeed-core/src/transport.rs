//! Transport handle: a typed proxy to the aggregator bound to one endpoint.
//!
//! [`FeedTransport`] is the seam between the resilience layer and the wire.
//! [`RpcFeedTransport`] speaks JSON-RPC over HTTP; the `scripted` module
//! provides a deterministic in-process implementation.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::json;

use crate::abi;
use crate::endpoint::Endpoint;
use crate::error::FeedError;
use crate::history::BlockWindow;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::rpc::{JsonRpcClient, RawLog};
use crate::subscription::FeedEvent;
use crate::{AnswerUpdatedLog, FeedAddress, RoundData};

/// Transport-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Provider throttled the request.
    RateLimited,
    /// A previously installed log filter is gone on the provider side.
    FilterExpired,
    /// No response was received (connect failure, reset).
    Connection,
    /// The request exceeded its timeout budget.
    Timeout,
    /// Provider answered with a server-side failure status.
    Unavailable,
    /// Provider answered with a JSON-RPC error that is not classified.
    Rpc,
    /// Response could not be decoded.
    Decode,
}

/// Structured transport error produced at the wire boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::RateLimited, message)
    }

    pub fn filter_expired(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::FilterExpired, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connection, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Unavailable, message)
    }

    pub fn rpc(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Rpc, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Decode, message)
    }

    pub const fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Rate limiting and expired filters are cured by switching endpoints.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::RateLimited | TransportErrorKind::FilterExpired
        )
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            TransportErrorKind::RateLimited => "transport.rate_limited",
            TransportErrorKind::FilterExpired => "transport.filter_expired",
            TransportErrorKind::Connection => "transport.connection",
            TransportErrorKind::Timeout => "transport.timeout",
            TransportErrorKind::Unavailable => "transport.unavailable",
            TransportErrorKind::Rpc => "transport.rpc",
            TransportErrorKind::Decode => "transport.decode",
        }
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for TransportError {}

/// Provider-side identifier of an installed log filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterId(pub String);

impl Display for FilterId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub type TransportFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Typed proxy to the aggregator's read surface.
///
/// Implementations are bound to exactly one endpoint for their lifetime.
pub trait FeedTransport: Send + Sync {
    fn endpoint(&self) -> &Endpoint;

    fn decimals(&self) -> TransportFuture<'_, u8>;

    fn description(&self) -> TransportFuture<'_, String>;

    fn latest_answer(&self) -> TransportFuture<'_, i128>;

    fn latest_round_data(&self) -> TransportFuture<'_, RoundData>;

    fn block_number(&self) -> TransportFuture<'_, u64>;

    /// `AnswerUpdated` logs within the inclusive window, in provider order.
    fn answer_updated_logs(
        &self,
        window: BlockWindow,
    ) -> TransportFuture<'_, Vec<AnswerUpdatedLog>>;

    fn install_filter(&self, event: FeedEvent) -> TransportFuture<'_, FilterId>;

    fn filter_changes<'a>(
        &'a self,
        filter: &'a FilterId,
    ) -> TransportFuture<'a, Vec<AnswerUpdatedLog>>;

    fn uninstall_filter<'a>(&'a self, filter: &'a FilterId) -> TransportFuture<'a, bool>;
}

/// Builds a transport handle for an endpoint. Called on startup and on
/// every rotation.
pub trait TransportFactory: Send + Sync {
    fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn FeedTransport>, FeedError>;
}

/// JSON-RPC backed transport handle.
pub struct RpcFeedTransport {
    rpc: JsonRpcClient,
    address: FeedAddress,
}

impl RpcFeedTransport {
    pub fn new(rpc: JsonRpcClient, address: FeedAddress) -> Self {
        Self { rpc, address }
    }

    async fn eth_call(&self, selector: &str) -> Result<String, TransportError> {
        self.rpc
            .call_as::<String>(
                "eth_call",
                json!([{ "to": self.address.as_str(), "data": selector }, "latest"]),
            )
            .await
    }

    fn decode_logs(raw: Vec<RawLog>) -> Result<Vec<AnswerUpdatedLog>, TransportError> {
        raw.into_iter()
            .filter(|log| !log.removed)
            .map(|log| {
                let block_number = log
                    .block_number
                    .as_deref()
                    .map(abi::parse_quantity)
                    .transpose()?
                    .unwrap_or_default();
                abi::decode_answer_updated(
                    block_number,
                    log.transaction_hash.unwrap_or_default(),
                    &log.topics,
                    &log.data,
                )
            })
            .collect()
    }
}

impl FeedTransport for RpcFeedTransport {
    fn endpoint(&self) -> &Endpoint {
        self.rpc.endpoint()
    }

    fn decimals(&self) -> TransportFuture<'_, u8> {
        Box::pin(async move { abi::decode_decimals(&self.eth_call(abi::DECIMALS_SELECTOR).await?) })
    }

    fn description(&self) -> TransportFuture<'_, String> {
        Box::pin(async move {
            abi::decode_string(&self.eth_call(abi::DESCRIPTION_SELECTOR).await?)
        })
    }

    fn latest_answer(&self) -> TransportFuture<'_, i128> {
        Box::pin(async move {
            abi::decode_answer(&self.eth_call(abi::LATEST_ANSWER_SELECTOR).await?)
        })
    }

    fn latest_round_data(&self) -> TransportFuture<'_, RoundData> {
        Box::pin(async move {
            abi::decode_round_data(&self.eth_call(abi::LATEST_ROUND_DATA_SELECTOR).await?)
        })
    }

    fn block_number(&self) -> TransportFuture<'_, u64> {
        Box::pin(async move {
            let quantity = self
                .rpc
                .call_as::<String>("eth_blockNumber", json!([]))
                .await?;
            abi::parse_quantity(&quantity)
        })
    }

    fn answer_updated_logs(
        &self,
        window: BlockWindow,
    ) -> TransportFuture<'_, Vec<AnswerUpdatedLog>> {
        Box::pin(async move {
            let raw = self
                .rpc
                .call_as::<Vec<RawLog>>(
                    "eth_getLogs",
                    json!([{
                        "address": self.address.as_str(),
                        "fromBlock": abi::format_quantity(window.from_block),
                        "toBlock": abi::format_quantity(window.to_block),
                        "topics": [abi::ANSWER_UPDATED_TOPIC],
                    }]),
                )
                .await?;
            Self::decode_logs(raw)
        })
    }

    fn install_filter(&self, event: FeedEvent) -> TransportFuture<'_, FilterId> {
        Box::pin(async move {
            let id = self
                .rpc
                .call_as::<String>(
                    "eth_newFilter",
                    json!([{
                        "address": self.address.as_str(),
                        "topics": [event.topic()],
                    }]),
                )
                .await?;
            Ok(FilterId(id))
        })
    }

    fn filter_changes<'a>(
        &'a self,
        filter: &'a FilterId,
    ) -> TransportFuture<'a, Vec<AnswerUpdatedLog>> {
        Box::pin(async move {
            let raw = self
                .rpc
                .call_as::<Vec<RawLog>>("eth_getFilterChanges", json!([filter.0]))
                .await?;
            Self::decode_logs(raw)
        })
    }

    fn uninstall_filter<'a>(&'a self, filter: &'a FilterId) -> TransportFuture<'a, bool> {
        Box::pin(async move {
            self.rpc
                .call_as::<bool>("eth_uninstallFilter", json!([filter.0]))
                .await
        })
    }
}

/// Factory producing [`RpcFeedTransport`] handles sharing one HTTP client.
#[derive(Clone)]
pub struct RpcTransportFactory {
    http_client: Arc<dyn HttpClient>,
    address: FeedAddress,
    timeout_ms: u64,
}

impl RpcTransportFactory {
    pub fn new(address: FeedAddress, timeout_ms: u64) -> Result<Self, FeedError> {
        let http_client = ReqwestHttpClient::new()
            .map_err(|error| FeedError::construction("<http client>", error.message()))?;
        Ok(Self::with_http_client(Arc::new(http_client), address, timeout_ms))
    }

    pub fn with_http_client(
        http_client: Arc<dyn HttpClient>,
        address: FeedAddress,
        timeout_ms: u64,
    ) -> Self {
        Self {
            http_client,
            address,
            timeout_ms,
        }
    }
}

impl TransportFactory for RpcTransportFactory {
    fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn FeedTransport>, FeedError> {
        let rpc = JsonRpcClient::new(
            Arc::clone(&self.http_client),
            endpoint.clone(),
            self.timeout_ms,
        );
        Ok(Arc::new(RpcFeedTransport::new(rpc, self.address.clone())))
    }
}
