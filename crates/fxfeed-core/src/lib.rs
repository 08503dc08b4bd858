//! # fxfeed Core
//!
//! Resilient read access to an on-chain exchange-rate aggregator.
//!
//! ## Overview
//!
//! The aggregator is reachable through several interchangeable JSON-RPC
//! endpoints, any of which may throttle or drop state at any time. This
//! crate hides that behind [`PriceFeed`]:
//!
//! - **Endpoint failover** across an ordered pool
//! - **Classified retry** with exponential backoff
//! - **Serialized access** so at most one provider call is in flight
//! - **At-most-once caching** of values that never change
//! - **Push subscriptions** that follow the feed across endpoint switches
//! - **Batched history** queries over block windows
//! - **Continuous monitoring** of the current price
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`abi`] | Minimal ABI codec for the aggregator read surface |
//! | [`cache`] | Static value cache |
//! | [`config`] | Runtime configuration and environment loading |
//! | [`domain`] | Domain records (Price, RoundData, HistoricalEvent) |
//! | [`endpoint`] | Endpoint and endpoint pool |
//! | [`error`] | Core error types and retry classification |
//! | [`feed`] | The [`PriceFeed`] composition root |
//! | [`gate`] | Serialization gate |
//! | [`history`] | Block-window planning |
//! | [`http_client`] | HTTP client abstraction |
//! | [`monitor`] | Repeating price poll |
//! | [`quote`] | Raw answer to rate-pair translation |
//! | [`retry`] | Retry executor and backoff |
//! | [`rpc`] | JSON-RPC client and failure classification |
//! | [`scripted`] | Deterministic in-process provider |
//! | [`subscription`] | Push-subscription registry |
//! | [`transport`] | Transport handle trait and JSON-RPC binding |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fxfeed_core::{FeedConfig, PriceFeed};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FeedConfig::from_env()?;
//!     let feed = PriceFeed::connect(config)?;
//!
//!     let price = feed.get_current_price().await?;
//!     println!("{}", price.direct_display);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / Caller   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │   PriceFeed     │────▶│  Retry Executor  │──── rotate ───┐
//! └────────┬────────┘     └────────┬─────────┘               │
//!          │                       ▼                         ▼
//!          │              ┌──────────────────┐     ┌──────────────────┐
//!          │              │ Serialization    │     │  Endpoint Pool   │
//!          │              │ Gate             │     │  + Subscriptions │
//!          │              └────────┬─────────┘     └──────────────────┘
//!          │                       ▼
//!          │              ┌──────────────────┐     ┌──────────────────┐
//!          │              │ Transport Handle │────▶│ JSON-RPC / HTTP  │
//!          │              └──────────────────┘     └──────────────────┘
//!          ▼
//! ┌─────────────────┐
//! │ Quote / Domain  │
//! └─────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Provider failures are classified once, at the transport boundary:
//!
//! ```rust
//! use fxfeed_core::{ErrorClass, FeedError, TransportError};
//!
//! let error = FeedError::from(TransportError::rate_limited("http status 429"));
//! match error.class() {
//!     ErrorClass::Transient => {
//!         // Rotate to the next endpoint, back off, retry
//!     }
//!     ErrorClass::Other => {
//!         // Retry on the same endpoint
//!     }
//!     ErrorClass::Fatal => {
//!         // Report to the caller
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - Endpoint URLs are logged by scheme and host only
//! - The signing credential is held in memory and never logged

pub mod abi;
pub mod cache;
pub mod config;
pub mod domain;
pub mod endpoint;
pub mod error;
pub mod feed;
pub mod gate;
pub mod history;
pub mod http_client;
pub mod monitor;
pub mod quote;
pub mod retry;
pub mod rpc;
pub mod scripted;
pub mod subscription;
pub mod transport;

// Re-export commonly used types at crate root for convenience

// Caching
pub use cache::{StaticKey, StaticSlot, StaticValueCache};

// Configuration
pub use config::{FeedConfig, FeedConfigBuilder, SignerKey};

// Domain models
pub use domain::{
    validate_currency_code, AnswerUpdatedLog, CurrencyPair, FeedAddress, HistoricalEvent, Price,
    RoundData, RoundId, UtcDateTime,
};

// Endpoints
pub use endpoint::{Endpoint, EndpointPool};

// Error types
pub use error::{ErrorClass, FeedError, RateError, ValidationError};

// Composition root
pub use feed::{PriceFeed, PriceFeedBuilder};

// Serialization gate
pub use gate::{GatePermit, SerializationGate};

// History
pub use history::{plan_windows, BlockWindow};

// HTTP client types
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};

// Monitoring
pub use monitor::{MonitorHandle, PriceReporter};

// Quotes
pub use quote::RateQuote;

// Retry logic
pub use retry::{Backoff, RecordingSleeper, RetryExecutor, RetryPolicy, Sleeper, TokioSleeper};

// Scripted provider
pub use scripted::{ScriptedProvider, ScriptedTransport, ScriptedTransportFactory};

// Subscriptions
pub use subscription::{EventHandler, FeedEvent, SubscriptionManager};

// Transport
pub use transport::{
    FeedTransport, FilterId, RpcFeedTransport, RpcTransportFactory, TransportError,
    TransportErrorKind, TransportFactory,
};
