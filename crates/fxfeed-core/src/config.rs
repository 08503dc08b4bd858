use std::env;
use std::fmt::{Debug, Formatter};
use std::num::NonZeroU32;
use std::time::Duration;

use crate::endpoint::EndpointPool;
use crate::error::ValidationError;
use crate::history::DEFAULT_BATCH_SIZE;
use crate::retry::RetryPolicy;
use crate::subscription::DEFAULT_POLL_INTERVAL;
use crate::{CurrencyPair, FeedAddress};

pub const ENV_RPC_URLS: &str = "FXFEED_RPC_URLS";
pub const ENV_FEED_ADDRESS: &str = "FXFEED_FEED_ADDRESS";
pub const ENV_SIGNER_KEY: &str = "FXFEED_SIGNER_KEY";
pub const ENV_PAIR: &str = "FXFEED_PAIR";
pub const ENV_POLL_INTERVAL_MS: &str = "FXFEED_POLL_INTERVAL_MS";
pub const ENV_REQUESTS_PER_SECOND: &str = "FXFEED_REQUESTS_PER_SECOND";

pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_millis(60_000);
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Signing credential. Read-only operations never use it; it is carried so
/// a deployment can supply one and it never appears in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SignerKey(String);

impl SignerKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for SignerKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("SignerKey(<redacted>)")
    }
}

/// Validated runtime configuration for a [`crate::PriceFeed`].
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub endpoints: EndpointPool,
    pub feed_address: FeedAddress,
    pub pair: CurrencyPair,
    pub signer_key: Option<SignerKey>,
    /// Default interval for the continuous monitor.
    pub poll_interval: Duration,
    /// Optional pacing applied by the serialization gate.
    pub requests_per_second: Option<NonZeroU32>,
    pub retry: RetryPolicy,
    pub request_timeout_ms: u64,
    pub subscription_poll_interval: Duration,
    pub history_batch_size: u64,
}

impl FeedConfig {
    pub fn builder() -> FeedConfigBuilder {
        FeedConfigBuilder::new()
    }

    /// Reads the `FXFEED_*` environment variables.
    pub fn from_env() -> Result<Self, ValidationError> {
        FeedConfigBuilder::from_lookup(|name| env::var(name).ok())?.build()
    }
}

/// Builder for [`FeedConfig`].
///
/// # Environment Variables
///
/// | Variable | Meaning | Default |
/// |----------|---------|---------|
/// | `FXFEED_RPC_URLS` | comma-separated endpoint pool | required |
/// | `FXFEED_FEED_ADDRESS` | aggregator contract address | required |
/// | `FXFEED_SIGNER_KEY` | signing credential | none |
/// | `FXFEED_PAIR` | `BASE/QUOTE` | `NGN/USD` |
/// | `FXFEED_POLL_INTERVAL_MS` | monitor interval | `60000` |
/// | `FXFEED_REQUESTS_PER_SECOND` | gate pacing | none |
///
/// # Example
///
/// ```rust,ignore
/// use fxfeed_core::FeedConfig;
///
/// let config = FeedConfig::builder()
///     .with_rpc_urls(["https://rpc-a.example", "https://rpc-b.example"])
///     .with_feed_address("0x5e2b26b0a3ef2b2b4f3e6d2b8f3c1f0b9a8d7c6e")
///     .build()?;
/// ```
#[derive(Clone)]
pub struct FeedConfigBuilder {
    rpc_urls: Vec<String>,
    feed_address: Option<String>,
    pair: Option<String>,
    signer_key: Option<SignerKey>,
    poll_interval: Duration,
    requests_per_second: Option<u32>,
    retry: RetryPolicy,
    request_timeout_ms: u64,
    subscription_poll_interval: Duration,
    history_batch_size: u64,
}

impl Default for FeedConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for FeedConfigBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedConfigBuilder")
            .field("rpc_urls", &self.rpc_urls.len())
            .field("feed_address", &self.feed_address)
            .field("pair", &self.pair)
            .field("signer_key", &self.signer_key)
            .field("poll_interval", &self.poll_interval)
            .field("requests_per_second", &self.requests_per_second)
            .finish_non_exhaustive()
    }
}

impl FeedConfigBuilder {
    pub fn new() -> Self {
        Self {
            rpc_urls: Vec::new(),
            feed_address: None,
            pair: None,
            signer_key: None,
            poll_interval: DEFAULT_MONITOR_INTERVAL,
            requests_per_second: None,
            retry: RetryPolicy::default(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            subscription_poll_interval: DEFAULT_POLL_INTERVAL,
            history_batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Populates a builder from a variable lookup. Missing required
    /// variables are reported by [`FeedConfigBuilder::build`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::new();

        if let Some(urls) = lookup(ENV_RPC_URLS) {
            builder.rpc_urls = urls
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_owned)
                .collect();
        }
        builder.feed_address = lookup(ENV_FEED_ADDRESS);
        builder.pair = lookup(ENV_PAIR).filter(|pair| !pair.trim().is_empty());
        builder.signer_key = lookup(ENV_SIGNER_KEY)
            .filter(|key| !key.is_empty())
            .map(SignerKey::new);

        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            let millis = parse_positive(ENV_POLL_INTERVAL_MS, &raw)?;
            builder.poll_interval = Duration::from_millis(millis);
        }
        if let Some(raw) = lookup(ENV_REQUESTS_PER_SECOND) {
            let rate = parse_positive(ENV_REQUESTS_PER_SECOND, &raw)?;
            builder.requests_per_second = Some(u32::try_from(rate).map_err(|_| {
                ValidationError::InvalidNumber {
                    name: ENV_REQUESTS_PER_SECOND,
                    value: raw.clone(),
                }
            })?);
        }

        Ok(builder)
    }

    pub fn with_rpc_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rpc_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_feed_address(mut self, address: impl Into<String>) -> Self {
        self.feed_address = Some(address.into());
        self
    }

    pub fn with_pair(mut self, pair: impl Into<String>) -> Self {
        self.pair = Some(pair.into());
        self
    }

    pub fn with_signer_key(mut self, key: impl Into<String>) -> Self {
        self.signer_key = Some(SignerKey::new(key));
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_requests_per_second(mut self, rate: u32) -> Self {
        self.requests_per_second = Some(rate);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    pub fn with_subscription_poll_interval(mut self, interval: Duration) -> Self {
        self.subscription_poll_interval = interval;
        self
    }

    pub fn with_history_batch_size(mut self, batch_size: u64) -> Self {
        self.history_batch_size = batch_size;
        self
    }

    pub fn build(self) -> Result<FeedConfig, ValidationError> {
        if self.rpc_urls.is_empty() {
            return Err(ValidationError::MissingEnv { name: ENV_RPC_URLS });
        }
        let endpoints = EndpointPool::parse(&self.rpc_urls)?;

        let feed_address = self
            .feed_address
            .as_deref()
            .ok_or(ValidationError::MissingEnv {
                name: ENV_FEED_ADDRESS,
            })
            .and_then(FeedAddress::parse)?;

        let pair = match self.pair.as_deref() {
            Some(pair) => CurrencyPair::parse(pair)?,
            None => CurrencyPair::default(),
        };

        require_nonzero(self.poll_interval.as_millis(), "poll_interval")?;
        require_nonzero(self.subscription_poll_interval.as_millis(), "subscription_poll_interval")?;
        require_nonzero(u128::from(self.request_timeout_ms), "request_timeout_ms")?;
        require_nonzero(u128::from(self.history_batch_size), "history_batch_size")?;

        let requests_per_second = match self.requests_per_second {
            Some(rate) => Some(NonZeroU32::new(rate).ok_or(ValidationError::ZeroValue {
                field: "requests_per_second",
            })?),
            None => None,
        };

        Ok(FeedConfig {
            endpoints,
            feed_address,
            pair,
            signer_key: self.signer_key,
            poll_interval: self.poll_interval,
            requests_per_second,
            retry: self.retry,
            request_timeout_ms: self.request_timeout_ms,
            subscription_poll_interval: self.subscription_poll_interval,
            history_batch_size: self.history_batch_size,
        })
    }
}

fn parse_positive(name: &'static str, raw: &str) -> Result<u64, ValidationError> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ValidationError::InvalidNumber {
            name,
            value: raw.to_owned(),
        }),
    }
}

fn require_nonzero(value: u128, field: &'static str) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::ZeroValue { field });
    }
    Ok(())
}
