//! Composition root: the resilient price feed.
//!
//! [`PriceFeed`] owns one endpoint pool, one current transport handle, the
//! serialization gate, the static value cache, the subscription registry
//! and at most one running monitor. Every provider call flows through
//! [`RetryExecutor`] and the gate; transient failures rotate the pool.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use tracing::{info, warn};

use crate::cache::StaticValueCache;
use crate::config::FeedConfig;
use crate::endpoint::{Endpoint, EndpointPool};
use crate::error::{FeedError, ValidationError};
use crate::gate::SerializationGate;
use crate::history::plan_windows;
use crate::monitor::{log_reporter, MonitorHandle, PriceReporter};
use crate::quote::RateQuote;
use crate::retry::{RetryExecutor, Sleeper, TokioSleeper};
use crate::subscription::{EventHandler, FeedEvent, SubscriptionManager};
use crate::transport::{FeedTransport, RpcTransportFactory, TransportFactory};
use crate::{HistoricalEvent, Price, RoundData};

struct FeedInner {
    config: FeedConfig,
    pool: Mutex<EndpointPool>,
    transport: RwLock<Arc<dyn FeedTransport>>,
    rotation: tokio::sync::Mutex<()>,
    factory: Arc<dyn TransportFactory>,
    gate: SerializationGate,
    cache: StaticValueCache,
    subscriptions: SubscriptionManager,
    retry: RetryExecutor,
    monitor: Mutex<Option<MonitorHandle>>,
}

impl FeedInner {
    fn pool(&self) -> MutexGuard<'_, EndpointPool> {
        self.pool.lock().expect("endpoint pool lock is not poisoned")
    }

    fn current_transport(&self) -> Arc<dyn FeedTransport> {
        Arc::clone(
            &self
                .transport
                .read()
                .expect("transport handle lock is not poisoned"),
        )
    }

    fn monitor(&self) -> MutexGuard<'_, Option<MonitorHandle>> {
        self.monitor.lock().expect("monitor lock is not poisoned")
    }
}

/// Builder for [`PriceFeed`].
pub struct PriceFeedBuilder {
    config: FeedConfig,
    factory: Option<Arc<dyn TransportFactory>>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl PriceFeedBuilder {
    /// Replaces the JSON-RPC transport factory.
    pub fn with_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Replaces the timer used for backoff waits.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Connects the transport for the first endpoint of the pool.
    pub fn build(self) -> Result<PriceFeed, FeedError> {
        let config = self.config;
        let factory = match self.factory {
            Some(factory) => factory,
            None => Arc::new(RpcTransportFactory::new(
                config.feed_address.clone(),
                config.request_timeout_ms,
            )?),
        };

        let pool = config.endpoints.clone();
        let transport = factory.connect(pool.current())?;
        let gate = SerializationGate::new(config.requests_per_second);
        let subscriptions =
            SubscriptionManager::new(gate.clone(), config.subscription_poll_interval);
        let retry = RetryExecutor::new(
            config.retry.clone(),
            self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper)),
        );

        info!(
            endpoint = %pool.current(),
            endpoints = pool.len(),
            pair = %config.pair,
            "price feed ready"
        );

        Ok(PriceFeed {
            inner: Arc::new(FeedInner {
                config,
                pool: Mutex::new(pool),
                transport: RwLock::new(transport),
                rotation: tokio::sync::Mutex::new(()),
                factory,
                gate,
                cache: StaticValueCache::default(),
                subscriptions,
                retry,
                monitor: Mutex::new(None),
            }),
        })
    }
}

/// Resilient access to one exchange-rate feed.
///
/// Cloning is cheap; clones share every piece of state.
#[derive(Clone)]
pub struct PriceFeed {
    inner: Arc<FeedInner>,
}

impl PriceFeed {
    pub fn builder(config: FeedConfig) -> PriceFeedBuilder {
        PriceFeedBuilder {
            config,
            factory: None,
            sleeper: None,
        }
    }

    /// Builds a feed over JSON-RPC using the default timer.
    pub fn connect(config: FeedConfig) -> Result<Self, FeedError> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &FeedConfig {
        &self.inner.config
    }

    pub fn current_endpoint(&self) -> Endpoint {
        self.inner.pool().current().clone()
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.inner.pool().endpoints().to_vec()
    }

    pub fn cache(&self) -> &StaticValueCache {
        &self.inner.cache
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.inner.subscriptions
    }

    /// Reads the latest answer and derives both rate directions.
    pub async fn get_current_price(&self) -> Result<Price, FeedError> {
        let decimals = self.decimals().await?;
        let description = self.description().await?;
        let answer = self
            .read("latest_answer", |transport| async move {
                transport.latest_answer().await.map_err(FeedError::from)
            })
            .await?;

        let pair = self.inner.config.pair.clone();
        let quote = RateQuote::from_answer(answer, decimals, &pair)?;
        Ok(Price::new(pair, quote, description))
    }

    pub async fn get_latest_round_data(&self) -> Result<RoundData, FeedError> {
        self.read("latest_round_data", |transport| async move {
            transport.latest_round_data().await.map_err(FeedError::from)
        })
        .await
    }

    /// Scale of the feed's answers, fetched at most once.
    pub async fn decimals(&self) -> Result<u8, FeedError> {
        self.inner
            .cache
            .decimals
            .get_or_fetch(|| {
                self.read("decimals", |transport| async move {
                    transport.decimals().await.map_err(FeedError::from)
                })
            })
            .await
    }

    /// Human-readable feed description, fetched at most once.
    pub async fn description(&self) -> Result<String, FeedError> {
        self.inner
            .cache
            .description
            .get_or_fetch(|| {
                self.read("description", |transport| async move {
                    transport.description().await.map_err(FeedError::from)
                })
            })
            .await
    }

    /// Subscribes `handler` to `AnswerUpdated` pushes.
    ///
    /// The subscription follows the feed across endpoint rotations.
    pub async fn setup_event_listeners(&self, handler: EventHandler) -> Result<(), FeedError> {
        let subscriptions = &self.inner.subscriptions;
        self.inner
            .retry
            .execute(
                "setup_event_listeners",
                |_attempt| {
                    let transport = self.inner.current_transport();
                    let handler = Arc::clone(&handler);
                    async move {
                        subscriptions
                            .subscribe(FeedEvent::AnswerUpdated, handler, transport)
                            .await
                    }
                },
                || self.rotate_after_failure(),
            )
            .await
    }

    /// `AnswerUpdated` events from the last `block_range` blocks, oldest
    /// first.
    ///
    /// The range is split into windows of `batch_size` blocks (the configured
    /// default when `None`). A window that still fails after retries is
    /// logged and contributes no events.
    pub async fn query_historical_events(
        &self,
        block_range: u64,
        batch_size: Option<u64>,
    ) -> Result<Vec<HistoricalEvent>, FeedError> {
        let batch_size = batch_size.unwrap_or(self.inner.config.history_batch_size);
        if batch_size == 0 {
            return Err(ValidationError::ZeroValue {
                field: "batch_size",
            }
            .into());
        }

        let decimals = self.decimals().await?;
        let head = self
            .read("block_number", |transport| async move {
                transport.block_number().await.map_err(FeedError::from)
            })
            .await?;
        let windows = plan_windows(head, block_range, batch_size)?;
        let pair = &self.inner.config.pair;

        let mut events = Vec::new();
        for window in windows {
            let logs = self
                .read("answer_updated_logs", move |transport| async move {
                    transport.answer_updated_logs(window).await.map_err(FeedError::from)
                })
                .await;

            match logs {
                Ok(logs) => events.extend(
                    logs.into_iter()
                        .map(|log| HistoricalEvent::from_log(log, decimals, pair)),
                ),
                Err(error) => warn!(
                    from_block = window.from_block,
                    to_block = window.to_block,
                    error = %error,
                    "history window failed; skipping"
                ),
            }
        }

        Ok(events)
    }

    /// Starts the monitor with the logging reporter.
    pub fn monitor_price(&self, interval: Duration) -> Result<(), FeedError> {
        self.monitor_price_with(interval, log_reporter())
    }

    /// Polls the current price now and then every `interval`, handing each
    /// price to `reporter`. Replaces a monitor that is already running.
    pub fn monitor_price_with(
        &self,
        interval: Duration,
        reporter: PriceReporter,
    ) -> Result<(), FeedError> {
        let source = Arc::downgrade(&self.inner);
        let handle = MonitorHandle::spawn(
            interval,
            move || {
                source.upgrade().map(|inner| async move {
                    PriceFeed { inner }.get_current_price().await
                })
            },
            reporter,
        )?;

        if let Some(previous) = self.inner.monitor().replace(handle) {
            previous.stop();
        }
        Ok(())
    }

    /// Cancels the monitor, forgets the desired set and tears down
    /// subscriptions. Does nothing harmful when nothing is running.
    ///
    /// The desired set is cleared first so a rotation that is still
    /// re-establishing subscriptions cannot bring one back.
    pub async fn stop_monitoring(&self) {
        let previous = self.inner.monitor().take();
        if let Some(monitor) = previous {
            monitor.stop();
            info!("price monitor stopped");
        }
        self.inner.subscriptions.clear();
        self.inner.subscriptions.teardown_all().await;
    }

    pub fn is_monitoring(&self) -> bool {
        self.inner
            .monitor()
            .as_ref()
            .is_some_and(MonitorHandle::is_running)
    }

    /// Moves to the next endpoint and rebuilds subscriptions there.
    ///
    /// The new handle is built before anything changes, so a construction
    /// failure leaves the current endpoint and its subscriptions in place.
    pub async fn rotate_endpoint(&self) -> Result<Endpoint, FeedError> {
        let inner = &self.inner;
        let _rotation = inner.rotation.lock().await;

        let mut next_pool = inner.pool().clone();
        let previous = next_pool.current().clone();
        let endpoint = next_pool.rotate().clone();
        let transport = inner.factory.connect(&endpoint)?;

        inner.subscriptions.teardown_all().await;
        *inner
            .transport
            .write()
            .expect("transport handle lock is not poisoned") = Arc::clone(&transport);
        *inner.pool() = next_pool;
        info!(from = %previous, to = %endpoint, "rotated provider endpoint");

        let failures = inner.subscriptions.reestablish(transport).await;
        if failures > 0 {
            warn!(endpoint = %endpoint, failures, "some subscriptions were not re-established");
        }
        Ok(endpoint)
    }

    async fn rotate_after_failure(&self) -> Result<(), FeedError> {
        self.rotate_endpoint().await.map(|_| ())
    }

    /// Runs one gated provider call under the retry policy against whatever
    /// transport is current at each attempt.
    async fn read<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T, FeedError>
    where
        F: FnMut(Arc<dyn FeedTransport>) -> Fut,
        Fut: std::future::Future<Output = Result<T, FeedError>>,
    {
        let gate = &self.inner.gate;
        self.inner
            .retry
            .execute(
                label,
                |_attempt| {
                    let pending = call(self.inner.current_transport());
                    async move {
                        let _permit = gate.acquire().await?;
                        pending.await
                    }
                },
                || self.rotate_after_failure(),
            )
            .await
    }
}
