//! Declarative push-subscription registry.
//!
//! The manager keeps two maps. The *desired* set records which events the
//! caller wants and the handler for each; it survives endpoint switches.
//! The *installed* registry holds what currently exists on a transport
//! handle: the provider filter id, the handle it lives on and the task
//! polling it. On rotation the feed tears the registry down against the
//! old handle and rebuilds it from the desired set on the new one.
//!
//! Pollers never rotate. A throttled poll is logged with its retry class
//! and polling continues on the same handle; the endpoint only changes
//! when a read exhausts its transient failures.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::abi;
use crate::endpoint::Endpoint;
use crate::error::FeedError;
use crate::gate::SerializationGate;
use crate::transport::{FeedTransport, FilterId, TransportErrorKind};
use crate::AnswerUpdatedLog;

/// Default interval between filter polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(4);

/// Provider events a caller can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FeedEvent {
    AnswerUpdated,
}

impl FeedEvent {
    pub const fn name(self) -> &'static str {
        match self {
            Self::AnswerUpdated => "AnswerUpdated",
        }
    }

    /// Log topic0 identifying the event.
    pub const fn topic(self) -> &'static str {
        match self {
            Self::AnswerUpdated => abi::ANSWER_UPDATED_TOPIC,
        }
    }
}

impl Display for FeedEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Callback receiving each decoded event.
pub type EventHandler = Arc<dyn Fn(AnswerUpdatedLog) + Send + Sync>;

struct InstalledSubscription {
    filter: Arc<Mutex<FilterId>>,
    transport: Arc<dyn FeedTransport>,
    poller: JoinHandle<()>,
}

/// Registry of desired and installed subscriptions.
pub struct SubscriptionManager {
    gate: SerializationGate,
    poll_interval: Duration,
    desired: Mutex<BTreeMap<FeedEvent, EventHandler>>,
    installed: Mutex<BTreeMap<FeedEvent, InstalledSubscription>>,
}

impl SubscriptionManager {
    pub fn new(gate: SerializationGate, poll_interval: Duration) -> Self {
        Self {
            gate,
            poll_interval,
            desired: Mutex::new(BTreeMap::new()),
            installed: Mutex::new(BTreeMap::new()),
        }
    }

    fn desired(&self) -> MutexGuard<'_, BTreeMap<FeedEvent, EventHandler>> {
        self.desired
            .lock()
            .expect("desired subscription lock is not poisoned")
    }

    fn registry(&self) -> MutexGuard<'_, BTreeMap<FeedEvent, InstalledSubscription>> {
        self.installed
            .lock()
            .expect("installed subscription lock is not poisoned")
    }

    /// Records `event -> handler` as desired and installs it on `transport`.
    ///
    /// A different handler for the same event replaces the previous one and
    /// its installation. Installing twice on the same handle is a no-op.
    pub async fn subscribe(
        &self,
        event: FeedEvent,
        handler: EventHandler,
        transport: Arc<dyn FeedTransport>,
    ) -> Result<(), FeedError> {
        let previous_handler = self.desired().insert(event, Arc::clone(&handler));
        let replaced = previous_handler.is_some_and(|previous| !Arc::ptr_eq(&previous, &handler));
        if replaced {
            // The running poller captured the old handler.
            let previous = self.registry().remove(&event);
            if let Some(previous) = previous {
                self.dispose(event, previous).await;
            }
        }
        self.install(event, transport).await
    }

    /// Aborts every poller and uninstalls every filter.
    ///
    /// Failures are logged and swallowed; the registry is empty afterwards.
    pub async fn teardown_all(&self) {
        let drained = std::mem::take(&mut *self.registry());
        for (event, subscription) in drained {
            self.dispose(event, subscription).await;
        }
    }

    /// Installs every desired event on `transport` and returns the number
    /// of events that failed to install.
    pub async fn reestablish(&self, transport: Arc<dyn FeedTransport>) -> usize {
        let events: Vec<FeedEvent> = self.desired().keys().copied().collect();
        let mut failures = 0;

        for event in events {
            if let Err(error) = self.install(event, Arc::clone(&transport)).await {
                failures += 1;
                warn!(
                    event = event.name(),
                    endpoint = %transport.endpoint(),
                    error = %error,
                    "failed to re-establish subscription"
                );
            }
        }

        if failures == 0 {
            debug!(endpoint = %transport.endpoint(), "subscriptions re-established");
        }
        failures
    }

    pub fn desired_events(&self) -> Vec<FeedEvent> {
        self.desired().keys().copied().collect()
    }

    /// Installed events and the endpoint each one lives on.
    pub fn installed(&self) -> Vec<(FeedEvent, Endpoint)> {
        self.registry()
            .iter()
            .map(|(event, subscription)| (*event, subscription.transport.endpoint().clone()))
            .collect()
    }

    /// Forgets the desired set. Installed subscriptions are left alone.
    pub fn clear(&self) {
        self.desired().clear();
    }

    async fn install(
        &self,
        event: FeedEvent,
        transport: Arc<dyn FeedTransport>,
    ) -> Result<(), FeedError> {
        let already_installed = self
            .registry()
            .get(&event)
            .is_some_and(|existing| Arc::ptr_eq(&existing.transport, &transport));
        if already_installed {
            return Ok(());
        }

        let handler = self.desired().get(&event).cloned();
        let Some(handler) = handler else {
            return Ok(());
        };

        let filter = {
            let _permit = self.gate.acquire().await?;
            transport.install_filter(event).await?
        };

        // The desired set may have changed while the filter was being
        // installed; the registry only admits filters that are still wanted.
        let admitted = {
            let desired = self.desired();
            let still_wanted = desired
                .get(&event)
                .is_some_and(|current| Arc::ptr_eq(current, &handler));
            if still_wanted {
                Ok(self.admit(event, handler, filter, Arc::clone(&transport)))
            } else {
                Err(filter)
            }
        };

        match admitted {
            Ok(Some(previous)) => self.dispose(event, previous).await,
            Ok(None) => {}
            Err(filter) => {
                debug!(
                    event = event.name(),
                    endpoint = %transport.endpoint(),
                    filter = %filter,
                    "subscription no longer desired; removing new filter"
                );
                self.uninstall(event, transport.as_ref(), filter).await;
            }
        }
        Ok(())
    }

    /// Starts the poller and records the installation. Returns the entry it
    /// replaced, if any.
    fn admit(
        &self,
        event: FeedEvent,
        handler: EventHandler,
        filter: FilterId,
        transport: Arc<dyn FeedTransport>,
    ) -> Option<InstalledSubscription> {
        info!(
            event = event.name(),
            endpoint = %transport.endpoint(),
            filter = %filter,
            "subscription installed"
        );

        let filter = Arc::new(Mutex::new(filter));
        let poller = tokio::spawn(poll_filter(PollContext {
            event,
            handler,
            filter: Arc::clone(&filter),
            transport: Arc::clone(&transport),
            gate: self.gate.clone(),
            interval: self.poll_interval,
        }));

        self.registry().insert(
            event,
            InstalledSubscription {
                filter,
                transport,
                poller,
            },
        )
    }

    async fn dispose(&self, event: FeedEvent, subscription: InstalledSubscription) {
        subscription.poller.abort();
        let filter = current_filter(&subscription.filter);
        self.uninstall(event, subscription.transport.as_ref(), filter).await;
    }

    async fn uninstall(&self, event: FeedEvent, transport: &dyn FeedTransport, filter: FilterId) {
        let endpoint = transport.endpoint();
        let result = match self.gate.acquire().await {
            Ok(_permit) => transport
                .uninstall_filter(&filter)
                .await
                .map_err(FeedError::from),
            Err(error) => Err(error),
        };

        match result {
            Ok(_) => debug!(
                event = event.name(),
                endpoint = %endpoint,
                filter = %filter,
                "subscription removed"
            ),
            Err(error) => warn!(
                event = event.name(),
                endpoint = %endpoint,
                filter = %filter,
                error = %error,
                "failed to remove subscription; continuing"
            ),
        }
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        if let Ok(registry) = self.installed.get_mut() {
            for subscription in registry.values() {
                subscription.poller.abort();
            }
        }
    }
}

fn current_filter(filter: &Mutex<FilterId>) -> FilterId {
    filter
        .lock()
        .expect("filter id lock is not poisoned")
        .clone()
}

struct PollContext {
    event: FeedEvent,
    handler: EventHandler,
    filter: Arc<Mutex<FilterId>>,
    transport: Arc<dyn FeedTransport>,
    gate: SerializationGate,
    interval: Duration,
}

/// Delivers filter changes until aborted.
///
/// An expired filter is reinstalled on the same handle. Any other failure,
/// including throttling, is logged with its [`ErrorClass`](crate::ErrorClass)
/// and the next tick tries again.
async fn poll_filter(ctx: PollContext) {
    let mut ticker = tokio::time::interval(ctx.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the filter was just installed.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let filter = current_filter(&ctx.filter);
        let changes = {
            let Ok(_permit) = ctx.gate.acquire().await else {
                return;
            };
            ctx.transport.filter_changes(&filter).await
        };

        match changes {
            Ok(logs) => {
                for log in logs {
                    (ctx.handler)(log);
                }
            }
            Err(error) if error.kind() == TransportErrorKind::FilterExpired => {
                warn!(
                    event = ctx.event.name(),
                    endpoint = %ctx.transport.endpoint(),
                    error = %error,
                    "subscription filter expired; reinstalling"
                );
                reinstall(&ctx).await;
            }
            Err(error) => {
                let error = FeedError::from(error);
                warn!(
                    event = ctx.event.name(),
                    endpoint = %ctx.transport.endpoint(),
                    class = ?error.class(),
                    error = %error,
                    "subscription poll failed; polling continues"
                );
            }
        }
    }
}

async fn reinstall(ctx: &PollContext) {
    let installed = match ctx.gate.acquire().await {
        Ok(_permit) => ctx.transport.install_filter(ctx.event).await,
        Err(_) => return,
    };

    match installed {
        Ok(filter) => {
            *ctx.filter.lock().expect("filter id lock is not poisoned") = filter;
        }
        Err(error) => warn!(
            event = ctx.event.name(),
            endpoint = %ctx.transport.endpoint(),
            error = %error,
            "failed to reinstall subscription filter"
        ),
    }
}
