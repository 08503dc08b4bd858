//! Process-wide serialization gate for provider traffic.
//!
//! Every provider call holds the single permit for its whole duration, so
//! at most one request is ever in flight regardless of how many callers
//! (reads, cache fills, history windows, filter polls) are active. An
//! optional pacing quota further spaces consecutive calls.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::FeedError;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Capacity-1 admission control shared by every provider call.
#[derive(Clone)]
pub struct SerializationGate {
    permits: Arc<Semaphore>,
    pacer: Option<Arc<DirectRateLimiter>>,
}

/// Held while a provider call is in flight; released on drop.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl Default for SerializationGate {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SerializationGate {
    /// `requests_per_second` adds pacing on top of serialization.
    pub fn new(requests_per_second: Option<NonZeroU32>) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
            pacer: requests_per_second
                .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate)))),
        }
    }

    pub async fn acquire(&self) -> Result<GatePermit, FeedError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| FeedError::GateClosed)?;

        if let Some(pacer) = &self.pacer {
            pacer.until_ready().await;
        }

        Ok(GatePermit { _permit: permit })
    }

    /// True while some caller holds the permit.
    pub fn is_busy(&self) -> bool {
        self.permits.available_permits() == 0
    }
}
