//! At-most-once cache for provider values that never change.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::FeedError;

/// Keys of the immutable provider values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticKey {
    Decimals,
    Description,
}

impl StaticKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Decimals => "decimals",
            Self::Description => "description",
        }
    }
}

/// One lazily populated, never overwritten value.
///
/// Concurrent callers on an empty slot share a single fetch. A failed
/// fetch leaves the slot empty.
#[derive(Debug)]
pub struct StaticSlot<T> {
    key: StaticKey,
    cell: OnceCell<T>,
    fetches: AtomicU32,
}

impl<T: Clone> StaticSlot<T> {
    pub fn new(key: StaticKey) -> Self {
        Self {
            key,
            cell: OnceCell::new(),
            fetches: AtomicU32::new(0),
        }
    }

    pub async fn get_or_fetch<F, Fut>(&self, fetcher: F) -> Result<T, FeedError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FeedError>>,
    {
        let value = self
            .cell
            .get_or_try_init(|| async move {
                self.fetches.fetch_add(1, Ordering::SeqCst);
                debug!(key = self.key.as_str(), "static value cache miss");
                fetcher().await
            })
            .await?;
        Ok(value.clone())
    }

    pub fn get(&self) -> Option<T> {
        self.cell.get().cloned()
    }

    pub fn is_cached(&self) -> bool {
        self.cell.initialized()
    }

    /// Number of times the fetcher has been invoked.
    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

/// Static values of the feed, populated on first use.
#[derive(Debug)]
pub struct StaticValueCache {
    pub decimals: StaticSlot<u8>,
    pub description: StaticSlot<String>,
}

impl Default for StaticValueCache {
    fn default() -> Self {
        Self {
            decimals: StaticSlot::new(StaticKey::Decimals),
            description: StaticSlot::new(StaticKey::Description),
        }
    }
}

impl StaticValueCache {
    pub fn is_cached(&self, key: StaticKey) -> bool {
        match key {
            StaticKey::Decimals => self.decimals.is_cached(),
            StaticKey::Description => self.description.is_cached(),
        }
    }
}
