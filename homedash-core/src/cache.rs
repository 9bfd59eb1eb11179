//! Last-known-good snapshots, refreshed in the background.
//!
//! Each [`RefreshCache`] holds at most one [`CacheEntry`] behind an
//! [`ArcSwapOption`]. The refresh task swaps in a whole new entry on
//! success, so readers only ever see complete snapshots, and a failed
//! refresh leaves the previous one in place.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, info, warn};

use crate::source::{Source, SourceId};

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub value: T,
    pub last_updated_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_updated_at
    }

    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.age(now)
            .to_std()
            .map(|age| age > max_age)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated,
    /// The fetch failed; the previous entry (if any) was kept.
    Failed,
    /// Another refresh of the same cache was already running.
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub successes: u64,
    pub failures: u64,
}

pub struct RefreshCache<T> {
    id: SourceId,
    entry: ArcSwapOption<CacheEntry<T>>,
    in_flight: Mutex<()>,
    successes: AtomicU64,
    failures: AtomicU64,
}

impl<T> RefreshCache<T>
where
    T: Send + Sync + 'static,
{
    /// An empty cache. Nothing is readable until the first successful refresh.
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            entry: ArcSwapOption::empty(),
            in_flight: Mutex::new(()),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    /// Current snapshot, or `None` if no refresh has succeeded yet. Never blocks.
    pub fn read(&self) -> Option<Arc<CacheEntry<T>>> {
        self.entry.load_full()
    }

    pub fn stats(&self) -> RefreshStats {
        RefreshStats {
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    fn store(&self, value: T, at: DateTime<Utc>) {
        self.entry.store(Some(Arc::new(CacheEntry {
            value,
            last_updated_at: at,
        })));
    }

    /// Run one refresh cycle against `source`.
    pub async fn refresh<S>(&self, source: &S) -> RefreshOutcome
    where
        S: Source<Output = T> + ?Sized,
    {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!(source = %self.id, "refresh already in flight, skipping");
            return RefreshOutcome::Skipped;
        };

        match source.load().await {
            Ok(value) => {
                self.store(value, Utc::now());
                self.successes.fetch_add(1, Ordering::Relaxed);
                info!(source = %self.id, "refreshed");
                RefreshOutcome::Updated
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                let stale = self.entry.load().is_some();
                if err.is_network() {
                    warn!(source = %self.id, error = %err, stale, "feed unreachable, keeping previous snapshot");
                } else {
                    warn!(source = %self.id, error = %err, stale, "feed returned unusable data, keeping previous snapshot");
                }
                RefreshOutcome::Failed
            }
        }
    }
}

impl<T> fmt::Debug for RefreshCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCache")
            .field("id", &self.id)
            .field("populated", &self.entry.load().is_some())
            .field("successes", &self.successes.load(Ordering::Relaxed))
            .field("failures", &self.failures.load(Ordering::Relaxed))
            .finish()
    }
}

/// Refresh `cache` from `source` now and then every `period`, until aborted.
///
/// Must be called from within a tokio runtime.
pub fn spawn_refresh_loop<S>(
    cache: Arc<RefreshCache<S::Output>>,
    source: S,
    period: Duration,
) -> JoinHandle<()>
where
    S: Source + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(source = %source.id(), ?period, "refresh loop started");
        loop {
            ticker.tick().await;
            cache.refresh(&source).await;
        }
    })
}
