//! In-process cache with lazy expiry and a periodic sweep

use super::Cache;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Default interval between expiry sweeps
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    /// `None` never expires
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Thread-safe in-memory cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Start the background sweep on the current tokio runtime.
    ///
    /// The task only holds a weak reference: it ends by itself once the cache
    /// is dropped, or earlier through `SweepHandle::stop`.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> SweepHandle {
        let cache = Arc::downgrade(self);
        let stop = Arc::new(Notify::new());
        let stopped = stop.clone();

        tracing::debug!(interval_secs = every.as_secs(), "Starting cache sweeper");

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick fires immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(cache) = cache.upgrade() else {
                            break;
                        };
                        let removed = cache.purge_expired();
                        if removed > 0 {
                            tracing::info!(
                                removed = removed,
                                remaining = cache.len(),
                                "Cleaned up expired entries from memory cache"
                            );
                        }
                    }
                    _ = stopped.notified() => break,
                }
            }

            tracing::debug!("Cache sweeper stopped");
        });

        SweepHandle { stop, task }
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }

        // Re-check under the write lock so a concurrent fresh `set` survives
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        tracing::trace!(key = %key, "Evicted expired cache entry on read");
        None
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at,
            },
        );
    }

    fn delete(&self, key: &str) {
        self.entries.remove(key);
    }
}

/// Stop hook for a running sweep
#[must_use = "dropping the handle detaches the sweeper; call `stop` to end it"]
pub struct SweepHandle {
    stop: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Signal the sweeper and wait for it to exit
    pub async fn stop(self) {
        self.stop.notify_one();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Cache sweeper ended abnormally");
        }
    }

    /// Signal the sweeper without waiting for it
    pub fn cancel(self) {
        self.stop.notify_one();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
