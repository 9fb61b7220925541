//! Key/value caching for provider credentials and resolved channel ids
//!
//! Two tiers:
//! - `MemoryCache`: in-process, per-entry expiry, swept periodically
//! - `RedisStore`: optional external store, connected per operation
//!
//! `IdentityCache` layers them: it prefers the external store and silently
//! falls back to the in-process cache when the store is unreachable or not
//! configured.

mod identity;
mod memory;
mod redis;

pub use identity::{IdentityCache, IdentityKind, IdentityStats, chat_id_key, token_key};
pub use memory::{MemoryCache, SWEEP_INTERVAL, SweepHandle};
pub use redis::{RedisSettings, RedisStore};

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

/// Shared cache interface. Implementations must be safe to call from many
/// tasks at once; last `set` wins.
pub trait Cache: Send + Sync {
    /// Returns the live value for `key`. Expired entries behave as misses.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`. `ttl = None` means the entry never expires.
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>);

    fn delete(&self, key: &str);
}

struct GlobalSlot {
    cache: Arc<dyn Cache>,
    /// The built-in memory cache, while it is the installed one
    default: Option<Arc<MemoryCache>>,
    sweep: Option<SweepHandle>,
}

impl GlobalSlot {
    fn new() -> Self {
        let default = Arc::new(MemoryCache::new());
        Self {
            cache: default.clone(),
            default: Some(default),
            sweep: None,
        }
    }

    /// Start (or restart) the default cache's sweep when a runtime is present
    fn ensure_sweep(&mut self) {
        let Some(default) = &self.default else {
            return;
        };
        if self.sweep.as_ref().is_some_and(|sweep| !sweep.is_finished()) {
            return;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            tracing::trace!("No tokio runtime, global cache relies on lazy expiry only");
            return;
        }
        self.sweep = Some(default.spawn_sweeper(SWEEP_INTERVAL));
    }
}

static GLOBAL_CACHE: OnceLock<Mutex<GlobalSlot>> = OnceLock::new();

fn global_slot() -> MutexGuard<'static, GlobalSlot> {
    GLOBAL_CACHE
        .get_or_init(|| Mutex::new(GlobalSlot::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Process-wide cache shared by every notifier that was not given its own.
///
/// Returns the same instance on every call until `set_global` replaces it.
/// Called inside a tokio runtime, it also makes sure the default cache is
/// being swept.
pub fn global() -> Arc<dyn Cache> {
    let mut slot = global_slot();
    slot.ensure_sweep();
    slot.cache.clone()
}

/// Replace the process-wide cache (tests, or a custom backing store).
///
/// The default cache's sweep is signalled to stop.
pub fn set_global(cache: Arc<dyn Cache>) {
    let mut slot = global_slot();
    if let Some(sweep) = slot.sweep.take() {
        sweep.cancel();
    }
    slot.default = None;
    slot.cache = cache;
}

/// Stop the default cache's sweep and wait for it to exit.
///
/// Entries stay readable and still expire lazily. A later `global()` call
/// inside a runtime starts a new sweep.
pub async fn shutdown() {
    let sweep = global_slot().sweep.take();
    if let Some(sweep) = sweep {
        sweep.stop().await;
        tracing::debug!("Global cache sweeper stopped");
    }
}

/// True while the default cache's sweep task is alive
pub fn sweep_running() -> bool {
    global_slot()
        .sweep
        .as_ref()
        .is_some_and(|sweep| !sweep.is_finished())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_cache_is_singleton() {
        let first = global();
        let second = global();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_shutdown_stops_global_sweeper() {
        let cache = global();
        assert!(sweep_running());

        shutdown().await;
        assert!(!sweep_running());

        // Still usable, with lazy expiry only
        cache.set("k", "v", None);
        assert_eq!(cache.get("k").as_deref(), Some("v"));

        global();
        assert!(sweep_running());
        shutdown().await;
    }
}
