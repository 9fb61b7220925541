//! Read-through cache for provider tokens and resolved chat ids

use super::{Cache, RedisSettings, RedisStore};
use crate::error::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const NAMESPACE: &str = "commonlog_lark";

/// Cache key for a tenant access token
pub fn token_key(app_id: &str, app_secret: &str) -> String {
    format!("{NAMESPACE}_token:{app_id}:{app_secret}")
}

/// Cache key for a resolved chat id
pub fn chat_id_key(environment: &str, channel_name: &str) -> String {
    format!("{NAMESPACE}_chat_id:{environment}:{channel_name}")
}

/// What a cached identity value is, for logging and statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    TenantToken,
    ChatId,
}

impl IdentityKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::TenantToken => "tenant_token",
            Self::ChatId => "chat_id",
        }
    }
}

/// Hit/fetch counters
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IdentityStats {
    pub token_hits: u64,
    pub token_fetches: u64,
    pub chat_id_hits: u64,
    pub chat_id_fetches: u64,
    pub fetch_errors: u64,
    /// Operations served by the in-process cache because the store was unusable
    pub store_fallbacks: u64,
}

/// External store first, in-process cache as fallback.
///
/// Store problems (missing settings, refused connection, timeouts) are never
/// surfaced to callers; they only downgrade to the fallback cache.
pub struct IdentityCache {
    fallback: Arc<dyn Cache>,
    stats: RwLock<IdentityStats>,
}

impl IdentityCache {
    pub fn new(fallback: Arc<dyn Cache>) -> Self {
        Self {
            fallback,
            stats: RwLock::new(IdentityStats::default()),
        }
    }

    pub async fn get(&self, store: Option<&RedisSettings>, key: &str) -> Option<String> {
        if let Some(settings) = store {
            match RedisStore::new(settings.clone()).get(key).await {
                Ok(value) => return value,
                Err(e) => {
                    tracing::debug!(
                        address = %settings.address(),
                        error = %e,
                        "Redis unavailable, reading from memory cache"
                    );
                }
            }
        } else {
            tracing::debug!("Redis not configured, reading from memory cache");
        }

        self.stats.write().await.store_fallbacks += 1;
        self.fallback.get(key)
    }

    pub async fn put(
        &self,
        store: Option<&RedisSettings>,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) {
        if let Some(settings) = store {
            match RedisStore::new(settings.clone()).set(key, value, ttl).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::debug!(
                        address = %settings.address(),
                        error = %e,
                        "Redis unavailable, writing to memory cache"
                    );
                }
            }
        }

        self.stats.write().await.store_fallbacks += 1;
        self.fallback.set(key, value, ttl);
    }

    /// Drop `key` from both tiers
    pub async fn delete(&self, store: Option<&RedisSettings>, key: &str) {
        if let Some(settings) = store {
            if let Err(e) = RedisStore::new(settings.clone()).delete(key).await {
                tracing::debug!(
                    address = %settings.address(),
                    error = %e,
                    "Redis unavailable, deleting from memory cache only"
                );
                self.stats.write().await.store_fallbacks += 1;
            }
        }
        // The fallback may hold a copy written while the store was down
        self.fallback.delete(key);
    }

    /// Return the cached value for `key`, or run `fetch` and cache its result.
    ///
    /// `fetch` yields the value and its TTL (`None` = no expiry). A failed
    /// fetch leaves the cache untouched and is returned as-is.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        kind: IdentityKind,
        store: Option<&RedisSettings>,
        key: &str,
        fetch: F,
    ) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(String, Option<Duration>)>>,
    {
        if let Some(value) = self.get(store, key).await.filter(|v| !v.is_empty()) {
            self.record(kind, true).await;
            tracing::debug!(kind = kind.as_str(), "Identity cache hit");
            return Ok(value);
        }

        self.record(kind, false).await;
        tracing::debug!(kind = kind.as_str(), "Identity cache miss, fetching upstream");

        match fetch().await {
            Ok((value, ttl)) => {
                self.put(store, key, &value, ttl).await;
                Ok(value)
            }
            Err(e) => {
                self.stats.write().await.fetch_errors += 1;
                Err(e)
            }
        }
    }

    async fn record(&self, kind: IdentityKind, hit: bool) {
        let mut stats = self.stats.write().await;
        match (kind, hit) {
            (IdentityKind::TenantToken, true) => stats.token_hits += 1,
            (IdentityKind::TenantToken, false) => stats.token_fetches += 1,
            (IdentityKind::ChatId, true) => stats.chat_id_hits += 1,
            (IdentityKind::ChatId, false) => stats.chat_id_fetches += 1,
        }
    }

    pub async fn stats(&self) -> IdentityStats {
        self.stats.read().await.clone()
    }

    /// Log cache statistics (for periodic monitoring)
    pub async fn log_stats(&self) {
        let stats = self.stats().await;
        tracing::info!(
            token_hits = stats.token_hits,
            token_fetches = stats.token_fetches,
            chat_id_hits = stats.chat_id_hits,
            chat_id_fetches = stats.chat_id_fetches,
            fetch_errors = stats.fetch_errors,
            store_fallbacks = stats.store_fallbacks,
            "Identity cache statistics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::error::AlertError;

    #[test]
    fn test_key_layout() {
        assert_eq!(token_key("cli_a", "s3cr3t"), "commonlog_lark_token:cli_a:s3cr3t");
        assert_eq!(
            chat_id_key("production", "ops-alerts"),
            "commonlog_lark_chat_id:production:ops-alerts"
        );
    }

    #[tokio::test]
    async fn test_get_or_fetch_is_read_through() {
        let memory = Arc::new(MemoryCache::new());
        let identity = IdentityCache::new(memory.clone());

        let first = identity
            .get_or_fetch(IdentityKind::ChatId, None, "k", || async {
                Ok(("oc_1".to_string(), None))
            })
            .await
            .unwrap();
        assert_eq!(first, "oc_1");

        let second = identity
            .get_or_fetch(IdentityKind::ChatId, None, "k", || async {
                Err(AlertError::Config("must not be called".to_string()))
            })
            .await
            .unwrap();
        assert_eq!(second, "oc_1");

        let stats = identity.stats().await;
        assert_eq!(stats.chat_id_fetches, 1);
        assert_eq!(stats.chat_id_hits, 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_does_not_poison_cache() {
        let memory = Arc::new(MemoryCache::new());
        let identity = IdentityCache::new(memory.clone());

        let result = identity
            .get_or_fetch(IdentityKind::TenantToken, None, "t", || async {
                Err(AlertError::Config("boom".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert!(memory.is_empty());
        assert_eq!(identity.stats().await.fetch_errors, 1);
    }

    #[tokio::test]
    async fn test_unreachable_store_falls_back_to_memory() {
        let memory = Arc::new(MemoryCache::new());
        let identity = IdentityCache::new(memory.clone());

        // Nothing listens on port 1
        let mut settings = RedisSettings::new("127.0.0.1", 1);
        settings.connect_timeout = Duration::from_millis(200);

        identity
            .put(Some(&settings), "k", "v", Some(Duration::from_secs(60)))
            .await;
        assert_eq!(memory.get("k").as_deref(), Some("v"));
        assert_eq!(identity.get(Some(&settings), "k").await.as_deref(), Some("v"));

        identity.delete(Some(&settings), "k").await;
        assert_eq!(memory.get("k"), None);
    }
}
