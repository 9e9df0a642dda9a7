use cached::{Cached, TimedCache};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Cache key: platform symbol plus the operation being cached
/// ("quote", "history:1mo", "catalog", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub symbol: String,
    pub endpoint: String,
}

impl CacheKey {
    pub fn new(symbol: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// TTL cache in front of upstream fetches, shared across dashboard
/// handlers. Values are stored as JSON so one cache serves quotes,
/// histories and catalogs alike.
pub struct QuoteCache {
    cache: Arc<RwLock<TimedCache<CacheKey, Value>>>,
}

impl QuoteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    /// TTL from `QUOTE_CACHE_TTL_SECS`, defaulting to one minute.
    pub fn from_env() -> Self {
        let ttl_secs = std::env::var("QUOTE_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        Self::new(Duration::from_secs(ttl_secs))
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Value> {
        let mut cache = self.cache.write().await;
        cache.cache_get(key).cloned()
    }

    pub async fn insert(&self, key: CacheKey, value: Value) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, value);
    }

    /// Returns the cached value, or runs `fetcher` and caches its result.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: CacheKey, fetcher: F) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Value, E>>,
    {
        if let Some(value) = self.get(&key).await {
            tracing::debug!(symbol = %key.symbol, endpoint = %key.endpoint, "cache hit");
            return Ok(value);
        }
        tracing::debug!(symbol = %key.symbol, endpoint = %key.endpoint, "cache miss");

        let value = fetcher().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.cache_clear();
    }

    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Clone for QuoteCache {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}
