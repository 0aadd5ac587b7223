use crate::collector::MarketDataCollector;
use crate::model::{CollectorError, PriceSample};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::info;

/// Expiring sample cache with an explicit `get`/`put(ttl)` surface. Injected
/// into whichever collector wants caching; never a process-wide global.
pub struct SampleCache {
    entries: Mutex<HashMap<String, (Vec<PriceSample>, Instant)>>,
}

impl SampleCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached value if its expiry has not passed.
    pub fn get(&self, key: &str) -> Option<Vec<PriceSample>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).and_then(|(samples, expires_at)| {
            if Instant::now() < *expires_at {
                Some(samples.clone())
            } else {
                None
            }
        })
    }

    pub fn put(&self, key: &str, samples: Vec<PriceSample>, ttl: Duration) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), (samples, Instant::now() + ttl));
    }

    /// Drops one key, forcing the next lookup to go to the inner collector.
    pub fn invalidate(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }
}

/// Decorator that serves repeat lookups from a TTL cache. Collection hits the
/// network, so a scan for the same product within the TTL reuses the
/// previous result.
pub struct CachedCollector<C> {
    inner: C,
    cache: SampleCache,
    ttl: Duration,
}

impl<C: MarketDataCollector> CachedCollector<C> {
    pub fn new(inner: C, ttl: Duration) -> Self {
        Self {
            inner,
            cache: SampleCache::new(),
            ttl,
        }
    }

    fn cache_key(product_name: &str, category: &str) -> String {
        format!("{}_{}", product_name, category)
    }
}

#[async_trait::async_trait]
impl<C: MarketDataCollector> MarketDataCollector for CachedCollector<C> {
    async fn collect(
        &self,
        product_name: &str,
        category: &str,
    ) -> Result<Vec<PriceSample>, CollectorError> {
        let key = Self::cache_key(product_name, category);
        if let Some(samples) = self.cache.get(&key) {
            info!("using cached market data for: {}", product_name);
            return Ok(samples);
        }

        let samples = self.inner.collect(product_name, category).await?;
        self.cache.put(&key, samples.clone(), self.ttl);
        Ok(samples)
    }
}
