//! Cache manager.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backend::CacheBackend;
use super::key::CacheKey;
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    #[serde(with = "crate::config::duration_secs")]
    pub ttl: Duration,
    #[serde(with = "crate::config::duration_secs")]
    pub sweep_interval: Duration,
    pub enabled: bool,
    pub max_entries: usize,
    pub max_entry_size: usize,
    pub key_prefix: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
            enabled: true,
            max_entries: 10_000,
            max_entry_size: 1024 * 1024,
            key_prefix: None,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub expired: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    expired: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            expired: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Shared response cache. One instance per process, constructed at startup and
/// handed to the service behind an `Arc`.
///
/// Concurrent misses on the same key may each call upstream and each `set`;
/// the writes carry equivalent data and the last one wins.
pub struct CacheManager {
    config: CacheConfig,
    backend: Box<dyn CacheBackend>,
    stats: Arc<AtomicStats>,
}

impl CacheManager {
    pub fn new(config: CacheConfig, backend: Box<dyn CacheBackend>) -> Self {
        Self {
            config,
            backend,
            stats: Arc::new(AtomicStats::new()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns an owned copy of the stored value, or `None` when absent,
    /// expired, or undecodable as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        if !self.config.enabled {
            return None;
        }
        let prefixed = self.prefix_key(key);
        match self.backend.get(&prefixed).await {
            Some(data) => match serde_json::from_slice(&data) {
                Ok(val) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, "cache hit");
                    Some(val)
                }
                Err(e) => {
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    warn!(key = %key, error = %e, "cached value did not decode, treating as miss");
                    None
                }
            },
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "cache miss");
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &CacheKey, value: &T) {
        self.set_with_ttl(key, value, self.config.ttl).await
    }

    pub async fn set_with_ttl<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        if !self.config.enabled {
            return;
        }
        let data = match serde_json::to_vec(value) {
            Ok(data) => data,
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %e, "value not serializable, skipping cache");
                return;
            }
        };
        if data.len() > self.config.max_entry_size {
            debug!(key = %key, size = data.len(), "value exceeds max entry size, skipping cache");
            return;
        }
        let prefixed = self.prefix_key(key);
        self.backend.set(&prefixed, &data, ttl).await;
        self.stats.sets.fetch_add(1, Ordering::Relaxed);
    }

    /// Cache-aside composition: serve a hit, otherwise run `fetch` and store
    /// its result. Failures propagate and are never stored.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(hit) = self.get(key).await {
            return Ok(hit);
        }
        let value = fetch().await?;
        self.set(key, &value).await;
        Ok(value)
    }

    pub async fn delete(&self, key: &CacheKey) -> bool {
        if !self.config.enabled {
            return false;
        }
        let prefixed = self.prefix_key(key);
        self.backend.delete(&prefixed).await
    }

    /// Remove every entry older than its TTL.
    pub async fn sweep(&self) -> usize {
        let removed = self.backend.purge_expired().await;
        if removed > 0 {
            self.stats.expired.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, "cache sweep removed expired entries");
        }
        removed
    }

    /// Drop all entries. Called on shutdown.
    pub async fn flush(&self) {
        let remaining = self.backend.len().await;
        self.backend.clear().await;
        info!(remaining, backend = self.backend.name(), "cache flushed");
    }

    pub async fn len(&self) -> usize {
        self.backend.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Start the periodic sweep on the current tokio runtime.
    ///
    /// The sweep runs on a fixed interval regardless of traffic; it stops when
    /// the returned handle is shut down or dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweeperHandle {
        let cache = Arc::clone(self);
        let token = CancellationToken::new();
        let child = token.clone();
        let period = self.config.sweep_interval.max(Duration::from_millis(10));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        cache.sweep().await;
                    }
                }
            }
            debug!("cache sweeper stopped");
        });

        SweeperHandle {
            token,
            task: Some(task),
        }
    }

    fn prefix_key(&self, key: &CacheKey) -> CacheKey {
        if let Some(ref p) = self.config.key_prefix {
            CacheKey::new(format!("{}:{}", p, key.hash))
        } else {
            key.clone()
        }
    }
}

/// Owner of the background sweep task.
pub struct SweeperHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "cache sweeper task ended abnormally");
            }
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, NullCache};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Summary {
        weather: String,
        temp: f64,
    }

    fn manager(ttl: Duration) -> CacheManager {
        CacheManager::new(
            CacheConfig::new().with_ttl(ttl),
            Box::new(MemoryCache::new(100)),
        )
    }

    fn cloudy() -> Summary {
        Summary {
            weather: "Clouds".into(),
            temp: 7.5,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn set_then_get_within_ttl() {
        let cache = manager(Duration::from_secs(600));
        let key = CacheKey::new("weather:stockholm");
        cache.set(&key, &cloudy()).await;
        tokio::time::advance(Duration::from_secs(599)).await;
        assert_eq!(cache.get::<Summary>(&key).await, Some(cloudy()));
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn get_after_ttl_is_absent() {
        let cache = manager(Duration::from_secs(600));
        let key = CacheKey::new("weather:stockholm");
        cache.set(&key, &cloudy()).await;
        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(cache.get::<Summary>(&key).await, None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn double_set_is_idempotent() {
        let cache = manager(Duration::from_secs(600));
        let key = CacheKey::new("k");
        cache.set(&key, &cloudy()).await;
        cache.set(&key, &cloudy()).await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get::<Summary>(&key).await, Some(cloudy()));
    }

    #[tokio::test]
    async fn returned_values_are_copies() {
        let cache = manager(Duration::from_secs(600));
        let key = CacheKey::new("k");
        cache.set(&key, &cloudy()).await;
        let mut first: Summary = cache.get(&key).await.unwrap();
        first.weather = "Mutated".into();
        assert_eq!(cache.get::<Summary>(&key).await, Some(cloudy()));
    }

    #[tokio::test]
    async fn undecodable_value_is_a_miss() {
        let cache = manager(Duration::from_secs(600));
        let key = CacheKey::new("k");
        cache.set(&key, &"just a string").await;
        assert_eq!(cache.get::<Summary>(&key).await, None);
        assert_eq!(cache.stats().errors, 1);
    }

    #[tokio::test]
    async fn get_or_fetch_does_not_cache_failures() {
        let cache = manager(Duration::from_secs(600));
        let key = CacheKey::new("k");
        let failed: Result<Summary> = cache
            .get_or_fetch(&key, || async { Err(crate::Error::missing_field("city")) })
            .await;
        assert!(failed.is_err());
        assert!(cache.is_empty().await);

        let ok = cache.get_or_fetch(&key, || async { Ok(cloudy()) }).await;
        assert_eq!(ok.unwrap(), cloudy());
        let hit: Result<Summary> = cache
            .get_or_fetch(&key, || async { Err(crate::Error::missing_field("unused")) })
            .await;
        assert_eq!(hit.unwrap(), cloudy());
    }

    #[tokio::test]
    async fn disabled_cache_stores_nothing() {
        let cache = CacheManager::new(
            CacheConfig::new().with_enabled(false),
            Box::new(MemoryCache::new(10)),
        );
        let key = CacheKey::new("k");
        cache.set(&key, &cloudy()).await;
        assert_eq!(cache.get::<Summary>(&key).await, None);
    }

    #[tokio::test]
    async fn null_backend_reports_its_name() {
        let cache = CacheManager::new(CacheConfig::new(), Box::new(NullCache::new()));
        assert_eq!(cache.backend_name(), "null");
    }

    #[tokio::test]
    async fn key_prefix_isolates_managers_on_distinct_backends() {
        let cache = CacheManager::new(
            CacheConfig::new().with_key_prefix("v2"),
            Box::new(MemoryCache::new(10)),
        );
        let key = CacheKey::new("k");
        cache.set(&key, &cloudy()).await;
        assert!(cache.delete(&key).await);
        assert!(!cache.delete(&key).await);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_removes_expired_entries_without_reads() {
        let cache = Arc::new(CacheManager::new(
            CacheConfig::new()
                .with_ttl(Duration::from_secs(600))
                .with_sweep_interval(Duration::from_secs(60)),
            Box::new(MemoryCache::new(100)),
        ));
        cache.set(&CacheKey::new("a"), &cloudy()).await;
        let sweeper = cache.spawn_sweeper();

        tokio::time::sleep(Duration::from_secs(661)).await;
        assert_eq!(cache.stats().expired, 1);
        assert_eq!(cache.stats().misses, 0);

        sweeper.shutdown().await;
        cache.flush().await;
        assert!(cache.is_empty().await);
    }
}
