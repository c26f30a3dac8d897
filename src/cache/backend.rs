//! Cache backend implementations.

use super::key::CacheKey;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone)]
struct CacheEntry {
    data: Vec<u8>,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            inserted_at: Instant::now(),
            ttl,
        }
    }
    /// Valid while `age < ttl`.
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

/// Storage seam under [`super::CacheManager`].
///
/// Backends never fail towards the caller: absence is the only negative outcome.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<Vec<u8>>;
    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration);
    async fn delete(&self, key: &CacheKey) -> bool;
    async fn clear(&self);
    /// Number of live (unexpired) entries.
    async fn len(&self) -> usize;
    /// Drop every expired entry, returning how many were removed.
    async fn purge_expired(&self) -> usize;
    fn name(&self) -> &'static str;
}

pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_entries: max_entries.max(1),
        }
    }

    fn evict_if_needed(&self, entries: &mut HashMap<String, CacheEntry>) {
        entries.retain(|_, e| !e.is_expired());
        while entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone());
            if let Some(k) = oldest {
                entries.remove(&k);
            } else {
                break;
            }
        }
    }
}

// A panicking writer cannot leave a half-written entry behind (every mutation
// is a single map operation), so a poisoned lock is safe to keep using.
#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(&key.hash) {
                Some(entry) if !entry.is_expired() => return Some(entry.data.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Lazy expiry. Re-check under the write lock: a concurrent set may
        // have refreshed the entry in between.
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.get(&key.hash).is_some_and(CacheEntry::is_expired) {
            entries.remove(&key.hash);
        }
        None
    }
    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if !entries.contains_key(&key.hash) {
            self.evict_if_needed(&mut entries);
        }
        entries.insert(key.hash.clone(), CacheEntry::new(value.to_vec(), ttl));
    }
    async fn delete(&self, key: &CacheKey) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key.hash)
            .is_some()
    }
    async fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
    async fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|e| !e.is_expired())
            .count()
    }
    async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired());
        before - entries.len()
    }
    fn name(&self) -> &'static str {
        "memory"
    }
}

pub struct NullCache;
impl NullCache {
    pub fn new() -> Self {
        Self
    }
}
impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for NullCache {
    async fn get(&self, _: &CacheKey) -> Option<Vec<u8>> {
        None
    }
    async fn set(&self, _: &CacheKey, _: &[u8], _: Duration) {}
    async fn delete(&self, _: &CacheKey) -> bool {
        false
    }
    async fn clear(&self) {}
    async fn len(&self) -> usize {
        0
    }
    async fn purge_expired(&self) -> usize {
        0
    }
    fn name(&self) -> &'static str {
        "null"
    }
}
