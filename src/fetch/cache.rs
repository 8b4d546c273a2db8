//! Result cache with per-entry TTL and LRU eviction
//!
//! Entries are immutable once stored and are replaced wholesale on refresh.
//! Expired entries are never swept in the background; a lookup that finds
//! one drops it and reports a miss.

use log::{debug, info};
use std::{
    collections::{HashMap, VecDeque},
    fmt,
    time::Duration,
};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Identifier of one logical upstream query
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for a per-user resource, e.g. `reels-for-user-alice`
    pub fn for_user(resource: &str, username: &str) -> Self {
        Self(format!("{}-for-user-{}", resource, username))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Configuration for a result cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries kept before LRU eviction kicks in
    pub capacity: usize,
    /// TTL applied when a `put` does not override it
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            default_ttl: Duration::from_secs(1800),
        }
    }
}

/// A stored value with its freshness window
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: CacheKey,
    pub value: V,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(key: CacheKey, value: V, ttl: Duration, now: Instant) -> Self {
        Self {
            key,
            value,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_fresh_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    /// Time left before the entry expires (zero once expired)
    pub fn remaining_ttl(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Cache: {:.1}% hit rate, {}/{} entries, {} evicted, {} expired",
            self.hit_rate() * 100.0,
            self.entries,
            self.capacity,
            self.evictions,
            self.expirations
        )
    }
}

/// Internal cache storage structure
struct CacheStorage<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    access_order: VecDeque<CacheKey>, // front = least recently accessed
    capacity: usize,
    stats: CacheStats,
}

impl<V: Clone> CacheStorage<V> {
    fn lookup(&mut self, key: &CacheKey, now: Instant) -> Option<CacheEntry<V>> {
        match self.entries.get(key) {
            Some(entry) if entry.is_fresh_at(now) => {
                let entry = entry.clone();
                self.touch(key);
                self.stats.hits += 1;
                debug!("Cache HIT for {}", key);
                Some(entry)
            }
            Some(_) => {
                self.remove(key);
                self.stats.expirations += 1;
                self.stats.misses += 1;
                debug!("Cache entry expired for {}", key);
                None
            }
            None => {
                self.stats.misses += 1;
                debug!("Cache MISS for {}", key);
                None
            }
        }
    }

    fn insert(&mut self, key: CacheKey, value: V, ttl: Duration, now: Instant) {
        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.capacity {
                if !self.evict_lru() {
                    break;
                }
            }
        }

        let entry = CacheEntry::new(key.clone(), value, ttl, now);
        self.entries.insert(key.clone(), entry);
        self.touch(&key);

        debug!(
            "Cached {} for {:?} (cache size: {})",
            key,
            ttl,
            self.entries.len()
        );
    }

    /// Move `key` to the most-recently-used end
    fn touch(&mut self, key: &CacheKey) {
        if let Some(pos) = self.access_order.iter().position(|k| k == key) {
            self.access_order.remove(pos);
        }
        self.access_order.push_back(key.clone());
    }

    fn remove(&mut self, key: &CacheKey) -> bool {
        if let Some(pos) = self.access_order.iter().position(|k| k == key) {
            self.access_order.remove(pos);
        }
        self.entries.remove(key).is_some()
    }

    fn evict_lru(&mut self) -> bool {
        match self.access_order.pop_front() {
            Some(lru_key) => {
                self.entries.remove(&lru_key);
                self.stats.evictions += 1;
                debug!("Evicted LRU entry: {}", lru_key);
                true
            }
            None => false,
        }
    }
}

/// Keyed TTL store with bounded capacity
pub struct ResultCache<V> {
    storage: Mutex<CacheStorage<V>>,
    default_ttl: Duration,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = config.capacity.max(1);
        info!(
            "Initializing result cache (TTL: {:?}, capacity: {})",
            config.default_ttl, capacity
        );

        Self {
            storage: Mutex::new(CacheStorage {
                entries: HashMap::with_capacity(capacity),
                access_order: VecDeque::with_capacity(capacity),
                capacity,
                stats: CacheStats {
                    capacity,
                    ..CacheStats::default()
                },
            }),
            default_ttl: config.default_ttl,
        }
    }

    /// Returns the entry if it exists and has not expired.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        let mut storage = self.storage.lock().await;
        storage.lookup(key, Instant::now())
    }

    /// Stores `value` under `key` with the cache's default TTL.
    pub async fn put(&self, key: CacheKey, value: V) {
        self.put_with_ttl(key, value, self.default_ttl).await;
    }

    /// Stores or replaces `value` under `key`, expiring `ttl` from now.
    /// A new key on a full cache evicts the least recently accessed entry.
    pub async fn put_with_ttl(&self, key: CacheKey, value: V, ttl: Duration) {
        let mut storage = self.storage.lock().await;
        storage.insert(key, value, ttl, Instant::now());
    }

    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        let mut storage = self.storage.lock().await;
        storage.remove(key)
    }

    pub async fn clear(&self) {
        let mut storage = self.storage.lock().await;
        let removed = storage.entries.len();
        storage.entries.clear();
        storage.access_order.clear();
        info!("Cleared result cache ({} entries removed)", removed);
    }

    /// Number of stored entries, expired ones included until touched
    pub async fn len(&self) -> usize {
        self.storage.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub async fn stats(&self) -> CacheStats {
        let storage = self.storage.lock().await;
        CacheStats {
            entries: storage.entries.len(),
            ..storage.stats.clone()
        }
    }
}
