//! Time-to-live memoization cache.
//!
//! Entries expire a fixed TTL after they were stored. Expired entries are
//! swept lazily: every lookup first removes all of them. The map is guarded
//! by a mutex, but the compute callback runs outside it, so two concurrent
//! misses for the same key may both compute and the last store wins.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// A process-wide memoization cache with per-entry expiry.
///
/// # Example
///
/// ```rust
/// use scatter_core::TtlCache;
/// use std::time::Duration;
///
/// let cache = TtlCache::new(Duration::from_secs(60));
///
/// let a = cache.fetch("key", || 42);
/// let b = cache.fetch("key", || unreachable!());
/// assert_eq!(a, b);
/// ```
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create an empty cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The configured time to live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the live value for `key`, computing and storing it on a miss.
    pub fn fetch<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.lookup(&key) {
            return value;
        }

        let value = compute();
        self.store(key, value.clone());
        value
    }

    /// Like [`fetch`](Self::fetch) for a fallible compute; errors are not cached.
    pub fn try_fetch<F, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }

        let value = compute()?;
        self.store(key, value.clone());
        Ok(value)
    }

    /// Remove every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        Self::sweep(&mut entries)
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();
        Self::sweep(&mut entries);
        let value = entries.get(key).map(|entry| entry.value.clone());
        if value.is_some() {
            debug!("cache hit");
        }
        value
    }

    fn store(&self, key: K, value: V) {
        let entry = Entry::new(value, self.ttl);
        self.entries.lock().insert(key, entry);
    }

    fn sweep(entries: &mut HashMap<K, Entry<V>>) -> usize {
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, "evicted expired cache entries");
        }
        evicted
    }
}
