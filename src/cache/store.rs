//! In-memory, time-boxed store.

use super::key::CacheKey;
use super::stats::{AtomicStats, CacheStats};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= ttl
    }
}

/// Concurrency-safe cache whose entries expire `ttl` after they were stored.
///
/// Expired entries are dropped lazily on the next access. A zero `ttl`
/// disables storage entirely. The lock guards a single map operation and is
/// never held across an await point.
pub struct ModelCache<V> {
    entries: Mutex<HashMap<CacheKey, CacheEntry<V>>>,
    ttl: Duration,
    stats: AtomicStats,
}

impl<V: Clone> ModelCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            stats: AtomicStats::default(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    // A panic while holding the guard cannot leave a half-written entry
    // behind (insert/remove are atomic on the map), so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.lock();
        let hit = match entries.get(key) {
            Some(entry) if !entry.is_expired(self.ttl, now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        };
        drop(entries);

        if hit.is_some() {
            self.stats.hit();
        } else {
            self.stats.miss();
        }
        hit
    }

    /// Fresh value for `key` without touching the hit/miss counters.
    pub(crate) fn peek(&self, key: &CacheKey) -> Option<V> {
        let now = Instant::now();
        self.lock()
            .get(key)
            .filter(|entry| !entry.is_expired(self.ttl, now))
            .map(|entry| entry.value.clone())
    }

    pub fn set(&self, key: CacheKey, value: V) {
        self.set_with_timestamp(key, value, Instant::now());
    }

    pub(crate) fn set_with_timestamp(&self, key: CacheKey, value: V, stored_at: Instant) {
        if !self.is_enabled() {
            return;
        }
        self.lock().insert(key, CacheEntry { value, stored_at });
        self.stats.set();
    }

    /// Drop one entry, or every entry when `key` is `None`. Returns how many were removed.
    pub fn invalidate(&self, key: Option<&CacheKey>) -> usize {
        let removed = {
            let mut entries = self.lock();
            match key {
                Some(k) => usize::from(entries.remove(k).is_some()),
                None => {
                    let n = entries.len();
                    entries.clear();
                    n
                }
            }
        };
        self.stats.invalidated(removed as u64);
        removed
    }

    /// True when the key is absent or its entry has outlived the ttl.
    pub fn is_expired(&self, key: &CacheKey) -> bool {
        let now = Instant::now();
        self.lock()
            .get(key)
            .map(|e| e.is_expired(self.ttl, now))
            .unwrap_or(true)
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .values()
            .filter(|e| !e.is_expired(self.ttl, now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }
}

impl<V> std::fmt::Debug for ModelCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("ttl", &self.ttl)
            .field("stats", &self.stats.to_stats())
            .finish()
    }
}
