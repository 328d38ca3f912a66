//! Process-local memory layer backed by `moka`.
//!
//! Moka's capacity bound handles eviction. Per-entry TTL is checked on
//! read against the injected clock, since entries carry their own creation
//! time (a backfilled entry is older than its insertion instant).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use moka::ops::compute::Op;
use moka::sync::Cache;
use tracing::trace;

use super::entry::CacheEntry;
use super::key::CacheKey;
use super::CacheStats;

/// In-memory cache of `CacheEntry` values.
pub struct MemoryCache {
    /// The underlying moka cache
    cache: Cache<CacheKey, Arc<CacheEntry>>,
    /// Capacity in entries
    max_entries: u64,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
}

impl MemoryCache {
    /// Create a new memory cache.
    ///
    /// # Arguments
    ///
    /// * `max_entries` - Maximum number of entries before LRU eviction
    pub fn new(max_entries: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_entries).build(),
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    /// Get an entry that is still valid at `now`.
    ///
    /// An expired entry is dropped and reported as a miss. A fresh entry
    /// written by a concurrent `insert` after the read is kept.
    pub fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<Arc<CacheEntry>> {
        match self.cache.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry)
            }
            Some(entry) => {
                trace!(key = %key, age_secs = entry.age(now).as_secs(), "memory entry expired");
                self.remove_if_same(key, &entry);
                self.expired.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store an entry, replacing any existing entry for the key.
    pub fn insert(&self, key: CacheKey, entry: CacheEntry) {
        self.cache.insert(key, Arc::new(entry));
    }

    /// Remove the entry for `key`, if any.
    pub fn remove(&self, key: &CacheKey) {
        self.cache.invalidate(key);
    }

    /// Removes `key` only while it still maps to `stale`.
    fn remove_if_same(&self, key: &CacheKey, stale: &Arc<CacheEntry>) {
        let _ = self
            .cache
            .entry_by_ref(key)
            .and_compute_with(|current| match current {
                Some(current) if Arc::ptr_eq(current.value(), stale) => Op::Remove,
                _ => Op::Nop,
            });
    }

    /// Check if a key exists (regardless of expiry).
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.cache.contains_key(key)
    }

    /// Get the current number of entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    /// Maximum number of entries.
    pub fn max_entries(&self) -> u64 {
        self.max_entries
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
    }

    /// Fill in the memory fields of `stats`.
    pub(crate) fn fill_stats(&self, stats: &mut CacheStats) {
        stats.memory_hits = self.hits.load(Ordering::Relaxed);
        stats.memory_misses = self.misses.load(Ordering::Relaxed);
        stats.memory_expired = self.expired.load(Ordering::Relaxed);
        stats.memory_entry_count = self.entry_count();
    }
}
