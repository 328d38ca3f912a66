//! Memory + durable cache composition.
//!
//! Lookup order is memory, then disk. A disk hit backfills memory with the
//! disk entry's original creation time and TTL so both layers expire from
//! the same instant. Failures in either layer are logged and reported as a
//! miss; callers never see an error.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::durable::{DurableCache, DurableRead};
use super::entry::{CacheEntry, CacheLookup, LookupReason};
use super::key::CacheKey;
use super::memory::MemoryCache;
use super::CacheStats;
use crate::clock::SharedClock;

/// Default memory-layer TTL (10 minutes).
pub const DEFAULT_MEMORY_TTL: Duration = Duration::from_secs(600);

/// Default durable-layer TTL (1 hour).
pub const DEFAULT_DURABLE_TTL: Duration = Duration::from_secs(3600);

/// Default memory-layer capacity.
pub const DEFAULT_MEMORY_MAX_ENTRIES: u64 = 10_000;

/// Configuration for [`TwoLevelCache`].
#[derive(Debug, Clone)]
pub struct TwoLevelConfig {
    /// Directory for durable documents
    pub directory: PathBuf,
    /// TTL applied to entries written to memory by `save`
    pub memory_ttl: Duration,
    /// TTL of durable documents
    pub durable_ttl: Duration,
    /// Memory capacity in entries
    pub memory_max_entries: u64,
}

impl TwoLevelConfig {
    /// Creates a config with default TTLs rooted at `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            memory_ttl: DEFAULT_MEMORY_TTL,
            durable_ttl: DEFAULT_DURABLE_TTL,
            memory_max_entries: DEFAULT_MEMORY_MAX_ENTRIES,
        }
    }

    pub fn with_memory_ttl(mut self, ttl: Duration) -> Self {
        self.memory_ttl = ttl;
        self
    }

    pub fn with_durable_ttl(mut self, ttl: Duration) -> Self {
        self.durable_ttl = ttl;
        self
    }

    pub fn with_memory_max_entries(mut self, max: u64) -> Self {
        self.memory_max_entries = max;
        self
    }
}

/// Two-level TTL cache.
///
/// Constructed explicitly and shared by reference; there is no global
/// instance.
pub struct TwoLevelCache {
    memory: MemoryCache,
    durable: DurableCache,
    memory_ttl: Duration,
    clock: SharedClock,
    durable_hits: AtomicU64,
    durable_misses: AtomicU64,
    errors: AtomicU64,
}

impl TwoLevelCache {
    pub fn new(config: TwoLevelConfig, clock: SharedClock) -> Self {
        Self {
            memory: MemoryCache::new(config.memory_max_entries),
            durable: DurableCache::new(config.directory, config.durable_ttl),
            memory_ttl: config.memory_ttl,
            clock,
            durable_hits: AtomicU64::new(0),
            durable_misses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Looks up `key`.
    ///
    /// Returns the decoded payload (if any) together with the lookup
    /// details. `force_refresh` short-circuits to an absent result without
    /// touching either layer.
    pub fn load<T: DeserializeOwned>(
        &self,
        key: &CacheKey,
        force_refresh: bool,
    ) -> (Option<T>, CacheLookup) {
        if force_refresh {
            debug!(key = %key, "cache bypassed by force refresh");
            return (None, CacheLookup::miss(LookupReason::ForceRefresh));
        }

        let now = self.clock.now();

        if let Some(entry) = self.memory.get(key, now) {
            match entry.decode::<T>() {
                Ok(value) => {
                    let age = entry.age(now);
                    debug!(key = %key, age_secs = age.as_secs(), "memory hit");
                    return (Some(value), CacheLookup::hit(LookupReason::MemoryHit, age));
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "memory entry has unexpected shape, dropping");
                    self.memory.remove(key);
                }
            }
        }

        match self.durable.read(key, now) {
            Ok(DurableRead::Missing) => {
                self.durable_misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "cache miss");
                (None, CacheLookup::miss(LookupReason::NotFound))
            }
            Ok(DurableRead::Expired { age }) => {
                self.durable_misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, age_secs = age.as_secs(), "cache expired");
                (None, CacheLookup::expired(age))
            }
            Ok(DurableRead::Fresh(entry)) => match entry.decode::<T>() {
                Ok(value) => {
                    let age = entry.age(now);
                    self.durable_hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, age_secs = age.as_secs(), "durable hit, backfilling memory");
                    self.memory.insert(key.clone(), entry);
                    (Some(value), CacheLookup::hit(LookupReason::DurableHit, age))
                }
                Err(e) => {
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    warn!(key = %key, error = %e, "durable entry has unexpected shape, treating as miss");
                    (None, CacheLookup::miss(LookupReason::Error(e.to_string())))
                }
            },
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %e, "durable read failed, treating as miss");
                (None, CacheLookup::miss(LookupReason::Error(e.to_string())))
            }
        }
    }

    /// Stores `payload` in both layers.
    ///
    /// Failures are logged and swallowed: the caller already holds the value.
    pub fn save<T: Serialize>(&self, key: &CacheKey, payload: &T) {
        let value = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %e, "payload not serializable, not cached");
                return;
            }
        };

        let now = self.clock.now();
        if let Err(e) = self.durable.write(key, &value, now) {
            self.errors.fetch_add(1, Ordering::Relaxed);
            warn!(key = %key, error = %e, "durable write failed");
        }
        self.memory
            .insert(key.clone(), CacheEntry::new(value, now, self.memory_ttl));
    }

    /// Drops `key` from both layers.
    pub fn invalidate(&self, key: &CacheKey) {
        self.memory.remove(key);
        if let Err(e) = self.durable.remove(key) {
            warn!(key = %key, error = %e, "durable remove failed");
        }
    }

    pub fn memory(&self) -> &MemoryCache {
        &self.memory
    }

    pub fn durable(&self) -> &DurableCache {
        &self.durable
    }

    /// Snapshot of hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            durable_hits: self.durable_hits.load(Ordering::Relaxed),
            durable_misses: self.durable_misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            ..CacheStats::default()
        };
        self.memory.fill_stats(&mut stats);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::ResourceType;
    use crate::clock::{Clock, ManualClock};
    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;
    use serde::Deserialize;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Digest {
        text: String,
        score: i32,
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn setup() -> (TempDir, Arc<ManualClock>, TwoLevelCache) {
        let temp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let config = TwoLevelConfig::new(temp.path())
            .with_memory_ttl(Duration::from_secs(600))
            .with_durable_ttl(Duration::from_secs(3600));
        let cache = TwoLevelCache::new(config, clock.clone());
        (temp, clock, cache)
    }

    fn at(clock: &ManualClock, secs: i64) {
        clock.set(t0() + chrono::Duration::seconds(secs));
    }

    fn key() -> CacheKey {
        CacheKey::new("005930", ResourceType::News)
    }

    fn digest() -> Digest {
        Digest {
            text: "earnings beat".into(),
            score: 3,
        }
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let (_temp, _clock, cache) = setup();
        cache.save(&key(), &digest());

        let (value, lookup) = cache.load::<Digest>(&key(), false);
        assert_eq!(value, Some(digest()));
        assert_eq!(lookup.reason, LookupReason::MemoryHit);
        assert!(lookup.cached);
    }

    #[test]
    fn test_force_refresh_always_absent() {
        let (_temp, _clock, cache) = setup();
        cache.save(&key(), &digest());

        let (value, lookup) = cache.load::<Digest>(&key(), true);
        assert!(value.is_none());
        assert_eq!(lookup.reason.as_str(), "force_refresh");
        assert!(!lookup.cached);
    }

    #[test]
    fn test_not_found() {
        let (_temp, _clock, cache) = setup();
        let (value, lookup) = cache.load::<Digest>(&key(), false);
        assert!(value.is_none());
        assert_eq!(lookup.reason, LookupReason::NotFound);
    }

    #[test]
    fn test_backfill_preserves_original_creation_time() {
        let (_temp, clock, cache) = setup();
        cache.save(&key(), &digest());

        at(&clock, 500);
        let (value, lookup) = cache.load::<Digest>(&key(), false);
        assert!(value.is_some());
        assert_eq!(lookup.reason, LookupReason::MemoryHit);
        assert_eq!(lookup.age, Duration::from_secs(500));

        at(&clock, 650);
        let (value, lookup) = cache.load::<Digest>(&key(), false);
        assert!(value.is_some());
        assert_eq!(lookup.reason, LookupReason::DurableHit);
        assert_eq!(lookup.age, Duration::from_secs(650));

        // Age is measured from the original save, not from the backfill.
        at(&clock, 610);
        let (value, lookup) = cache.load::<Digest>(&key(), false);
        assert!(value.is_some());
        assert_eq!(lookup.reason, LookupReason::MemoryHit);
        assert_eq!(lookup.age, Duration::from_secs(610));

        let entry = cache.memory().get(&key(), clock.now()).unwrap();
        assert_eq!(entry.created_at().timestamp(), t0().timestamp());
    }

    #[test]
    fn test_both_layers_expired() {
        let (_temp, clock, cache) = setup();
        cache.save(&key(), &digest());

        at(&clock, 3700);
        let (value, lookup) = cache.load::<Digest>(&key(), false);
        assert!(value.is_none());
        assert_eq!(lookup.reason, LookupReason::Expired);
        assert_eq!(lookup.age, Duration::from_secs(3700));
    }

    #[test]
    fn test_exact_ttl_is_still_valid() {
        let (_temp, clock, cache) = setup();
        cache.save(&key(), &digest());

        at(&clock, 3600);
        let (value, _) = cache.load::<Digest>(&key(), false);
        assert!(value.is_some());
    }

    #[test]
    fn test_durable_survives_restart() {
        let (temp, clock, cache) = setup();
        cache.save(&key(), &digest());
        drop(cache);

        at(&clock, 30);
        let reopened = TwoLevelCache::new(TwoLevelConfig::new(temp.path()), clock.clone());
        let (value, lookup) = reopened.load::<Digest>(&key(), false);
        assert_eq!(value, Some(digest()));
        assert_eq!(lookup.reason, LookupReason::DurableHit);
    }

    #[test]
    fn test_corrupt_durable_file_is_a_miss() {
        let (_temp, _clock, cache) = setup();
        let path = cache.durable().path_for(&key());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not json").unwrap();

        let (value, lookup) = cache.load::<Digest>(&key(), false);
        assert!(value.is_none());
        assert_eq!(lookup.reason.as_str(), "error");
        assert_eq!(cache.stats().errors, 1);
    }

    #[test]
    fn test_shape_mismatch_is_a_miss() {
        let (_temp, _clock, cache) = setup();
        cache.save(&key(), &vec![1, 2, 3]);
        cache.memory().clear();

        let (value, lookup) = cache.load::<Digest>(&key(), false);
        assert!(value.is_none());
        assert!(matches!(lookup.reason, LookupReason::Error(_)));
    }

    #[test]
    fn test_save_failure_keeps_memory_copy() {
        let temp = TempDir::new().unwrap();
        // A regular file where the cache directory should be.
        let blocked = temp.path().join("blocked");
        std::fs::write(&blocked, b"").unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let cache = TwoLevelCache::new(TwoLevelConfig::new(&blocked), clock);

        cache.save(&key(), &digest());

        let (value, lookup) = cache.load::<Digest>(&key(), false);
        assert_eq!(value, Some(digest()));
        assert_eq!(lookup.reason, LookupReason::MemoryHit);
        assert_eq!(cache.stats().errors, 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_floats_survive_durable_reload(
            values in prop::collection::vec(prop::num::f64::NORMAL | prop::num::f64::SUBNORMAL, 1..64)
        ) {
            let (temp, clock, cache) = setup();
            cache.save(&key(), &values);
            drop(cache);

            let reopened = TwoLevelCache::new(TwoLevelConfig::new(temp.path()), clock);
            let (loaded, lookup) = reopened.load::<Vec<f64>>(&key(), false);
            prop_assert_eq!(lookup.reason, LookupReason::DurableHit);
            let loaded = loaded.unwrap();
            prop_assert_eq!(loaded.len(), values.len());
            for (got, want) in loaded.iter().zip(&values) {
                prop_assert_eq!(got.to_bits(), want.to_bits());
            }
        }
    }

    #[test]
    fn test_invalidate() {
        let (_temp, _clock, cache) = setup();
        cache.save(&key(), &digest());
        cache.invalidate(&key());

        let (value, lookup) = cache.load::<Digest>(&key(), false);
        assert!(value.is_none());
        assert_eq!(lookup.reason, LookupReason::NotFound);
    }
}
