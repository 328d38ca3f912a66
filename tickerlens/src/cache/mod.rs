//! Caching layers.
//!
//! - [`TwoLevelCache`]: memory + durable JSON files with per-layer TTLs,
//!   used for expensive synthesized results.
//! - [`ResourceCacheManager`]: short-lived, memory-only TTL buckets that
//!   deduplicate upstream calls while one report is being assembled.
//!
//! Both are plain values constructed by the caller and injected where
//! needed.

mod atomic;
mod durable;
mod entry;
mod error;
mod key;
mod memory;
mod resource;
mod two_level;

use std::fmt;

pub(crate) use atomic::write_atomic;
pub use durable::{DurableCache, DurableFileInfo, DurableRead};
pub use entry::{CacheEntry, CacheLookup, LookupReason};
pub use error::CacheError;
pub use key::{normalize_subject, CacheKey, ResourceType, UnknownResourceType};
pub use memory::MemoryCache;
pub use resource::{
    CachedResource, ResourceCacheManager, ResourceKey, ResourceKind, ResourceTtls, ResourceValue,
};
pub use two_level::{
    TwoLevelCache, TwoLevelConfig, DEFAULT_DURABLE_TTL, DEFAULT_MEMORY_MAX_ENTRIES,
    DEFAULT_MEMORY_TTL,
};

/// Hit/miss counters for a [`TwoLevelCache`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub memory_expired: u64,
    pub memory_entry_count: u64,
    pub durable_hits: u64,
    pub durable_misses: u64,
    /// Swallowed read/decode/write failures
    pub errors: u64,
}

impl CacheStats {
    /// Fraction of lookups served from either layer.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.durable_hits;
        // Every durable lookup follows a memory miss.
        let total = self.memory_hits + self.memory_misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "memory {} hits / {} misses, durable {} hits / {} misses, {} errors",
            self.memory_hits,
            self.memory_misses,
            self.durable_hits,
            self.durable_misses,
            self.errors
        )
    }
}
