//! Cache entries and lookup results.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::clock::elapsed_since;

/// Immutable `(payload, created_at, ttl)` record.
///
/// Entries are never mutated; a write to the same key replaces the entry
/// wholesale.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    payload: Arc<Value>,
    created_at: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    /// Creates a new entry.
    pub fn new(payload: Value, created_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            payload: Arc::new(payload),
            created_at,
            ttl,
        }
    }

    /// The stored payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// When the payload was originally produced.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time-to-live measured from `created_at`.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Age of the entry at `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        elapsed_since(self.created_at, now)
    }

    /// Whether the entry is expired at `now`.
    ///
    /// Expiry is strictly greater-than: an entry whose age equals its TTL
    /// is still valid.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.age(now) > self.ttl
    }

    /// Deserializes the payload into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(self.payload.as_ref())
    }
}

/// Why a lookup produced (or failed to produce) a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupReason {
    /// Caller asked to bypass every cache layer.
    ForceRefresh,
    /// Served from the memory layer.
    MemoryHit,
    /// Served from the durable layer (memory was backfilled).
    DurableHit,
    /// An entry existed but was older than its TTL.
    Expired,
    /// No entry in either layer.
    NotFound,
    /// The durable layer could not be read or decoded.
    Error(String),
}

impl LookupReason {
    /// Short machine-readable label.
    pub fn as_str(&self) -> &str {
        match self {
            LookupReason::ForceRefresh => "force_refresh",
            LookupReason::MemoryHit => "memory_hit",
            LookupReason::DurableHit => "durable_hit",
            LookupReason::Expired => "expired",
            LookupReason::NotFound => "not_found",
            LookupReason::Error(_) => "error",
        }
    }
}

impl fmt::Display for LookupReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupReason::Error(msg) => write!(f, "error: {}", msg),
            other => f.write_str(other.as_str()),
        }
    }
}

impl Serialize for LookupReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Outcome details of a two-level cache lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheLookup {
    /// Whether a payload was returned.
    pub cached: bool,
    /// Why.
    pub reason: LookupReason,
    /// Age of the entry that was inspected (zero when none was).
    #[serde(rename = "age_seconds", serialize_with = "serialize_secs")]
    pub age: Duration,
}

impl CacheLookup {
    /// A lookup that returned a payload.
    pub fn hit(reason: LookupReason, age: Duration) -> Self {
        Self {
            cached: true,
            reason,
            age,
        }
    }

    /// A lookup that returned nothing.
    pub fn miss(reason: LookupReason) -> Self {
        Self {
            cached: false,
            reason,
            age: Duration::ZERO,
        }
    }

    /// A miss caused by an expired entry of the given age.
    pub fn expired(age: Duration) -> Self {
        Self {
            cached: false,
            reason: LookupReason::Expired,
            age,
        }
    }

    /// Lookup info attached to freshly computed data.
    pub fn fresh() -> Self {
        Self::miss(LookupReason::NotFound)
    }
}

fn serialize_secs<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(d.as_secs_f64())
}
