//! Short-lived cache for intermediate fetch results.
//!
//! Deduplicates repeated upstream calls for the same resource while a
//! composite report is being assembled. Nothing here is durable, and each
//! resource kind has its own TTL:
//!
//! | Kind | Default TTL |
//! |------|-------------|
//! | quote | never cached |
//! | daily series | 60 s |
//! | fundamentals | 300 s |
//! | order flow | 60 s (or never) |

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::trace;

use super::key::normalize_subject;
use crate::clock::{elapsed_since, SharedClock};
use crate::gateway::{Fundamentals, Ohlcv, OrderFlow, Quote};

/// Resource kinds handled by [`ResourceCacheManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Quote,
    Series,
    OrderFlow,
    Fundamentals,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Quote => "quote",
            ResourceKind::Series => "series",
            ResourceKind::OrderFlow => "order_flow",
            ResourceKind::Fundamentals => "fundamentals",
        };
        f.write_str(s)
    }
}

/// Per-kind TTLs. `None` means the kind is never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceTtls {
    pub series: Duration,
    pub fundamentals: Duration,
    pub order_flow: Option<Duration>,
}

impl Default for ResourceTtls {
    fn default() -> Self {
        Self {
            series: Duration::from_secs(60),
            fundamentals: Duration::from_secs(300),
            order_flow: Some(Duration::from_secs(60)),
        }
    }
}

impl ResourceTtls {
    /// TTL for `kind`, or `None` if it is never cached.
    pub fn ttl_for(&self, kind: ResourceKind) -> Option<Duration> {
        let ttl = match kind {
            ResourceKind::Quote => None,
            ResourceKind::Series => Some(self.series),
            ResourceKind::OrderFlow => self.order_flow,
            ResourceKind::Fundamentals => Some(self.fundamentals),
        };
        ttl.filter(|t| !t.is_zero())
    }
}

/// Key of one cached resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    subject: String,
    kind: ResourceKind,
}

impl ResourceKey {
    pub fn new(subject: &str, kind: ResourceKind) -> Self {
        Self {
            subject: normalize_subject(subject),
            kind,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

/// A cached value, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceValue {
    Quote(Quote),
    Series(Arc<Vec<Ohlcv>>),
    OrderFlow(OrderFlow),
    Fundamentals(Fundamentals),
}

impl ResourceValue {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceValue::Quote(_) => ResourceKind::Quote,
            ResourceValue::Series(_) => ResourceKind::Series,
            ResourceValue::OrderFlow(_) => ResourceKind::OrderFlow,
            ResourceValue::Fundamentals(_) => ResourceKind::Fundamentals,
        }
    }
}

/// Typed access to [`ResourceValue`] variants.
pub trait CachedResource: Sized {
    const KIND: ResourceKind;

    fn into_value(self) -> ResourceValue;

    fn from_value(value: ResourceValue) -> Option<Self>;
}

impl CachedResource for Quote {
    const KIND: ResourceKind = ResourceKind::Quote;

    fn into_value(self) -> ResourceValue {
        ResourceValue::Quote(self)
    }

    fn from_value(value: ResourceValue) -> Option<Self> {
        match value {
            ResourceValue::Quote(q) => Some(q),
            _ => None,
        }
    }
}

impl CachedResource for Arc<Vec<Ohlcv>> {
    const KIND: ResourceKind = ResourceKind::Series;

    fn into_value(self) -> ResourceValue {
        ResourceValue::Series(self)
    }

    fn from_value(value: ResourceValue) -> Option<Self> {
        match value {
            ResourceValue::Series(s) => Some(s),
            _ => None,
        }
    }
}

impl CachedResource for OrderFlow {
    const KIND: ResourceKind = ResourceKind::OrderFlow;

    fn into_value(self) -> ResourceValue {
        ResourceValue::OrderFlow(self)
    }

    fn from_value(value: ResourceValue) -> Option<Self> {
        match value {
            ResourceValue::OrderFlow(f) => Some(f),
            _ => None,
        }
    }
}

impl CachedResource for Fundamentals {
    const KIND: ResourceKind = ResourceKind::Fundamentals;

    fn into_value(self) -> ResourceValue {
        ResourceValue::Fundamentals(self)
    }

    fn from_value(value: ResourceValue) -> Option<Self> {
        match value {
            ResourceValue::Fundamentals(f) => Some(f),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Stored {
    value: ResourceValue,
    stored_at: DateTime<Utc>,
    ttl: Duration,
}

/// TTL buckets keyed by `(subject, kind)`.
///
/// Backed by a sharded map so concurrent report builds never lose updates.
pub struct ResourceCacheManager {
    entries: DashMap<ResourceKey, Stored>,
    ttls: ResourceTtls,
    clock: SharedClock,
}

impl ResourceCacheManager {
    pub fn new(ttls: ResourceTtls, clock: SharedClock) -> Self {
        Self {
            entries: DashMap::new(),
            ttls,
            clock,
        }
    }

    pub fn ttls(&self) -> &ResourceTtls {
        &self.ttls
    }

    /// Returns the value for `key` if it was stored less than its TTL ago.
    ///
    /// Unlike the two-level cache, an entry whose age equals its TTL is
    /// already stale here.
    pub fn get(&self, key: &ResourceKey) -> Option<ResourceValue> {
        let now = self.clock.now();
        {
            let stored = self.entries.get(key)?;
            if elapsed_since(stored.stored_at, now) < stored.ttl {
                trace!(subject = key.subject(), kind = %key.kind(), "resource cache hit");
                return Some(stored.value.clone());
            }
        }
        // A concurrent writer may have refreshed the entry since the read.
        self.entries
            .remove_if(key, |_, s| elapsed_since(s.stored_at, now) >= s.ttl);
        None
    }

    /// Stores `value` under `key` for `ttl`. A zero TTL stores nothing.
    pub fn set(&self, key: ResourceKey, value: ResourceValue, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let stored = Stored {
            value,
            stored_at: self.clock.now(),
            ttl,
        };
        self.entries.insert(key, stored);
    }

    /// Typed lookup for `subject`.
    pub fn get_typed<T: CachedResource>(&self, subject: &str) -> Option<T> {
        self.ttls.ttl_for(T::KIND)?;
        self.get(&ResourceKey::new(subject, T::KIND))
            .and_then(T::from_value)
    }

    /// Typed store using the configured TTL for `T`'s kind.
    ///
    /// Returns `false` if the kind is not cached.
    pub fn set_typed<T: CachedResource>(&self, subject: &str, value: T) -> bool {
        match self.ttls.ttl_for(T::KIND) {
            Some(ttl) => {
                self.set(ResourceKey::new(subject, T::KIND), value.into_value(), ttl);
                true
            }
            None => false,
        }
    }

    /// Drops every entry for `subject`.
    pub fn invalidate_subject(&self, subject: &str) {
        let subject = normalize_subject(subject);
        self.entries.retain(|k, _| k.subject != subject);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{NaiveDate, TimeZone};

    fn setup(ttls: ResourceTtls) -> (Arc<ManualClock>, ResourceCacheManager) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
        ));
        let manager = ResourceCacheManager::new(ttls, clock.clone());
        (clock, manager)
    }

    fn series() -> Arc<Vec<Ohlcv>> {
        Arc::new(vec![Ohlcv {
            date: NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(),
            open: 100.0,
            high: 110.0,
            low: 95.0,
            close: 105.0,
            volume: 1000,
        }])
    }

    fn quote() -> Quote {
        Quote {
            code: "005930".into(),
            name: "Samsung".into(),
            price: 70000.0,
            change: 500.0,
            change_rate: 0.72,
        }
    }

    #[test]
    fn test_series_expires_at_ttl() {
        let (clock, manager) = setup(ResourceTtls::default());
        assert!(manager.set_typed("005930", series()));

        clock.advance(Duration::from_secs(59));
        assert!(manager.get_typed::<Arc<Vec<Ohlcv>>>("005930").is_some());

        clock.advance(Duration::from_secs(1));
        assert!(manager.get_typed::<Arc<Vec<Ohlcv>>>("005930").is_none());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_fundamentals_live_longer() {
        let (clock, manager) = setup(ResourceTtls::default());
        manager.set_typed("005930", Fundamentals::default());

        clock.advance(Duration::from_secs(120));
        assert!(manager.get_typed::<Fundamentals>("005930").is_some());
        clock.advance(Duration::from_secs(180));
        assert!(manager.get_typed::<Fundamentals>("005930").is_none());
    }

    #[test]
    fn test_quote_is_never_cached() {
        let (_clock, manager) = setup(ResourceTtls::default());
        assert!(!manager.set_typed("005930", quote()));
        assert!(manager.get_typed::<Quote>("005930").is_none());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_order_flow_can_be_disabled() {
        let ttls = ResourceTtls {
            order_flow: None,
            ..ResourceTtls::default()
        };
        let (_clock, manager) = setup(ttls);
        assert!(!manager.set_typed("005930", OrderFlow::default()));
        assert!(manager.get_typed::<OrderFlow>("005930").is_none());
    }

    #[test]
    fn test_subjects_normalized() {
        let (_clock, manager) = setup(ResourceTtls::default());
        manager.set_typed("A005930", series());
        assert!(manager.get_typed::<Arc<Vec<Ohlcv>>>("005930").is_some());
    }

    #[test]
    fn test_untyped_set_with_explicit_ttl() {
        let (clock, manager) = setup(ResourceTtls::default());
        let key = ResourceKey::new("005930", ResourceKind::Quote);
        manager.set(key.clone(), ResourceValue::Quote(quote()), Duration::from_secs(5));

        assert_eq!(manager.get(&key), Some(ResourceValue::Quote(quote())));
        clock.advance(Duration::from_secs(5));
        assert_eq!(manager.get(&key), None);
    }

    #[test]
    fn test_invalidate_subject() {
        let (_clock, manager) = setup(ResourceTtls::default());
        manager.set_typed("005930", series());
        manager.set_typed("005930", Fundamentals::default());
        manager.set_typed("000660", series());

        manager.invalidate_subject("005930");
        assert_eq!(manager.len(), 1);
    }
}
