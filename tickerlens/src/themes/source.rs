//! Catalog source contract and per-source fetch plans.

use std::time::Duration;

use super::types::{Constituent, SourceTag, ThemeHeader};
use crate::gateway::{BoxFuture, UpstreamError};

/// A remote theme catalog.
///
/// Listing is paginated; constituents are fetched one theme at a time.
pub trait CatalogSource: Send + Sync {
    fn tag(&self) -> SourceTag;

    /// Lists theme headers on `page` (1-based). An empty page ends the
    /// listing.
    fn list_themes(&self, page: u32) -> BoxFuture<'_, Result<Vec<ThemeHeader>, UpstreamError>>;

    fn fetch_constituents<'a>(
        &'a self,
        header: &'a ThemeHeader,
    ) -> BoxFuture<'a, Result<Vec<Constituent>, UpstreamError>>;
}

/// How a source is crawled and how long its snapshot stays valid.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePlan {
    /// Number of listing pages to read.
    pub pages: u32,
    /// Pause between consecutive remote calls.
    pub request_delay: Duration,
    /// Snapshot validity window.
    pub max_age: Duration,
}

impl SourcePlan {
    /// Single-page listing, no pacing, valid for 24 hours.
    pub fn primary() -> Self {
        Self {
            pages: 1,
            request_delay: Duration::ZERO,
            max_age: Duration::from_secs(24 * 3600),
        }
    }

    /// Seven listing pages, 200 ms between calls, valid for 30 days.
    pub fn secondary() -> Self {
        Self {
            pages: 7,
            request_delay: Duration::from_millis(200),
            max_age: Duration::from_secs(30 * 24 * 3600),
        }
    }

    pub fn with_pages(mut self, pages: u32) -> Self {
        self.pages = pages.max(1);
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }
}
