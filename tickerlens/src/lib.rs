//! TickerLens - cached, best-effort per-subject market reports.
//!
//! This library keeps repeated, overlapping requests for slow or
//! rate-limited upstream data cheap and consistent. It provides:
//!
//! - a two-level (memory + durable) TTL cache ([`cache::TwoLevelCache`])
//! - a per-resource TTL cache for intermediate fetch results
//!   ([`cache::ResourceCacheManager`])
//! - a dual-source theme catalog cache with single-flight rebuilds
//!   ([`themes::ThemeCatalogCache`])
//! - a bounded fan-out for narrative fetches
//!   ([`narrative::ParallelFetchOrchestrator`])
//! - the top-level composition ([`analysis::AnalysisOrchestrator`])
//!
//! Upstream systems (brokerage API, scrapers, text generation) are
//! consumed through the traits in [`gateway`] and [`themes::CatalogSource`].

pub mod analysis;
pub mod cache;
pub mod clock;
pub mod config;
pub mod gateway;
pub mod logging;
pub mod narrative;
pub mod themes;

/// Crate version, recorded in logs at startup.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
