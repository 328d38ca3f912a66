//! Theme catalogs.
//!
//! Two independently crawled catalogs (primary and secondary) are kept as
//! full snapshots and merged at query time. See [`ThemeCatalogCache`].

mod catalog;
mod coalesce;
mod error;
mod snapshot;
mod source;
mod trigger;
mod types;

pub use catalog::{CatalogConfig, ThemeCatalogCache};
pub use coalesce::{LeaderGuard, RebuildCoalescer, RebuildResult, RebuildSlot};
pub use error::CatalogError;
pub use snapshot::SnapshotStore;
pub use source::{CatalogSource, SourcePlan};
pub use trigger::{CatalogRefresher, RefreshTrigger, MAX_REFRESH_PERIOD};
pub use types::{
    CatalogInfo, CatalogSnapshot, Constituent, MatchResult, SourceTag, ThemeEntry, ThemeHeader,
};
