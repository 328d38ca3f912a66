//! Dual-source theme catalog.
//!
//! Holds one snapshot per source in memory, mirrored to disk. A rebuild
//! lists every theme header, fetches each theme's constituents one by one,
//! and swaps in the complete snapshot only after the file is committed.
//! A theme whose constituent fetch fails stays in the snapshot with no
//! constituents; a failed listing leaves the previous snapshot untouched.
//!
//! The primary snapshot is rebuilt lazily when a reader finds it stale. The
//! secondary snapshot is only rebuilt through [`ThemeCatalogCache::refresh`].

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::coalesce::{RebuildCoalescer, RebuildResult, RebuildSlot};
use super::error::CatalogError;
use super::snapshot::SnapshotStore;
use super::source::{CatalogSource, SourcePlan};
use super::trigger::RefreshTrigger;
use super::types::{CatalogInfo, CatalogSnapshot, MatchResult, SourceTag, ThemeEntry};
use crate::clock::{elapsed_since, SharedClock};

/// Configuration for [`ThemeCatalogCache`].
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Directory holding the snapshot files
    pub directory: PathBuf,
    pub primary: SourcePlan,
    pub secondary: SourcePlan,
}

impl CatalogConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            primary: SourcePlan::primary(),
            secondary: SourcePlan::secondary(),
        }
    }

    pub fn with_primary(mut self, plan: SourcePlan) -> Self {
        self.primary = plan;
        self
    }

    pub fn with_secondary(mut self, plan: SourcePlan) -> Self {
        self.secondary = plan;
        self
    }

    pub fn plan(&self, tag: SourceTag) -> &SourcePlan {
        match tag {
            SourceTag::Primary => &self.primary,
            SourceTag::Secondary => &self.secondary,
        }
    }
}

/// Merged view over the primary and secondary theme catalogs.
pub struct ThemeCatalogCache {
    config: CatalogConfig,
    primary_source: Arc<dyn CatalogSource>,
    secondary_source: Arc<dyn CatalogSource>,
    store: SnapshotStore,
    primary: RwLock<Option<Arc<CatalogSnapshot>>>,
    secondary: RwLock<Option<Arc<CatalogSnapshot>>>,
    coalescer: RebuildCoalescer,
    clock: SharedClock,
}

impl ThemeCatalogCache {
    /// Creates the cache and loads any snapshots already on disk.
    ///
    /// An unreadable or corrupt snapshot file is logged and treated as
    /// absent.
    pub fn new(
        config: CatalogConfig,
        primary_source: Arc<dyn CatalogSource>,
        secondary_source: Arc<dyn CatalogSource>,
        clock: SharedClock,
    ) -> Self {
        let store = SnapshotStore::new(config.directory.clone());
        let load = |tag: SourceTag| match store.load(tag) {
            Ok(Some(snapshot)) => {
                debug!(source = %tag, count = snapshot.count, "loaded catalog snapshot");
                Some(Arc::new(snapshot))
            }
            Ok(None) => None,
            Err(e) => {
                warn!(source = %tag, error = %e, "ignoring unreadable catalog snapshot");
                None
            }
        };
        let primary = load(SourceTag::Primary);
        let secondary = load(SourceTag::Secondary);

        Self {
            config,
            primary_source,
            secondary_source,
            store,
            primary: RwLock::new(primary),
            secondary: RwLock::new(secondary),
            coalescer: RebuildCoalescer::new(),
            clock,
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    fn slot(&self, tag: SourceTag) -> &RwLock<Option<Arc<CatalogSnapshot>>> {
        match tag {
            SourceTag::Primary => &self.primary,
            SourceTag::Secondary => &self.secondary,
        }
    }

    fn source(&self, tag: SourceTag) -> &Arc<dyn CatalogSource> {
        match tag {
            SourceTag::Primary => &self.primary_source,
            SourceTag::Secondary => &self.secondary_source,
        }
    }

    /// Current snapshot for `tag`, without refreshing.
    pub fn snapshot(&self, tag: SourceTag) -> Option<Arc<CatalogSnapshot>> {
        self.slot(tag).read().clone()
    }

    /// Whether the snapshot for `tag` exists and is younger than its
    /// source's max age (24 hours primary, 30 days secondary by default).
    pub fn is_valid(&self, tag: SourceTag) -> bool {
        match self.snapshot(tag) {
            Some(snapshot) => self.age(&snapshot) < self.config.plan(tag).max_age,
            None => false,
        }
    }

    fn age(&self, snapshot: &CatalogSnapshot) -> Duration {
        elapsed_since(snapshot.updated_at, self.clock.now())
    }

    /// Returns the primary snapshot, rebuilding it first if it is stale or
    /// `force_refresh` is set.
    ///
    /// A failed rebuild falls back to the stale snapshot, or to an empty
    /// one if none exists. The secondary catalog is never touched here.
    pub async fn get(&self, force_refresh: bool) -> Arc<CatalogSnapshot> {
        let current = self.snapshot(SourceTag::Primary);
        if !force_refresh && self.is_valid(SourceTag::Primary) {
            if let Some(snapshot) = current {
                return snapshot;
            }
        }

        let trigger = if force_refresh {
            RefreshTrigger::Manual
        } else {
            RefreshTrigger::LazyOnStaleRead
        };

        match self.refresh(SourceTag::Primary, trigger).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "primary catalog rebuild failed, serving previous snapshot");
                self.snapshot(SourceTag::Primary)
                    .unwrap_or_else(|| Arc::new(CatalogSnapshot::empty()))
            }
        }
    }

    /// Rebuilds the snapshot for `tag`.
    ///
    /// Concurrent calls for the same source share one rebuild. A lazy
    /// refresh that wins leadership after another rebuild already made the
    /// snapshot valid returns that snapshot without rebuilding again.
    pub async fn refresh(&self, tag: SourceTag, trigger: RefreshTrigger) -> RebuildResult {
        match self.coalescer.register(tag) {
            RebuildSlot::Follower(mut rx) => {
                debug!(source = %tag, trigger = %trigger, "joining in-flight catalog rebuild");
                rx.recv().await.unwrap_or(Err(CatalogError::Cancelled(tag)))
            }
            RebuildSlot::Leader(guard) => {
                if trigger == RefreshTrigger::LazyOnStaleRead && self.is_valid(tag) {
                    if let Some(snapshot) = self.snapshot(tag) {
                        guard.complete(Ok(Arc::clone(&snapshot)));
                        return Ok(snapshot);
                    }
                }
                let result = self.rebuild(tag, trigger).await;
                guard.complete(result.clone());
                result
            }
        }
    }

    async fn rebuild(&self, tag: SourceTag, trigger: RefreshTrigger) -> RebuildResult {
        let start = Instant::now();
        let plan = self.config.plan(tag);
        let source = self.source(tag);
        info!(source = %tag, trigger = %trigger, pages = plan.pages, "catalog rebuild started");

        let mut headers = Vec::new();
        let mut seen = HashSet::new();
        let mut calls = 0usize;

        for page in 1..=plan.pages {
            self.pace(plan, &mut calls).await;
            match source.list_themes(page).await {
                Ok(list) if list.is_empty() => break,
                Ok(list) => {
                    for header in list {
                        if seen.insert(header.dedup_key().to_string()) {
                            headers.push(header);
                        }
                    }
                }
                Err(e) if page == 1 => {
                    warn!(source = %tag, error = %e, "catalog listing failed");
                    return Err(CatalogError::Upstream(e));
                }
                Err(e) => {
                    warn!(source = %tag, page, error = %e, "catalog listing page failed, stopping pagination");
                    break;
                }
            }
        }

        if headers.is_empty() {
            warn!(source = %tag, "catalog listing returned no themes");
            return Err(CatalogError::EmptyListing(tag));
        }

        let total = headers.len();
        let mut failed = 0usize;
        let mut entries = Vec::with_capacity(total);

        for (idx, header) in headers.into_iter().enumerate() {
            self.pace(plan, &mut calls).await;
            let constituents = match source.fetch_constituents(&header).await {
                Ok(c) => c,
                Err(e) => {
                    failed += 1;
                    warn!(source = %tag, theme = %header.name, error = %e, "constituent fetch failed, keeping theme empty");
                    Vec::new()
                }
            };
            if (idx + 1) % 10 == 0 {
                debug!(source = %tag, progress = idx + 1, total, "catalog rebuild progress");
            }
            entries.push(ThemeEntry {
                theme_id: header.theme_id,
                name: header.name,
                fluctuation_pct: header.fluctuation_pct,
                constituents,
                source_tag: tag,
            });
        }

        let snapshot = Arc::new(CatalogSnapshot::new(self.clock.now(), entries));
        self.store
            .save(tag, &snapshot)
            .map_err(|e| CatalogError::Persist {
                source_tag: tag,
                message: e.to_string(),
            })?;
        *self.slot(tag).write() = Some(Arc::clone(&snapshot));

        info!(
            source = %tag,
            themes = snapshot.count,
            failed_constituents = failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "catalog rebuild finished"
        );
        Ok(snapshot)
    }

    /// Sleeps between consecutive remote calls of one rebuild.
    async fn pace(&self, plan: &SourcePlan, calls: &mut usize) {
        if *calls > 0 && !plan.request_delay.is_zero() {
            tokio::time::sleep(plan.request_delay).await;
        }
        *calls += 1;
    }

    /// Finds the themes containing a subject, across both catalogs.
    ///
    /// Refreshes the primary catalog first if it is stale.
    pub async fn find(&self, query: &str) -> Vec<MatchResult> {
        let primary = self.get(false).await;
        let secondary = self.snapshot(SourceTag::Secondary);
        find_in(query, [Some(primary.as_ref()), secondary.as_deref()])
    }

    /// Same as [`find`](Self::find) over the current snapshots, without
    /// refreshing anything.
    pub fn find_cached(&self, query: &str) -> Vec<MatchResult> {
        let primary = self.snapshot(SourceTag::Primary);
        let secondary = self.snapshot(SourceTag::Secondary);
        find_in(query, [primary.as_deref(), secondary.as_deref()])
    }

    /// Primary themes whose name contains `keyword` (case-insensitive).
    /// A blank keyword returns every theme.
    pub async fn search(&self, keyword: &str) -> Vec<ThemeEntry> {
        let primary = self.get(false).await;
        search_in(&primary, keyword)
    }

    /// Same as [`search`](Self::search) without refreshing.
    pub fn search_cached(&self, keyword: &str) -> Vec<ThemeEntry> {
        match self.snapshot(SourceTag::Primary) {
            Some(primary) => search_in(&primary, keyword),
            None => Vec::new(),
        }
    }

    /// Describes the snapshot for `tag`.
    pub fn info(&self, tag: SourceTag) -> CatalogInfo {
        match self.snapshot(tag) {
            Some(snapshot) => CatalogInfo {
                source: tag,
                exists: true,
                updated_at: Some(snapshot.updated_at),
                count: snapshot.count,
                valid: self.age(&snapshot) < self.config.plan(tag).max_age,
            },
            None => CatalogInfo {
                source: tag,
                exists: false,
                updated_at: None,
                count: 0,
                valid: false,
            },
        }
    }
}

/// Scans snapshots in order, recording at most one match per theme.
fn find_in(query: &str, snapshots: [Option<&CatalogSnapshot>; 2]) -> Vec<MatchResult> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut matches = Vec::new();
    for snapshot in snapshots.into_iter().flatten() {
        for theme in &snapshot.entries {
            let hit = theme.constituents.iter().find(|c| {
                c.name.to_lowercase().contains(&needle) || c.code.to_lowercase().contains(&needle)
            });
            if let Some(c) = hit {
                matches.push(MatchResult {
                    source: theme.source_tag,
                    theme_name: theme.name.clone(),
                    fluctuation_pct: theme.fluctuation_pct,
                    stock_name: c.name.clone(),
                    stock_code: c.code.clone(),
                });
            }
        }
    }
    matches
}

fn search_in(snapshot: &CatalogSnapshot, keyword: &str) -> Vec<ThemeEntry> {
    let needle = keyword.trim().to_lowercase();
    snapshot
        .entries
        .iter()
        .filter(|t| needle.is_empty() || t.name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}
