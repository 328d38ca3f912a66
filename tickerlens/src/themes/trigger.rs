//! Rebuild triggers.
//!
//! The catalog does not care why a rebuild runs; the trigger is only
//! recorded in logs. [`CatalogRefresher`] implements the timer trigger as a
//! background task.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::catalog::ThemeCatalogCache;
use super::types::SourceTag;

/// Longest supported refresh period (one year). Longer periods are clamped.
pub const MAX_REFRESH_PERIOD: Duration = Duration::from_secs(365 * 24 * 3600);

/// Why a rebuild was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// Operator or caller request (including force refresh).
    Manual,
    /// Periodic background refresh.
    Timer,
    /// A reader found the snapshot stale.
    LazyOnStaleRead,
}

impl fmt::Display for RefreshTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RefreshTrigger::Manual => "manual",
            RefreshTrigger::Timer => "timer",
            RefreshTrigger::LazyOnStaleRead => "lazy_on_stale_read",
        };
        f.write_str(s)
    }
}

/// Background task rebuilding one catalog on a fixed period.
pub struct CatalogRefresher {
    cancellation: CancellationToken,
    handle: JoinHandle<()>,
}

impl CatalogRefresher {
    /// Spawns the refresher. The first rebuild runs one `period` after
    /// spawning. `period` is clamped to [`MAX_REFRESH_PERIOD`].
    ///
    /// # Arguments
    ///
    /// * `cache` - Catalog to refresh
    /// * `tag` - Source to rebuild on each tick
    /// * `period` - Time between rebuilds
    /// * `cancellation` - Stops the task when cancelled
    pub fn spawn(
        cache: Arc<ThemeCatalogCache>,
        tag: SourceTag,
        period: Duration,
        cancellation: CancellationToken,
    ) -> Self {
        let period = period.min(MAX_REFRESH_PERIOD);
        let token = cancellation.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(source = %tag, period_secs = period.as_secs(), "catalog refresher started");

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!(source = %tag, "catalog refresher cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = cache.refresh(tag, RefreshTrigger::Timer).await {
                            warn!(source = %tag, error = %e, "scheduled catalog rebuild failed");
                        }
                    }
                }
            }
        });

        Self {
            cancellation,
            handle,
        }
    }

    /// Cancels the task and waits for it to exit.
    pub async fn shutdown(self) {
        self.cancellation.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "catalog refresher task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
