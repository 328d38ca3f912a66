//! Single-flight guard for catalog rebuilds.
//!
//! The first caller to register for a source becomes the leader and runs
//! the rebuild. Callers registering while it is in flight receive a
//! broadcast receiver and wait for the leader's result.
//!
//! ```text
//! register(tag) ─┬─ no rebuild in flight ──► Leader(guard) ──► rebuild ──► guard.complete(result)
//!                └─ rebuild in flight ─────► Follower(rx) ─────────────────► rx.recv()
//! ```
//!
//! If the leader is dropped without completing, its sender is removed and
//! followers observe a closed channel.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::error::CatalogError;
use super::types::{CatalogSnapshot, SourceTag};

/// Result shared with every waiter.
pub type RebuildResult = Result<Arc<CatalogSnapshot>, CatalogError>;

/// Outcome of [`RebuildCoalescer::register`].
pub enum RebuildSlot<'a> {
    /// Caller must run the rebuild and complete the guard.
    Leader(LeaderGuard<'a>),
    /// A rebuild is already running; await its result.
    Follower(broadcast::Receiver<RebuildResult>),
}

/// Tracks in-flight rebuilds per source.
#[derive(Default)]
pub struct RebuildCoalescer {
    in_flight: Mutex<HashMap<SourceTag, broadcast::Sender<RebuildResult>>>,
}

impl RebuildCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in a rebuild of `tag`.
    pub fn register(&self, tag: SourceTag) -> RebuildSlot<'_> {
        let mut in_flight = self.in_flight.lock();
        if let Some(tx) = in_flight.get(&tag) {
            return RebuildSlot::Follower(tx.subscribe());
        }
        let (tx, _) = broadcast::channel(1);
        in_flight.insert(tag, tx);
        RebuildSlot::Leader(LeaderGuard {
            coalescer: self,
            tag,
            completed: false,
        })
    }

    /// Whether a rebuild of `tag` is running.
    pub fn is_in_flight(&self, tag: SourceTag) -> bool {
        self.in_flight.lock().contains_key(&tag)
    }

    fn finish(&self, tag: SourceTag, result: Option<RebuildResult>) {
        let tx = self.in_flight.lock().remove(&tag);
        if let (Some(tx), Some(result)) = (tx, result) {
            // No receivers is fine: nobody was waiting.
            let _ = tx.send(result);
        }
    }
}

/// Leadership of one in-flight rebuild.
pub struct LeaderGuard<'a> {
    coalescer: &'a RebuildCoalescer,
    tag: SourceTag,
    completed: bool,
}

impl LeaderGuard<'_> {
    /// Publishes `result` to all followers and ends the rebuild.
    pub fn complete(mut self, result: RebuildResult) {
        self.completed = true;
        self.coalescer.finish(self.tag, Some(result));
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.coalescer.finish(self.tag, None);
        }
    }
}
