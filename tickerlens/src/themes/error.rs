use thiserror::Error;

use super::types::SourceTag;
use crate::gateway::UpstreamError;

/// Catalog rebuild failures.
///
/// `Clone` so one failed rebuild can be delivered to every coalesced
/// waiter.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// The theme listing could not be fetched.
    #[error("catalog listing failed: {0}")]
    Upstream(#[from] UpstreamError),

    /// The listing succeeded but contained no themes.
    #[error("{0} catalog listing returned no themes")]
    EmptyListing(SourceTag),

    /// The rebuilt snapshot could not be written to disk.
    #[error("failed to persist {source_tag} snapshot: {message}")]
    Persist { source_tag: SourceTag, message: String },

    /// The rebuild being awaited was abandoned before it finished.
    #[error("{0} catalog rebuild was cancelled")]
    Cancelled(SourceTag),
}
