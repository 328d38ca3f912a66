//! Upstream failure taxonomy.

use thiserror::Error;

/// Failure reported by any external collaborator.
///
/// `Clone` so a single failure can be reported to several waiters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// Network failure or upstream outage.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// The collaborator's own timeout elapsed.
    #[error("upstream timed out after {0}s")]
    Timeout(u64),

    /// Credentials rejected.
    #[error("upstream authentication failed: {0}")]
    Auth(String),

    /// Response could not be interpreted.
    #[error("malformed upstream response: {0}")]
    Malformed(String),

    /// The task running the call panicked.
    #[error("upstream task panicked: {0}")]
    Panicked(String),
}

impl UpstreamError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        UpstreamError::Unavailable(msg.into())
    }
}
