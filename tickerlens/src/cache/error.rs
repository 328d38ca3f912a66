//! Cache error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the durable cache layer.
///
/// None of these reach callers of [`TwoLevelCache`](super::TwoLevelCache):
/// a failed read is reported as a miss and a failed write is logged.
#[derive(Debug, Error)]
pub enum CacheError {
    /// File system operation failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The stored document could not be parsed.
    #[error("Corrupt cache file {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The payload could not be serialized.
    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_display() {
        let err = CacheError::io(
            "/tmp/x.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/x.json"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_cache_error_from_serde() {
        let serde_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: CacheError = serde_err.into();
        assert!(matches!(err, CacheError::Serialize(_)));
    }
}
