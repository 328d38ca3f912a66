//! On-disk snapshot files.
//!
//! One JSON document per source, `{source}_themes.json`, replaced atomically.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::types::{CatalogSnapshot, SourceTag};
use crate::cache::{write_atomic, CacheError};

/// Reads and writes catalog snapshot files.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    directory: PathBuf,
}

impl SnapshotStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path(&self, tag: SourceTag) -> PathBuf {
        self.directory.join(format!("{}_themes.json", tag))
    }

    /// Loads the snapshot for `tag`. `Ok(None)` if no file exists.
    pub fn load(&self, tag: SourceTag) -> Result<Option<CatalogSnapshot>, CacheError> {
        let path = self.path(tag);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(&path, e)),
        };
        let snapshot = serde_json::from_slice(&bytes)
            .map_err(|source| CacheError::Corrupt { path, source })?;
        Ok(Some(snapshot))
    }

    /// Atomically replaces the snapshot file for `tag`.
    pub fn save(&self, tag: SourceTag, snapshot: &CatalogSnapshot) -> Result<(), CacheError> {
        let path = self.path(tag);
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&path, &bytes, None)?;
        debug!(source = %tag, path = %path.display(), count = snapshot.count, "snapshot saved");
        Ok(())
    }
}
