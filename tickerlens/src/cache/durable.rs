//! File-backed durable layer.
//!
//! One JSON document per key, named `{subject}_{resource}.json`, holding
//! exactly the stored payload. The file's modification time is the entry's
//! creation time. Writes go through [`write_atomic`] so a reader sees either
//! the previous document or the new one.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use super::atomic::write_atomic;
use super::entry::CacheEntry;
use super::error::CacheError;
use super::key::CacheKey;

/// Result of reading one key from disk.
#[derive(Debug)]
pub enum DurableRead {
    /// No document for the key.
    Missing,
    /// A document exists but is older than the TTL.
    Expired { age: Duration },
    /// A valid document.
    Fresh(CacheEntry),
}

/// Summary of a durable file, used by listing tools.
#[derive(Debug, Clone)]
pub struct DurableFileInfo {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
    pub size_bytes: u64,
}

/// JSON file store with a single TTL.
#[derive(Debug, Clone)]
pub struct DurableCache {
    directory: PathBuf,
    ttl: Duration,
}

impl DurableCache {
    /// Creates a store rooted at `directory`. The directory is created on
    /// first write.
    pub fn new(directory: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            directory: directory.into(),
            ttl,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Path of the document for `key`.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.directory.join(format!("{}.json", key.file_stem()))
    }

    /// Reads the document for `key` as of `now`.
    ///
    /// The mtime and the payload come from one open handle, so a
    /// concurrent replacement cannot pair a new payload with an old
    /// timestamp. The TTL is checked before the payload is read, so expired
    /// documents are never decoded.
    pub fn read(&self, key: &CacheKey, now: DateTime<Utc>) -> Result<DurableRead, CacheError> {
        let path = self.path_for(key);

        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(DurableRead::Missing),
            Err(e) => return Err(CacheError::io(&path, e)),
        };
        let created_at: DateTime<Utc> = file
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| CacheError::io(&path, e))?
            .into();

        let entry_age = crate::clock::elapsed_since(created_at, now);
        if entry_age > self.ttl {
            debug!(key = %key, age_secs = entry_age.as_secs(), "durable entry expired");
            return Ok(DurableRead::Expired { age: entry_age });
        }

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| CacheError::io(&path, e))?;
        let payload: Value = serde_json::from_slice(&bytes)
            .map_err(|source| CacheError::Corrupt { path, source })?;

        Ok(DurableRead::Fresh(CacheEntry::new(payload, created_at, self.ttl)))
    }

    /// Atomically writes `payload` for `key`, stamped with `created_at`.
    pub fn write(
        &self,
        key: &CacheKey,
        payload: &Value,
        created_at: DateTime<Utc>,
    ) -> Result<PathBuf, CacheError> {
        let path = self.path_for(key);
        let bytes = serde_json::to_vec_pretty(payload)?;
        write_atomic(&path, &bytes, Some(created_at))?;
        debug!(key = %key, path = %path.display(), bytes = bytes.len(), "durable entry written");
        Ok(path)
    }

    /// Deletes the document for `key`. Returns whether a file was removed.
    pub fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    /// Lists committed documents, ignoring temp artifacts.
    pub fn list(&self) -> Result<Vec<DurableFileInfo>, CacheError> {
        let dir = match std::fs::read_dir(&self.directory) {
            Ok(d) => d,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&self.directory, e)),
        };

        let mut files = Vec::new();
        for entry in dir {
            let entry = entry.map_err(|e| CacheError::io(&self.directory, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let metadata = entry.metadata().map_err(|e| CacheError::io(&path, e))?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata
                .modified()
                .map_err(|e| CacheError::io(&path, e))?
                .into();
            files.push(DurableFileInfo {
                path,
                modified,
                size_bytes: metadata.len(),
            });
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Deletes every committed document. Returns the number removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let files = self.list()?;
        for file in &files {
            std::fs::remove_file(&file.path).map_err(|e| CacheError::io(&file.path, e))?;
        }
        Ok(files.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::ResourceType;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    fn key() -> CacheKey {
        CacheKey::new("005930", ResourceType::Outlook)
    }

    #[test]
    fn test_write_then_read_fresh() {
        let temp = TempDir::new().unwrap();
        let store = DurableCache::new(temp.path(), Duration::from_secs(3600));

        let path = store.write(&key(), &json!({"rating": "buy"}), t0()).unwrap();
        assert_eq!(path.file_name().unwrap(), "005930_outlook.json");

        match store.read(&key(), t0() + secs(10)).unwrap() {
            DurableRead::Fresh(entry) => {
                assert_eq!(entry.payload(), &json!({"rating": "buy"}));
                assert_eq!(entry.created_at().timestamp(), t0().timestamp());
                assert_eq!(entry.ttl(), Duration::from_secs(3600));
            }
            other => panic!("expected fresh read, got {:?}", other),
        }
    }

    #[test]
    fn test_document_has_no_envelope() {
        let temp = TempDir::new().unwrap();
        let store = DurableCache::new(temp.path(), Duration::from_secs(3600));
        let path = store.write(&key(), &json!([1, 2]), t0()).unwrap();

        let raw: Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(raw, json!([1, 2]));
    }

    #[test]
    fn test_overwrite_pairs_new_payload_with_new_timestamp() {
        let temp = TempDir::new().unwrap();
        let store = DurableCache::new(temp.path(), Duration::from_secs(3600));
        store.write(&key(), &json!({"v": 1}), t0()).unwrap();
        store.write(&key(), &json!({"v": 2}), t0() + secs(120)).unwrap();

        match store.read(&key(), t0() + secs(130)).unwrap() {
            DurableRead::Fresh(entry) => {
                assert_eq!(entry.payload(), &json!({"v": 2}));
                assert_eq!(entry.created_at().timestamp(), (t0() + secs(120)).timestamp());
                assert_eq!(entry.age(t0() + secs(130)), Duration::from_secs(10));
            }
            other => panic!("expected fresh read, got {:?}", other),
        }
    }

    #[test]
    fn test_read_missing() {
        let temp = TempDir::new().unwrap();
        let store = DurableCache::new(temp.path().join("never-created"), Duration::from_secs(60));
        assert!(matches!(store.read(&key(), t0()).unwrap(), DurableRead::Missing));
    }

    #[test]
    fn test_read_expired_boundary() {
        let temp = TempDir::new().unwrap();
        let store = DurableCache::new(temp.path(), Duration::from_secs(3600));
        store.write(&key(), &json!(1), t0()).unwrap();

        assert!(matches!(
            store.read(&key(), t0() + secs(3600)).unwrap(),
            DurableRead::Fresh(_)
        ));
        match store.read(&key(), t0() + secs(3601)).unwrap() {
            DurableRead::Expired { age } => assert_eq!(age, Duration::from_secs(3601)),
            other => panic!("expected expired read, got {:?}", other),
        }
    }

    #[test]
    fn test_read_corrupt_file() {
        let temp = TempDir::new().unwrap();
        let store = DurableCache::new(temp.path(), Duration::from_secs(3600));
        let path = store.write(&key(), &json!(1), t0()).unwrap();
        std::fs::write(&path, b"{ truncated").unwrap();
        let mtime = filetime::FileTime::from_unix_time(t0().timestamp(), 0);
        filetime::set_file_mtime(&path, mtime).unwrap();

        let err = store.read(&key(), t0()).unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }

    #[test]
    fn test_stray_temp_file_does_not_affect_committed_document() {
        let temp = TempDir::new().unwrap();
        let store = DurableCache::new(temp.path(), Duration::from_secs(3600));
        store.write(&key(), &json!({"v": 1}), t0()).unwrap();

        // Interrupted write: temp artifact exists but was never renamed.
        std::fs::write(temp.path().join(".005930_outlook.json.tmp"), b"{\"v\": 2").unwrap();

        match store.read(&key(), t0()).unwrap() {
            DurableRead::Fresh(entry) => assert_eq!(entry.payload(), &json!({"v": 1})),
            other => panic!("expected fresh read, got {:?}", other),
        }
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let temp = TempDir::new().unwrap();
        let store = DurableCache::new(temp.path(), Duration::from_secs(3600));
        store.write(&key(), &json!(1), t0()).unwrap();
        store
            .write(&CacheKey::new("000660", ResourceType::News), &json!(2), t0())
            .unwrap();

        assert!(store.remove(&key()).unwrap());
        assert!(!store.remove(&key()).unwrap());
        assert_eq!(store.clear().unwrap(), 1);
        assert!(store.list().unwrap().is_empty());
    }
}
