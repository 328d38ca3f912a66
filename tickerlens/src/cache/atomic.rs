//! Atomic file replacement.
//!
//! Documents are written to a uniquely named temp file in the target
//! directory and renamed over the destination. Readers see either the
//! previous document or the new one. If anything fails before the rename,
//! the temp file is removed when its handle drops.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use filetime::FileTime;

use super::error::CacheError;

/// Atomically replaces `path` with `contents`.
///
/// When `modified` is given, the file's modification time is set to it
/// before the rename, so the committed file carries that timestamp.
pub(crate) fn write_atomic(
    path: &Path,
    contents: &[u8],
    modified: Option<DateTime<Utc>>,
) -> Result<(), CacheError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| CacheError::io(parent, e))?;

    temp.write_all(contents)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| CacheError::io(temp.path(), e))?;

    if let Some(ts) = modified {
        let mtime = FileTime::from_unix_time(ts.timestamp(), ts.timestamp_subsec_nanos());
        filetime::set_file_handle_times(temp.as_file(), None, Some(mtime))
            .map_err(|e| CacheError::io(temp.path(), e))?;
    }

    temp.persist(path)
        .map_err(|e| CacheError::io(path, e.error))?;

    Ok(())
}
