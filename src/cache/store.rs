//! On-disk cache directory: one JSON file per entry, named by its key.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::entry::CacheEntry;
use super::key::CacheKey;
use crate::{ModelCacheError, ModelCacheResult};

/// Path of the file holding `key` inside `cache_dir`.
pub fn entry_path(cache_dir: &Path, key: &CacheKey) -> PathBuf {
    cache_dir.join(key.file_name())
}

/// Loads the entry stored under `key`.
///
/// A missing directory or file is a miss. A file that exists but cannot be
/// read or parsed is a [`ModelCacheError::Corruption`], never a miss.
pub fn try_load(cache_dir: &Path, key: &CacheKey) -> ModelCacheResult<Option<CacheEntry>> {
    let path = entry_path(cache_dir, key);

    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        // a cache_dir that is missing or not a directory also lands here
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            tracing::debug!(key = %key, path = %path.display(), "cache miss");
            return Ok(None);
        }
        Err(e) => return Err(ModelCacheError::corruption(path, e)),
    };

    let entry: CacheEntry =
        serde_json::from_slice(&bytes).map_err(|e| ModelCacheError::corruption(&path, e))?;

    tracing::debug!(key = %key, path = %path.display(), "cache hit");
    Ok(Some(entry))
}

/// Persists `entry` under `key`, creating `cache_dir` if needed.
///
/// The entry is written to a temporary file in the same directory and then
/// renamed over the final path, so concurrent readers see either the old
/// file, no file, or the complete new one. Concurrent writers of the same
/// key are last-writer-wins.
pub fn store(cache_dir: &Path, key: &CacheKey, entry: &CacheEntry) -> ModelCacheResult<()> {
    entry.ensure_finite()?;
    let bytes = serde_json::to_vec_pretty(entry)?;

    fs::create_dir_all(cache_dir).map_err(|e| ModelCacheError::storage(cache_dir, e))?;

    let path = entry_path(cache_dir, key);
    let mut tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(cache_dir)
        .map_err(|e| ModelCacheError::storage(cache_dir, e))?;

    tmp.write_all(&bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| ModelCacheError::storage(tmp.path(), e))?;

    tmp.persist(&path)
        .map_err(|e| ModelCacheError::storage(&path, e.error))?;

    tracing::debug!(key = %key, path = %path.display(), bytes = bytes.len(), "cache entry stored");
    Ok(())
}

/// Summary of one file in a cache directory.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub key: CacheKey,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Lists the entries of `cache_dir`, sorted by key.
///
/// Files whose names are not `<key>.json` (including in-flight temporary
/// files) are skipped. A missing directory has no entries.
pub fn list_entries(cache_dir: &Path) -> ModelCacheResult<Vec<EntryInfo>> {
    let read_dir = match fs::read_dir(cache_dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::new();
    for dir_entry in read_dir {
        let dir_entry = dir_entry?;
        let Some(key) = dir_entry.file_name().to_str().and_then(CacheKey::from_file_name) else {
            continue;
        };

        let metadata = dir_entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        entries.push(EntryInfo {
            key,
            path: dir_entry.path(),
            size_bytes: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        });
    }

    entries.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(entries)
}

/// A cache file that failed to load.
#[derive(Debug, Clone)]
pub struct CorruptEntry {
    pub key: CacheKey,
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of checking every entry in a directory.
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    pub valid: Vec<CacheKey>,
    pub corrupt: Vec<CorruptEntry>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.corrupt.is_empty()
    }
}

/// Loads every entry of `cache_dir` and collects the corrupt ones.
///
/// Unlike an evaluation, verification keeps going past a corrupt file so
/// that the whole directory gets reported.
pub fn verify_dir(cache_dir: &Path) -> ModelCacheResult<VerifyReport> {
    let mut report = VerifyReport::default();

    for info in list_entries(cache_dir)? {
        match try_load(cache_dir, &info.key) {
            Ok(Some(_)) => report.valid.push(info.key),
            // removed between listing and loading
            Ok(None) => {}
            Err(ModelCacheError::Corruption { path, reason }) => {
                tracing::warn!(key = %info.key, path = %path.display(), %reason, "corrupt cache entry");
                report.corrupt.push(CorruptEntry {
                    key: info.key,
                    path,
                    reason,
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::compute_key;
    use crate::types::values::{Value, ValueMap};
    use serde_json::json;
    use tempfile::TempDir;

    fn key_for(n: i64) -> CacheKey {
        compute_key(&json!({ "case": n }), &ValueMap::new(), &ValueMap::new()).unwrap()
    }

    fn sample_entry() -> CacheEntry {
        CacheEntry::default()
            .with_output("power", vec![1.0, 2.0, 3.0])
            .with_output("capacity_factor", 0.4123456789012345)
            .with_discrete_output("turbine", "generic_6MW")
            .with_discrete_output("curtailed", false)
    }

    #[test]
    fn test_miss_then_hit() {
        let dir = TempDir::new().unwrap();
        let key = key_for(1);

        assert!(try_load(dir.path(), &key).unwrap().is_none());

        let entry = sample_entry();
        store(dir.path(), &key, &entry).unwrap();

        assert_eq!(try_load(dir.path(), &key).unwrap(), Some(entry));
    }

    #[cfg(unix)]
    #[test]
    fn test_unsearchable_directory_is_not_a_miss() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let key = key_for(1);
        store(dir.path(), &key, &sample_entry()).unwrap();

        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o600)).unwrap();
        let readable = fs::read(entry_path(dir.path(), &key)).is_ok();
        let result = try_load(dir.path(), &key);
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o700)).unwrap();

        // root ignores directory permissions
        if readable {
            return;
        }
        match result {
            Err(ModelCacheError::Corruption { path, .. }) => {
                assert_eq!(path, entry_path(dir.path(), &key))
            }
            other => panic!("expected a corruption error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_directory_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("never_created");

        assert!(try_load(&missing, &key_for(1)).unwrap().is_none());
        assert!(!missing.exists());
    }

    #[test]
    fn test_store_creates_nested_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b").join("cache");

        store(&nested, &key_for(1), &sample_entry()).unwrap();
        assert!(entry_path(&nested, &key_for(1)).exists());
    }

    #[test]
    fn test_corrupt_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let key = key_for(1);
        fs::write(entry_path(dir.path(), &key), b"{\"outputs\": {\"power\": ").unwrap();

        let err = try_load(dir.path(), &key).unwrap_err();
        match err {
            ModelCacheError::Corruption { path, .. } => {
                assert_eq!(path, entry_path(dir.path(), &key));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_overwrite_replaces_entry() {
        let dir = TempDir::new().unwrap();
        let key = key_for(1);

        store(dir.path(), &key, &sample_entry()).unwrap();
        let newer = CacheEntry::default().with_output("power", vec![9.0]);
        store(dir.path(), &key, &newer).unwrap();

        assert_eq!(try_load(dir.path(), &key).unwrap(), Some(newer));
    }

    #[test]
    fn test_non_finite_output_is_not_written() {
        let dir = TempDir::new().unwrap();
        let key = key_for(1);
        let entry = CacheEntry::default().with_output("power", Value::Float(f64::NAN));

        let err = store(dir.path(), &key, &entry).unwrap_err();
        assert!(matches!(err, ModelCacheError::Serialization { .. }));
        assert!(!entry_path(dir.path(), &key).exists());
    }

    #[test]
    fn test_store_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        for n in 0..5 {
            store(dir.path(), &key_for(n), &sample_entry()).unwrap();
        }

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 5);
        assert!(names.iter().all(|n| n.ends_with(".json")));
    }

    #[test]
    fn test_list_entries_skips_foreign_files() {
        let dir = TempDir::new().unwrap();
        store(dir.path(), &key_for(2), &sample_entry()).unwrap();
        store(dir.path(), &key_for(1), &sample_entry()).unwrap();
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        fs::write(dir.path().join(".abc123.tmp"), b"partial").unwrap();

        let entries = list_entries(dir.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].key < entries[1].key);
        assert!(entries.iter().all(|e| e.size_bytes > 0));

        assert!(list_entries(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_verify_dir_reports_every_corrupt_entry() {
        let dir = TempDir::new().unwrap();
        store(dir.path(), &key_for(1), &sample_entry()).unwrap();
        fs::write(entry_path(dir.path(), &key_for(2)), b"not json").unwrap();
        fs::write(entry_path(dir.path(), &key_for(3)), b"[]").unwrap();

        let report = verify_dir(dir.path()).unwrap();
        assert_eq!(report.valid, vec![key_for(1)]);
        assert_eq!(report.corrupt.len(), 2);
        assert!(!report.is_clean());
    }
}
