use super::xxhash;
use crate::error::Error;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

const CACHE_FILE_NAME: &str = "hash_cache.json";

/// Persistent map of catalog-relative path → last imported content hash.
///
/// Loaded once at construction (a missing file is an empty cache, not an
/// error) and flushed back to pretty JSON after every mutation. The JSON
/// keys are kept sorted via `BTreeMap` so the file diffs cleanly between
/// runs. Owned by whoever drives the import; never a process-wide global.
pub struct HashCache {
    cache_file: PathBuf,
    uploads_root: PathBuf,
    entries: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_cached_files: usize,
    pub cache_file_size: u64,
    pub cache_file_path: String,
}

impl HashCache {
    pub fn new(cache_dir: &Path, uploads_root: &Path) -> Self {
        let cache_file = cache_dir.join(CACHE_FILE_NAME);
        let entries = load_entries(&cache_file);
        debug!(
            "Hash cache loaded from {} ({} entries)",
            cache_file.display(),
            entries.len()
        );
        Self {
            cache_file,
            uploads_root: uploads_root.to_path_buf(),
            entries,
        }
    }

    /// True when the file's current content hash differs from the cached
    /// one. A path with no cache entry is always changed.
    pub fn has_changed(&self, path: &Path) -> bool {
        let current = xxhash::hash_file(path);
        match self.cached_hash(path) {
            Some(cached) => current.hex != *cached,
            None => true,
        }
    }

    pub fn cached_hash(&self, path: &Path) -> Option<&String> {
        self.entries.get(&self.relative_key(path))
    }

    /// Record the hash for a path and flush immediately so an interrupted
    /// run keeps the entries written so far.
    pub fn update(&mut self, path: &Path, hash: &str) -> Result<(), Error> {
        let key = self.relative_key(path);
        self.entries.insert(key, hash.to_string());
        self.flush()
    }

    /// Drop entries whose file no longer exists under `root`. Returns the
    /// number removed; flushes once at the end if anything was removed.
    pub fn clean_stale(&mut self, root: &Path) -> Result<usize, Error> {
        let stale: Vec<String> = self
            .entries
            .keys()
            .filter(|rel| !root.join(rel).exists())
            .cloned()
            .collect();

        for key in &stale {
            self.entries.remove(key);
        }

        if !stale.is_empty() {
            self.flush()?;
        }
        Ok(stale.len())
    }

    pub fn flush(&self) -> Result<(), Error> {
        if let Some(dir) = self.cache_file.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| Error::Cache(format!("serialize hash cache: {}", e)))?;
        fs::write(&self.cache_file, json)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let cache_file_size = fs::metadata(&self.cache_file).map(|m| m.len()).unwrap_or(0);
        CacheStats {
            total_cached_files: self.entries.len(),
            cache_file_size,
            cache_file_path: self.cache_file.display().to_string(),
        }
    }

    /// Catalog-relative key for a path, normalized to forward slashes so
    /// the cache file is portable across machines and absolute-path
    /// layouts. Falls back to locating the uploads root's final component
    /// as a marker inside the path.
    pub fn relative_key(&self, path: &Path) -> String {
        if let Ok(rel) = path.strip_prefix(&self.uploads_root) {
            return normalize_separators(rel);
        }

        if let Some(marker) = self.uploads_root.file_name() {
            let components: Vec<Component> = path.components().collect();
            if let Some(pos) = components
                .iter()
                .position(|c| c.as_os_str() == marker)
            {
                let rel: PathBuf = components[pos + 1..].iter().collect();
                return normalize_separators(&rel);
            }
        }

        warn!(
            "Path {} is outside the uploads root, using it verbatim as cache key",
            path.display()
        );
        normalize_separators(path)
    }
}

fn normalize_separators(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn load_entries(cache_file: &Path) -> BTreeMap<String, String> {
    match fs::read_to_string(cache_file) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "Hash cache at {} is unreadable ({}), starting empty",
                    cache_file.display(),
                    e
                );
                BTreeMap::new()
            }
        },
        Err(_) => BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_cache_file_starts_empty() {
        let tmp = tempdir().unwrap();
        let cache = HashCache::new(&tmp.path().join("cache"), &tmp.path().join("uploads"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_update_persists_across_loads() {
        let tmp = tempdir().unwrap();
        let cache_dir = tmp.path().join("cache");
        let uploads = tmp.path().join("uploads");
        std::fs::create_dir_all(uploads.join("topic")).unwrap();
        let file = uploads.join("topic").join("a.mp4");
        std::fs::write(&file, b"bytes").unwrap();

        let mut cache = HashCache::new(&cache_dir, &uploads);
        assert!(cache.has_changed(&file));
        let hash = xxhash::hash_file(&file);
        cache.update(&file, &hash.hex).unwrap();
        assert!(!cache.has_changed(&file));

        let reloaded = HashCache::new(&cache_dir, &uploads);
        assert_eq!(reloaded.len(), 1);
        assert!(!reloaded.has_changed(&file));
    }

    #[test]
    fn test_relative_key_uses_root_marker() {
        let tmp = tempdir().unwrap();
        let uploads = tmp.path().join("uploads");
        let cache = HashCache::new(tmp.path(), &uploads);

        let inside = uploads.join("rust").join("jane").join("intro.mp4");
        assert_eq!(cache.relative_key(&inside), "rust/jane/intro.mp4");

        // Different absolute prefix, same marker component.
        let elsewhere = Path::new("/mnt/backup/uploads/rust/jane/intro.mp4");
        assert_eq!(cache.relative_key(elsewhere), "rust/jane/intro.mp4");
    }

    #[test]
    fn test_clean_stale_removes_deleted_paths() {
        let tmp = tempdir().unwrap();
        let cache_dir = tmp.path().join("cache");
        let uploads = tmp.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        let keep = uploads.join("keep.mp4");
        let gone = uploads.join("gone.mp4");
        std::fs::write(&keep, b"k").unwrap();
        std::fs::write(&gone, b"g").unwrap();

        let mut cache = HashCache::new(&cache_dir, &uploads);
        cache.update(&keep, "aaaa").unwrap();
        cache.update(&gone, "bbbb").unwrap();

        std::fs::remove_file(&gone).unwrap();
        assert_eq!(cache.clean_stale(&uploads).unwrap(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.cached_hash(&keep).is_some());
    }
}
