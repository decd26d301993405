//! One pretty-printed JSON file per entry, named after its key.

use crate::entry::EntryRecord;
use crate::error::{ErrorKind, Result};
use crate::{CacheEntry, DocumentKey, MetadataCache};
use exn::ResultExt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::instrument;

const EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Opens the cache rooted at `dir`, creating the directory if needed.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).or_raise(|| ErrorKind::Io(dir.clone()))?;
        tracing::debug!("metadata cache opened");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &DocumentKey) -> PathBuf {
        self.dir.join(format!("{key}.{EXTENSION}"))
    }

    fn read(path: &Path) -> Result<CacheEntry> {
        let contents = fs::read_to_string(path).or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
        let record: EntryRecord =
            serde_json::from_str(&contents).or_raise(|| ErrorKind::InvalidData("cache entry"))?;
        CacheEntry::try_from(record)
    }

    /// Paths of every entry file, sorted.
    fn entries(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir).or_raise(|| ErrorKind::Io(self.dir.clone()))? {
            let path = entry.or_raise(|| ErrorKind::Io(self.dir.clone()))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl MetadataCache for FileCache {
    #[instrument(skip_all, fields(key = %key))]
    fn get(&self, key: &DocumentKey) -> Option<CacheEntry> {
        let path = self.path(key);
        if !path.is_file() {
            tracing::debug!("cache miss");
            return None;
        }
        match Self::read(&path) {
            Ok(entry) => {
                tracing::info!("cache hit");
                Some(entry)
            },
            Err(error) => {
                tracing::warn!(path = %path.display(), ?error, "ignoring unreadable cache entry");
                None
            },
        }
    }

    #[instrument(skip_all, fields(key = %entry.key))]
    fn put(&self, entry: &CacheEntry) -> Result<()> {
        let path = self.path(&entry.key);
        let record = EntryRecord::try_from(entry)?;
        let json = serde_json::to_string_pretty(&record).or_raise(|| ErrorKind::InvalidData("cache entry"))?;
        fs::write(&path, json).or_raise(|| ErrorKind::Io(path.clone()))?;
        tracing::info!(path = %path.display(), "cached metadata");
        Ok(())
    }

    #[instrument(skip_all, fields(key = %key))]
    fn delete(&self, key: &DocumentKey) -> Result<bool> {
        let path = self.path(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("deleted cache entry");
                Ok(true)
            },
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error).or_raise(|| ErrorKind::Io(path)),
        }
    }

    fn exists(&self, key: &DocumentKey) -> bool {
        self.path(key).is_file()
    }

    #[instrument(skip(self))]
    fn clear(&self) -> Result<usize> {
        let paths = self.entries()?;
        for path in &paths {
            fs::remove_file(path).or_raise(|| ErrorKind::Io(path.clone()))?;
        }
        tracing::info!(count = paths.len(), "cleared metadata cache");
        Ok(paths.len())
    }

    fn list(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        for path in self.entries()? {
            match Self::read(&path) {
                Ok(entry) => entries.push(entry),
                Err(error) => tracing::warn!(path = %path.display(), ?error, "skipping unreadable cache entry"),
            }
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salvage_extract::models::Metadata;

    fn entry(key: &str, main: &str) -> CacheEntry {
        CacheEntry::new(DocumentKey::parse(key).unwrap(), Metadata::with_main_css([main]))
    }

    #[test]
    fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path().join("nested/cache")).unwrap();
        let stored = entry("page", "article").with_source_name("page.html");
        let key = stored.key.clone();

        assert!(cache.get(&key).is_none());
        assert!(!cache.exists(&key));
        cache.put(&stored).unwrap();
        assert!(cache.exists(&key));
        assert!(cache.dir().join("page.json").is_file());

        let loaded = cache.get(&key).unwrap();
        assert_eq!(loaded.metadata, stored.metadata);
        assert_eq!(loaded.source_name.as_deref(), Some("page.html"));
        // RFC 3339 keeps sub-second precision.
        assert_eq!(loaded.created_at, stored.created_at);

        assert!(cache.delete(&key).unwrap());
        assert!(!cache.delete(&key).unwrap());
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        cache.put(&entry("page", "article")).unwrap();
        cache.put(&entry("page", "main")).unwrap();
        let key = DocumentKey::parse("page").unwrap();
        assert_eq!(cache.get(&key).unwrap().metadata.content_zones.main.css, vec!["main"]);
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        cache.put(&entry("good", "article")).unwrap();

        let broken = DocumentKey::parse("broken").unwrap();
        assert!(cache.exists(&broken));
        assert!(cache.get(&broken).is_none());
        let listed: Vec<String> = cache.list().unwrap().into_iter().map(|e| e.key.to_string()).collect();
        assert_eq!(listed, vec!["good"]);
    }

    #[test]
    fn test_list_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        for key in ["b", "a", "c"] {
            cache.put(&entry(key, "article")).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

        let listed: Vec<String> = cache.list().unwrap().into_iter().map(|e| e.key.to_string()).collect();
        assert_eq!(listed, vec!["a", "b", "c"]);
        assert_eq!(cache.clear().unwrap(), 3);
        assert!(cache.list().unwrap().is_empty());
        assert!(dir.path().join("notes.txt").is_file());
    }

    #[test]
    fn test_open_fails_on_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("taken");
        fs::write(&file, "").unwrap();
        let error = FileCache::open(&file).unwrap_err();
        assert!(matches!(&*error, ErrorKind::Io(_)));
    }
}
