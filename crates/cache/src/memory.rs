use crate::error::Result;
use crate::{CacheEntry, DocumentKey, MetadataCache};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Process-local cache, for tests and for embedding without a disk.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<DocumentKey, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a half-written entry behind.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<DocumentKey, CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<DocumentKey, CacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MetadataCache for MemoryCache {
    fn get(&self, key: &DocumentKey) -> Option<CacheEntry> {
        self.read().get(key).cloned()
    }

    fn put(&self, entry: &CacheEntry) -> Result<()> {
        self.write().insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    fn delete(&self, key: &DocumentKey) -> Result<bool> {
        Ok(self.write().remove(key).is_some())
    }

    fn exists(&self, key: &DocumentKey) -> bool {
        self.read().contains_key(key)
    }

    fn clear(&self) -> Result<usize> {
        let mut entries = self.write();
        let count = entries.len();
        entries.clear();
        Ok(count)
    }

    fn list(&self) -> Result<Vec<CacheEntry>> {
        let mut entries: Vec<CacheEntry> = self.read().values().cloned().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}
