//! Persistent cache of document structure metadata.
//!
//! Structure analysis is the expensive step of the pipeline, and documents
//! from the same source share their structure. Metadata is therefore cached
//! per [`DocumentKey`]. The cache is never the source of truth: deleting it
//! only means documents get analyzed again.

mod entry;
pub mod error;
mod file;
mod key;
mod memory;

pub use crate::entry::CacheEntry;
use crate::error::Result;
pub use crate::file::FileCache;
pub use crate::key::DocumentKey;
pub use crate::memory::MemoryCache;

/// Storage for per-document metadata.
pub trait MetadataCache: Send + Sync {
    /// Looks up an entry. Unreadable or corrupt entries are a miss.
    fn get(&self, key: &DocumentKey) -> Option<CacheEntry>;
    /// Stores an entry, replacing any entry under the same key.
    fn put(&self, entry: &CacheEntry) -> Result<()>;
    /// Removes an entry, returning whether one existed.
    fn delete(&self, key: &DocumentKey) -> Result<bool>;
    fn exists(&self, key: &DocumentKey) -> bool;
    /// Removes every entry, returning how many were removed.
    fn clear(&self) -> Result<usize>;
    /// Every readable entry, ordered by key.
    fn list(&self) -> Result<Vec<CacheEntry>>;
}
