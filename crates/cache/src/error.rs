//! Cache Error Types
//!
//! Structured errors using `exn` for automatic location tracking. A corrupt
//! entry is never an error on lookup; these surface only when writing,
//! deleting or enumerating entries.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading or writing the cache directory failed.
    #[display("cache I/O error: {}", _0.display())]
    Io(#[error(not(source))] PathBuf),
    /// An entry could not be (de)serialized.
    #[display("invalid cache data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    /// A key that cannot name a cache entry.
    #[display("invalid cache key: '{_0}'")]
    InvalidKey(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io(_))
    }
}
