//! Cache Error Types
//!
//! Loading never fails (an unreadable cache is an empty cache), so every
//! error here comes from writing the cache back to disk.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Cache file (or its temporary sibling) could not be written.
    #[display("could not write cache file: {}", _0.display())]
    Write(#[error(not(source))] PathBuf),
    /// Serialization error.
    #[display("invalid cache data")]
    InvalidData,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Write(_))
    }
}
