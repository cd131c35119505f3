//! Publish Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Per-file kinds carry the object key
//! of the file that failed; the publish stream keeps going after them.

use derive_more::{Display, Error};

/// A publish error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for publish operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a publish failure.
///
/// ### Fatal Errors
/// - [`ErrorKind::Config`]
///
/// ### Per-file Errors
/// - [`ErrorKind::Probe`], [`ErrorKind::Upload`], [`ErrorKind::Delete`] and
///   [`ErrorKind::Timeout`] - the backend call failed; the cache is untouched.
/// - [`ErrorKind::InvalidPath`], [`ErrorKind::UnsupportedContent`] and
///   [`ErrorKind::Encode`] - the record itself can't be published and is
///   dropped.
///
/// ### Cache Errors
/// - [`ErrorKind::Cache`] - writing the hash cache to disk failed.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The publisher can't be constructed as configured.
    #[display("invalid publisher configuration: {_0}")]
    Config(#[error(not(source))] String),
    /// The hash cache could not be written.
    #[display("could not save hash cache")]
    Cache,
    /// Querying remote metadata failed (other than "not found").
    #[display("could not probe remote state of {_0}")]
    Probe(#[error(not(source))] String),
    /// Upload failed.
    #[display("could not upload {_0}")]
    Upload(#[error(not(source))] String),
    /// Remote deletion failed.
    #[display("could not delete {_0}")]
    Delete(#[error(not(source))] String),
    /// A backend call took longer than the configured timeout.
    #[display("timed out waiting for backend: {_0}")]
    Timeout(#[error(not(source))] String),
    /// The record path can't be turned into an object key.
    #[display("invalid object key: {_0}")]
    InvalidPath(#[error(not(source))] String),
    /// Streamed contents can't be hashed without buffering them.
    #[display("shipr: stream content is not supported: {_0}")]
    UnsupportedContent(#[error(not(source))] String),
    /// Compressing the contents failed.
    #[display("could not encode {_0}")]
    Encode(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Cache | Self::Probe(_) | Self::Upload(_) | Self::Delete(_) | Self::Timeout(_)
        )
    }

    /// Object key of the file the error is about, if it's a per-file error.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Config(_) | Self::Cache => None,
            Self::Probe(path)
            | Self::Upload(path)
            | Self::Delete(path)
            | Self::Timeout(path)
            | Self::InvalidPath(path)
            | Self::UnsupportedContent(path)
            | Self::Encode(path) => Some(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_content_names_the_tool() {
        let err = ErrorKind::UnsupportedContent("assets/video.mp4".to_string());
        assert_eq!(err.to_string(), "shipr: stream content is not supported: assets/video.mp4");
        assert!(!err.is_retryable());
        assert_eq!(err.path(), Some("assets/video.mp4"));
    }

    #[test]
    fn transient_kinds_are_retryable() {
        assert!(ErrorKind::Timeout("a".to_string()).is_retryable());
        assert!(ErrorKind::Probe("a".to_string()).is_retryable());
        assert!(!ErrorKind::Config("no bucket".to_string()).is_retryable());
        assert_eq!(ErrorKind::Cache.path(), None);
    }
}
