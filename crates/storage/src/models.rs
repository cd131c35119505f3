//! Storage models.
//!
//! Types exchanged with storage backends: listing results, remote metadata
//! and upload parameters.

use crate::ContentHash;
use shipr_compress::ContentEncoding;
use std::collections::BTreeMap;
use std::path::PathBuf;
use time::OffsetDateTime;

/// File metadata returned by listing operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Relative path from storage root
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: impl Into<OffsetDateTime>) -> Self {
        Self {
            path: path.into(),
            size,
            modified: modified.into(),
        }
    }
}

/// Metadata of an object that exists in a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMeta {
    /// Relative path from storage root
    pub path: PathBuf,
    /// Stored size in bytes
    pub size: u64,
    /// Last modified timestamp, when the backend reports one
    pub modified: Option<OffsetDateTime>,
    /// Content hash recorded for the object. `None` for objects that were
    /// written by something other than shipr.
    pub content_hash: Option<ContentHash>,
}

/// Parameters for [`upload()`](crate::StorageBackend::upload).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Value of the `Content-Type` header.
    pub content_type: String,
    /// Encoding the data is already compressed with.
    pub content_encoding: ContentEncoding,
    /// Additional headers (`Cache-Control`, `Content-Disposition`, ...).
    /// Backends map the headers they understand and store the rest as
    /// user metadata.
    pub headers: BTreeMap<String, String>,
}
impl UploadOptions {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            ..Default::default()
        }
    }

    pub fn with_encoding(mut self, encoding: ContentEncoding) -> Self {
        self.content_encoding = encoding;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploaded {
    /// The hash the backend now holds for the object.
    pub content_hash: ContentHash,
}
