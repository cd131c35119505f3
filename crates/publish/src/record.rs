//! File records flowing through a publish run.

use crate::error::{Error, ErrorKind};
use derive_more::Display;
use futures::AsyncRead;
use shipr_compress::ContentEncoding;
use shipr_storage::ContentHash;
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::pin::Pin;
use std::str::FromStr;
use time::{OffsetDateTime, UtcDateTime};

/// Terminal classification of a record.
///
/// Ordered by how much work publishing the record took.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Disposition {
    /// The hash cache already knew this content was published. No backend
    /// call was made.
    #[display("cache")]
    Cache,
    /// The remote already holds this content (or must not be overwritten).
    #[display("skip")]
    Skip,
    /// The remote held different content and was overwritten.
    #[display("update")]
    Update,
    /// The remote held nothing and the file was uploaded.
    #[display("create")]
    Create,
    /// The record was flagged for deletion; its cache entry (and optionally
    /// the remote object) was removed.
    #[display("delete")]
    Delete,
}
impl Disposition {
    pub const ALL: [Self; 5] = [Self::Cache, Self::Skip, Self::Update, Self::Create, Self::Delete];
}
impl FromStr for Disposition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|disposition| disposition.to_string() == name)
            .ok_or_else(|| Error::from(ErrorKind::Config(format!("unknown disposition: {s}"))))
    }
}

/// What happened to a record. Attached once, never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub disposition: Disposition,
    /// Hash the remote holds for the object after this run, when known.
    /// `None` for deletions and for skipped objects without a recorded hash.
    pub content_hash: Option<ContentHash>,
    /// Modification time of the remote object, for skipped records.
    pub remote_modified: Option<OffsetDateTime>,
    /// When the outcome was decided.
    pub timestamp: UtcDateTime,
}
impl UploadOutcome {
    pub(crate) fn new(disposition: Disposition, content_hash: Option<ContentHash>) -> Self {
        Self {
            disposition,
            content_hash,
            remote_modified: None,
            timestamp: UtcDateTime::now(),
        }
    }

    pub(crate) fn with_remote_modified(mut self, modified: Option<OffsetDateTime>) -> Self {
        self.remote_modified = modified;
        self
    }
}

/// Contents of a record.
pub enum Contents {
    /// Fully buffered contents.
    Buffer(Vec<u8>),
    /// Contents that can only be read as a stream. Not publishable: the
    /// fingerprint has to be known before deciding whether to read them.
    Stream(Pin<Box<dyn AsyncRead + Send>>),
}
impl Debug for Contents {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffer(bytes) => f.debug_tuple("Buffer").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// A file produced by the build, on its way to the bucket.
///
/// The path is the object key: relative to the bucket (or prefix) and always
/// `/`-separated. A record without contents is passed through untouched.
///
/// ```
/// use shipr_publish::FileRecord;
///
/// let record = FileRecord::new("index.html", "<!doctype html>")
///     .with_header("Cache-Control", "no-cache");
/// assert_eq!(record.path(), "index.html");
/// assert!(record.outcome().is_none());
/// ```
#[derive(Debug)]
pub struct FileRecord {
    pub(crate) path: String,
    pub(crate) contents: Option<Contents>,
    pub(crate) delete: bool,
    pub(crate) content_type: Option<String>,
    pub(crate) content_encoding: ContentEncoding,
    pub(crate) headers: BTreeMap<String, String>,
    pub(crate) content_hash: Option<ContentHash>,
    pub(crate) outcome: Option<UploadOutcome>,
}

impl FileRecord {
    fn with_contents(path: impl Into<String>, contents: Option<Contents>) -> Self {
        Self {
            path: path.into(),
            contents,
            delete: false,
            content_type: None,
            content_encoding: ContentEncoding::Identity,
            headers: BTreeMap::new(),
            content_hash: None,
            outcome: None,
        }
    }

    /// A record with buffered contents.
    pub fn new(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self::with_contents(path, Some(Contents::Buffer(contents.into())))
    }

    /// A record without contents.
    pub fn empty(path: impl Into<String>) -> Self {
        Self::with_contents(path, None)
    }

    /// A record whose contents can only be streamed.
    pub fn streamed(path: impl Into<String>, reader: impl AsyncRead + Send + 'static) -> Self {
        Self::with_contents(path, Some(Contents::Stream(Box::pin(reader))))
    }

    /// A record flagged for deletion.
    pub fn deleted(path: impl Into<String>) -> Self {
        Self {
            delete: true,
            ..Self::with_contents(path, None)
        }
    }

    /// Override the content type otherwise derived from the path.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Declare the encoding the contents are already compressed with.
    pub fn with_encoding(mut self, encoding: ContentEncoding) -> Self {
        self.content_encoding = encoding;
        self
    }

    /// Add an upload header for this record only.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn contents(&self) -> Option<&Contents> {
        self.contents.as_ref()
    }

    /// Buffered contents, if any.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.contents {
            Some(Contents::Buffer(bytes)) => Some(bytes),
            _ => None,
        }
    }

    pub fn is_delete(&self) -> bool {
        self.delete
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_encoding(&self) -> ContentEncoding {
        self.content_encoding
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Fingerprint of the contents, once they've been hashed.
    pub fn content_hash(&self) -> Option<&ContentHash> {
        self.content_hash.as_ref()
    }

    pub fn outcome(&self) -> Option<&UploadOutcome> {
        self.outcome.as_ref()
    }

    pub fn disposition(&self) -> Option<Disposition> {
        self.outcome.as_ref().map(|outcome| outcome.disposition)
    }

    /// Record the fingerprint. Has no effect if one is already set.
    pub(crate) fn set_content_hash(&mut self, hash: ContentHash) {
        self.content_hash.get_or_insert(hash);
    }

    /// Attach the outcome. Returns `false` (and changes nothing) if the
    /// record already had one.
    pub(crate) fn settle(&mut self, outcome: UploadOutcome) -> bool {
        if self.outcome.is_some() {
            return false;
        }
        tracing::debug!(path = %self.path, disposition = %outcome.disposition, "settled");
        self.outcome = Some(outcome);
        true
    }
}
