//! Pre-publish compression.
//!
//! Compressing before fingerprinting means the fingerprint (and the hash the
//! backend reports) is of the bytes actually stored, so a file only counts as
//! changed when its compressed form does.

use crate::content_type::content_type;
use crate::error::{ErrorKind, Result};
use crate::record::{Contents, FileRecord};
use exn::ResultExt;
use futures::{Stream, StreamExt};
use shipr_compress::ContentEncoding;

/// Compresses buffered records and tags them with their `Content-Encoding`.
///
/// ```
/// use shipr_compress::ContentEncoding;
/// use shipr_publish::{Encoder, FileRecord};
///
/// let encoder = Encoder::new(ContentEncoding::Gzip).with_ext(".gz");
/// let record = encoder.encode(FileRecord::new("app.js", "let a = 1; ".repeat(100))).unwrap();
/// assert_eq!(record.path(), "app.js.gz");
/// assert_eq!(record.content_encoding(), ContentEncoding::Gzip);
/// assert_eq!(record.content_type(), Some("text/javascript; charset=utf-8"));
/// ```
#[derive(Debug, Clone)]
pub struct Encoder {
    encoding: ContentEncoding,
    ext: String,
    smaller_only: bool,
}

impl Encoder {
    pub fn new(encoding: ContentEncoding) -> Self {
        Self {
            encoding,
            ext: String::new(),
            smaller_only: false,
        }
    }

    /// Suffix appended to the path of every compressed record.
    pub fn with_ext(mut self, ext: impl Into<String>) -> Self {
        self.ext = ext.into();
        self
    }

    /// Leave records alone when compressing doesn't make them smaller.
    pub fn smaller_only(mut self, smaller_only: bool) -> Self {
        self.smaller_only = smaller_only;
        self
    }

    /// Compress a single record.
    ///
    /// Records without contents, records flagged for deletion and records
    /// that are already encoded pass through unchanged. Streamed contents are
    /// rejected.
    pub fn encode(&self, mut record: FileRecord) -> Result<FileRecord> {
        if record.delete || record.content_encoding != ContentEncoding::Identity {
            return Ok(record);
        }
        let bytes = match &record.contents {
            None => return Ok(record),
            Some(Contents::Stream(_)) => exn::bail!(ErrorKind::UnsupportedContent(record.path)),
            Some(Contents::Buffer(bytes)) => bytes,
        };
        let compressed = self.encoding.compress(bytes).or_raise(|| ErrorKind::Encode(record.path.clone()))?;
        if self.smaller_only && compressed.len() >= bytes.len() {
            tracing::debug!(path = %record.path, "compressed form is not smaller, keeping original");
            return Ok(record);
        }
        // The type is that of the original file, not of a gzip archive.
        if record.content_type.is_none() {
            record.content_type = Some(content_type(&record.path));
        }
        record.content_encoding = self.encoding;
        record.contents = Some(Contents::Buffer(compressed));
        record.path.push_str(&self.ext);
        Ok(record)
    }

    /// Compress every record of a stream.
    pub fn encode_all<'a>(
        &'a self,
        records: impl Stream<Item = FileRecord> + 'a,
    ) -> impl Stream<Item = Result<FileRecord>> + 'a {
        records.map(|record| self.encode(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    const CSS: &str = "body { color: red; } body { color: red; } body { color: red; } body { color: red; }";

    #[test]
    fn compresses_and_tags() {
        let record = Encoder::new(ContentEncoding::Gzip).encode(FileRecord::new("site.css", CSS)).unwrap();
        assert_eq!(record.path(), "site.css");
        assert_eq!(record.content_encoding(), ContentEncoding::Gzip);
        assert_eq!(record.content_type(), Some("text/css; charset=utf-8"));
        let decompressed = ContentEncoding::Gzip.decompress(record.bytes().unwrap()).unwrap();
        assert_eq!(decompressed, CSS.as_bytes());
    }

    #[test]
    fn appends_extension() {
        let encoder = Encoder::new(ContentEncoding::Gzip).with_ext(".gz");
        let record = encoder.encode(FileRecord::new("site.css", CSS)).unwrap();
        assert_eq!(record.path(), "site.css.gz");
        assert_eq!(record.content_type(), Some("text/css; charset=utf-8"));
    }

    #[test]
    fn keeps_explicit_content_type() {
        let record = FileRecord::new("feed", CSS).with_content_type("application/rss+xml");
        let record = Encoder::new(ContentEncoding::Gzip).encode(record).unwrap();
        assert_eq!(record.content_type(), Some("application/rss+xml"));
    }

    #[test]
    fn smaller_only_keeps_incompressible_files() {
        let encoder = Encoder::new(ContentEncoding::Gzip).with_ext(".gz").smaller_only(true);
        let record = encoder.encode(FileRecord::new("tiny.txt", "a")).unwrap();
        assert_eq!(record.path(), "tiny.txt");
        assert_eq!(record.content_encoding(), ContentEncoding::Identity);
        assert_eq!(record.bytes(), Some(&b"a"[..]));
        assert_eq!(record.content_type(), None);
    }

    #[test]
    fn passes_through_empty_and_deleted() {
        let encoder = Encoder::new(ContentEncoding::Gzip).with_ext(".gz");
        let empty = encoder.encode(FileRecord::empty("nothing.txt")).unwrap();
        assert_eq!(empty.path(), "nothing.txt");
        assert!(empty.contents().is_none());
        let deleted = encoder.encode(FileRecord::deleted("gone.txt")).unwrap();
        assert_eq!(deleted.path(), "gone.txt");
    }

    #[test]
    fn rejects_streams() {
        let record = FileRecord::streamed("video.mp4", futures::io::Cursor::new(vec![0u8; 16]));
        let err = Encoder::new(ContentEncoding::Gzip).encode(record).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedContent(path) if path == "video.mp4"));
    }

    #[tokio::test]
    async fn encodes_streams_of_records() {
        let encoder = Encoder::new(ContentEncoding::Gzip).with_ext(".gz");
        let records = stream::iter(vec![FileRecord::new("a.css", CSS), FileRecord::empty("b.css")]);
        let encoded: Vec<_> = encoder.encode_all(records).collect().await;
        let paths: Vec<_> = encoded.iter().map(|r| r.as_ref().unwrap().path().to_string()).collect();
        assert_eq!(paths, vec!["a.css.gz", "b.css"]);
    }
}
