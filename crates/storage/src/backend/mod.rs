//! Backends: a directory, an S3-compatible bucket, or (in tests) memory.
//!
//! Publishing needs very little from a backend: list and read files on the
//! source side; probe, upload and delete objects on the target side.

mod local;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::{MockBackend, MockObject, Operation};
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::Result;
use crate::models::{FileInfo, RemoteMeta, UploadOptions, Uploaded};
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;

/// Stream of listing results returned by [`StorageBackend::list_stream()`].
pub type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Operations shared by every backend.
///
/// A backend plays one of two roles during a publish run: the *source* (the
/// build output directory, read through [`list_stream()`](Self::list_stream)
/// and [`read()`](Self::read)) or the *target* (the bucket, queried with
/// [`metadata()`](Self::metadata) and written with [`upload()`](Self::upload)
/// and [`delete()`](Self::delete)).
///
/// # Path Handling
/// Paths are relative to the backend root. Implementations run every path
/// through [`validate_path`](crate::validate_path) and refuse the ones that
/// would escape it.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use shipr_storage::{StorageBackend, error::Result};
///
/// async fn remote_size(backend: &dyn StorageBackend) -> Result<Option<u64>> {
///     match backend.metadata(Path::new("index.html")).await {
///         Ok(meta) => Ok(Some(meta.size)),
///         Err(e) if e.is_absent() => Ok(None),
///         Err(e) => Err(e),
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Identifier of the backend: the bucket name for object stores. Used for
    /// logging and for deriving the default hash cache file name.
    fn name(&self) -> &str;

    /// Every file under `prefix` (or everything), collected from
    /// [`list_stream()`](Self::list_stream).
    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<FileInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Files under `prefix`, one at a time.
    ///
    /// Prefixes match whole path components: `assets/js` covers
    /// `assets/js/app.js` but not `assets/json`. An unknown prefix lists
    /// nothing.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// # use shipr_storage::{StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut files = backend.list_stream(None);
    /// let mut total = 0;
    /// while let Some(file) = files.try_next().await? {
    ///     total += file.size;
    /// }
    /// println!("{total} bytes of build output");
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Get object metadata (including the recorded content hash) without
    /// reading contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist and [`PermissionDenied`](crate::error::ErrorKind::PermissionDenied)
    /// if the backend refuses to say.
    async fn metadata(&self, path: &Path) -> Result<RemoteMeta>;

    /// Write an object, creating or replacing it.
    ///
    /// Returns the content hash the backend now holds for the object, which
    /// is what subsequent [`metadata()`](Self::metadata) calls will report.
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use shipr_storage::UploadOptions;
    /// # use shipr_storage::{StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let options = UploadOptions::new("text/html; charset=utf-8")
    ///     .with_header("Cache-Control", "no-cache");
    /// let uploaded = backend.upload(Path::new("index.html"), b"<html></html>", &options).await?;
    /// println!("stored as {}", uploaded.content_hash);
    /// # Ok(())
    /// # }
    /// ```
    async fn upload(&self, path: &Path, data: &[u8], options: &UploadOptions) -> Result<Uploaded>;

    /// Delete an object.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist (object stores that can't tell simply succeed).
    async fn delete(&self, path: &Path) -> Result<()>;
}
