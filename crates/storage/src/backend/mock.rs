//! In-memory storage backend for testing.

use super::FileInfoStream;
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use crate::{ContentHash, FileInfo, RemoteMeta, StorageBackend, UploadOptions, Uploaded};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use time::UtcDateTime;
use tokio::sync::RwLock;

/// Backend operations that can be made to fail with
/// [`MockBackend::fail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Metadata,
    Upload,
    Delete,
}

/// An object stored in a [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockObject {
    pub data: Vec<u8>,
    pub modified: UtcDateTime,
    pub content_hash: Option<ContentHash>,
    pub options: UploadOptions,
}

/// In-memory storage backend for testing.
///
/// Objects are stored in a `HashMap` behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation. Every
/// call to [`metadata()`](StorageBackend::metadata) and
/// [`upload()`](StorageBackend::upload) is counted, so tests can assert that
/// the network was (or wasn't) touched.
///
/// # Examples
///
/// ```
/// use shipr_storage::backend::MockBackend;
/// use shipr_storage::{StorageBackend, UploadOptions};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([("index.html", b"<html></html>")]);
/// assert!(backend.metadata(Path::new("index.html")).await?.content_hash.is_some());
///
/// backend.upload(Path::new("app.js"), b"42;", &UploadOptions::new("text/javascript")).await?;
/// assert_eq!(backend.upload_count(), 1);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<PathBuf, MockObject>>,
    failures: RwLock<HashSet<(PathBuf, Operation)>>,
    denied: RwLock<HashSet<PathBuf>>,
    metadata_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MockBackend {
    /// Create a mock backend pre-populated with objects. Their content hashes
    /// are recorded as if shipr had uploaded them.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        let now = UtcDateTime::now();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            let data = data.into();
            let object = MockObject {
                content_hash: Some(ContentHash::compute(&data)),
                data,
                modified: now,
                options: UploadOptions::default(),
            };
            map.insert(validated, object);
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            failures: RwLock::default(),
            denied: RwLock::default(),
            metadata_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    /// Change the name (bucket identifier) of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Store an object without going through [`upload()`](StorageBackend::upload),
    /// e.g. to simulate an object written by another tool (`content_hash` of
    /// `None`). Not counted as an upload.
    pub async fn put_object(&self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>, content_hash: Option<ContentHash>) {
        let path = validate_path(path.as_ref()).expect("MockBackend::put_object: invalid path");
        let object = MockObject {
            data: data.into(),
            modified: UtcDateTime::now(),
            content_hash,
            options: UploadOptions::default(),
        };
        self.storage.write().await.insert(path, object);
    }

    /// Make every subsequent `operation` on `path` fail with a backend error.
    pub async fn fail(&self, path: impl AsRef<Path>, operation: Operation) {
        let path = validate_path(path.as_ref()).expect("MockBackend::fail: invalid path");
        self.failures.write().await.insert((path, operation));
    }

    /// Stop failing `operation` on `path`.
    pub async fn recover(&self, path: impl AsRef<Path>, operation: Operation) {
        let path = validate_path(path.as_ref()).expect("MockBackend::recover: invalid path");
        self.failures.write().await.remove(&(path, operation));
    }

    /// Answer metadata requests for `path` with "permission denied", the way
    /// some object stores answer for keys the credentials can't list.
    pub async fn deny(&self, path: impl AsRef<Path>) {
        let path = validate_path(path.as_ref()).expect("MockBackend::deny: invalid path");
        self.denied.write().await.insert(path);
    }

    /// Snapshot of the object stored at `path`.
    pub async fn object(&self, path: impl AsRef<Path>) -> Option<MockObject> {
        let path = validate_path(path.as_ref()).ok()?;
        self.storage.read().await.get(&path).cloned()
    }

    /// Number of objects currently stored.
    pub async fn len(&self) -> usize {
        self.storage.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.storage.read().await.is_empty()
    }

    /// Number of [`metadata()`](StorageBackend::metadata) calls made so far.
    pub fn metadata_count(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    /// Number of [`upload()`](StorageBackend::upload) calls made so far.
    pub fn upload_count(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    /// Number of [`delete()`](StorageBackend::delete) calls made so far.
    pub fn delete_count(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    async fn check_failure(&self, path: &Path, operation: Operation) -> Result<()> {
        if self.failures.read().await.contains(&(path.to_path_buf(), operation)) {
            exn::bail!(ErrorKind::BackendError(format!("injected {operation:?} failure for {}", path.display())));
        }
        Ok(())
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };

        Box::pin(stream! {
            // Snapshot matching entries under the read lock, then drop it
            // before yielding to avoid holding the lock across yield points.
            let entries: Vec<FileInfo> = {
                let guard = self.storage.read().await;
                guard
                    .iter()
                    .filter(|(path, _)| match &validated_prefix {
                        Some(pfx) => path.starts_with(pfx),
                        None => true,
                    })
                    .map(|(path, object)| FileInfo::new(path.clone(), object.data.len() as u64, object.modified))
                    .collect()
            };
            for info in entries {
                yield Ok(info);
            }
        })
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        let object =
            self.storage.read().await.get(&path).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))?;
        Ok(object.data)
    }

    async fn metadata(&self, path: &Path) -> Result<RemoteMeta> {
        let path = validate_path(path)?;
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure(&path, Operation::Metadata).await?;
        if self.denied.read().await.contains(&path) {
            exn::bail!(ErrorKind::PermissionDenied(path));
        }
        let guard = self.storage.read().await;
        let object = guard.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(RemoteMeta {
            size: object.data.len() as u64,
            modified: Some(object.modified.into()),
            content_hash: object.content_hash.clone(),
            path,
        })
    }

    async fn upload(&self, path: &Path, data: &[u8], options: &UploadOptions) -> Result<Uploaded> {
        let path = validate_path(path)?;
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure(&path, Operation::Upload).await?;
        let content_hash = ContentHash::compute(data);
        let object = MockObject {
            data: data.to_vec(),
            modified: UtcDateTime::now(),
            content_hash: Some(content_hash.clone()),
            options: options.clone(),
        };
        self.storage.write().await.insert(path, object);
        Ok(Uploaded { content_hash })
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure(&path, Operation::Delete).await?;
        self.storage.write().await.remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_and_read() {
        let backend = MockBackend::default();
        let options = UploadOptions::new("text/plain").with_header("Cache-Control", "no-cache");
        let uploaded = backend.upload(Path::new("test.txt"), b"hello", &options).await.unwrap();
        assert_eq!(uploaded.content_hash, ContentHash::compute(b"hello"));
        assert_eq!(backend.read(Path::new("test.txt")).await.unwrap(), b"hello");
        let object = backend.object("test.txt").await.unwrap();
        assert_eq!(object.options, options);
        assert_eq!(backend.upload_count(), 1);
    }

    #[tokio::test]
    async fn test_with_files_records_hashes() {
        let backend = MockBackend::with_files([("a/index.html", Vec::from(*b"page")), ("b/app.js", Vec::from(*b"js"))]);
        let meta = backend.metadata(Path::new("a/index.html")).await.unwrap();
        assert_eq!(meta.content_hash, Some(ContentHash::compute(b"page")));
        assert_eq!(meta.size, 4);
        assert_eq!(backend.metadata_count(), 1);
        assert_eq!(backend.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_metadata_not_found_and_denied() {
        let backend = MockBackend::default();
        let err = backend.metadata(Path::new("missing.txt")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        backend.deny("secret.txt").await;
        let err = backend.metadata(Path::new("secret.txt")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_put_object_without_hash() {
        let backend = MockBackend::default();
        backend.put_object("legacy.css", b"body{}".to_vec(), None).await;
        let meta = backend.metadata(Path::new("legacy.css")).await.unwrap();
        assert_eq!(meta.content_hash, None);
        assert_eq!(backend.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let backend = MockBackend::default();
        backend.fail("flaky.js", Operation::Upload).await;
        let err = backend.upload(Path::new("flaky.js"), b"x", &UploadOptions::default()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::BackendError(_)));
        assert!(backend.object("flaky.js").await.is_none());
        backend.recover("flaky.js", Operation::Upload).await;
        assert!(backend.upload(Path::new("flaky.js"), b"x", &UploadOptions::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete() {
        let backend = MockBackend::with_files([("file.txt", Vec::from(*b"data"))]);
        backend.delete(Path::new("file.txt")).await.unwrap();
        assert!(backend.is_empty().await);
        let err = backend.delete(Path::new("file.txt")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        assert_eq!(backend.delete_count(), 2);
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let backend = MockBackend::with_files([
            ("assets/app.js", Vec::from(*b"a")),
            ("assets/site.css", Vec::from(*b"b")),
            ("index.html", Vec::from(*b"c")),
        ]);
        let files = backend.list(Some(Path::new("assets"))).await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(backend.list(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let backend = MockBackend::default();
        assert!(backend.read(Path::new("../etc/passwd")).await.is_err());
        assert!(backend.upload(Path::new("../escape"), b"bad", &UploadOptions::default()).await.is_err());
    }

    #[test]
    #[should_panic(expected = "invalid path")]
    fn test_with_files_panics_on_bad_path() {
        MockBackend::with_files([("../escape", Vec::from(*b"bad"))]);
    }
}
