//! Local filesystem storage backend.
//!
//! Files are stored in a configured directory and accessed using `tokio::fs`.
//! Serves both as the publish *source* (the build output directory) and as a
//! publish *target* for mirroring a site into a directory.

use crate::backend::FileInfoStream;
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use crate::{ContentHash, FileInfo, RemoteMeta, StorageBackend, UploadOptions, Uploaded};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

/// What a directory entry turned out to be while listing.
enum Visit {
    File(FileInfo),
    Directory(PathBuf),
    Ignore,
}

/// Local filesystem storage backend.
///
/// All paths are relative to the configured root directory. Local files
/// carry no headers, so the content type and encoding of an upload are only
/// logged; the content hash is computed from the file on disk.
///
/// # Examples
///
/// ```no_run
/// use shipr_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let source = LocalBackend::new("dist", "/absolute/path/to/dist")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}

impl LocalBackend {
    /// Create a backend rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::InvalidPath`] if `root` is relative or is not a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root.to_path_buf()));
        }
        match std::fs::metadata(root) {
            Ok(metadata) if metadata.is_dir() => {},
            Ok(_) => exn::bail!(ErrorKind::InvalidPath(root.to_path_buf())),
            // Blocking, but only ever once per backend.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                std::fs::create_dir_all(root).map_err(|e| io_error(e, root))?;
            },
            Err(e) => exn::bail!(io_error(e, root)),
        }
        Ok(Self {
            name: name.into(),
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location on disk of a storage path.
    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        Ok(self.root.join(validate_path(path)?))
    }

    /// Storage path of a location on disk under the root.
    fn storage_path(&self, location: &Path) -> Result<PathBuf> {
        let relative = location.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!("{} is outside of {}", location.display(), self.root.display()))
        })?;
        validate_path(relative)
    }

    /// Entries of `dir` sorted by name. A missing directory has none.
    async fn entries(dir: &Path) -> Result<Vec<DirEntry>> {
        let mut reader = match fs::read_dir(dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => exn::bail!(io_error(e, dir)),
        };
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| io_error(e, dir))? {
            entries.push(entry);
        }
        entries.sort_by_key(DirEntry::file_name);
        Ok(entries)
    }

    async fn visit(&self, entry: DirEntry, prefix: Option<&Path>) -> Result<Visit> {
        let location = entry.path();
        let path = self.storage_path(&location)?;
        if prefix.is_some_and(|prefix| !path.starts_with(prefix)) {
            return Ok(Visit::Ignore);
        }
        // Follows symlinks; dangling ones are ignored.
        let Ok(metadata) = fs::metadata(&location).await else {
            return Ok(Visit::Ignore);
        };
        if metadata.is_dir() {
            return Ok(Visit::Directory(location));
        }
        if !metadata.is_file() {
            return Ok(Visit::Ignore);
        }
        let modified = metadata.modified().map_err(|e| io_error(e, &location))?;
        Ok(Visit::File(FileInfo::new(path, metadata.len(), modified)))
    }
}

fn io_error(e: std::io::Error, path: &Path) -> ErrorKind {
    match e.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
        std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
        _ => ErrorKind::Io(e),
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    /// Walks the tree breadth-first, each directory in name order.
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let prefix = match prefix.map(validate_path).transpose() {
            Ok(prefix) => prefix,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };
        // Prefixes match whole components and may name a file, so the walk
        // starts from the prefix's parent: "assets/js" matches
        // "assets/js/app.js" but not "assets/json/data.json".
        let start = match prefix.as_deref().and_then(Path::parent) {
            Some(parent) => self.root.join(parent),
            None => self.root.clone(),
        };

        // `rustfmt` does not format macros that use braces. Wrap in parentheses!
        Box::pin(stream!({
            let mut pending = VecDeque::from([start]);
            while let Some(dir) = pending.pop_front() {
                let entries = match Self::entries(&dir).await {
                    Ok(entries) => entries,
                    Err(e) => {
                        yield Err(e);
                        continue;
                    },
                };
                for entry in entries {
                    match self.visit(entry, prefix.as_deref()).await {
                        Ok(Visit::File(info)) => yield Ok(info),
                        Ok(Visit::Directory(dir)) => pending.push_back(dir),
                        Ok(Visit::Ignore) => {},
                        Err(e) => yield Err(e),
                    }
                }
            }
        }))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let location = self.resolve(path)?;
        Ok(fs::read(&location).await.map_err(|e| io_error(e, path))?)
    }

    async fn metadata(&self, path: &Path) -> Result<RemoteMeta> {
        let location = self.resolve(path)?;
        let metadata = fs::metadata(&location).await.map_err(|e| io_error(e, path))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        let data = fs::read(&location).await.map_err(|e| io_error(e, path))?;
        Ok(RemoteMeta {
            path: validate_path(path)?,
            size: metadata.len(),
            modified: metadata.modified().ok().map(Into::into),
            content_hash: Some(ContentHash::compute(&data)),
        })
    }

    async fn upload(&self, path: &Path, data: &[u8], options: &UploadOptions) -> Result<Uploaded> {
        let location = self.resolve(path)?;
        // Object stores have no directories to create first.
        if let Some(parent) = location.parent() {
            fs::create_dir_all(parent).await.map_err(|e| io_error(e, path))?;
        }
        fs::write(&location, data).await.map_err(|e| io_error(e, path))?;
        tracing::debug!(
            backend = %self.name,
            path = %path.display(),
            content_type = %options.content_type,
            content_encoding = %options.content_encoding,
            "Wrote file; headers are not stored by the local backend"
        );
        Ok(Uploaded { content_hash: ContentHash::compute(data) })
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let location = self.resolve(path)?;
        Ok(fs::remove_file(&location).await.map_err(|e| io_error(e, path))?)
    }
}
