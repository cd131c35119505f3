//! Upload execution.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use shipr_cache::HashCache;
use shipr_storage::{BackendHandle, ContentHash, UploadOptions};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::instrument;

/// Hash cache shared by the records of a run.
pub(crate) type SharedCache = Arc<Mutex<HashCache>>;

/// Performs uploads and records the resulting hash in the cache.
///
/// Upload headers are layered: the executor's defaults, then the caller's
/// options on top. The content type is always the one passed to
/// [`execute()`](Self::execute), whatever the headers say.
pub struct UploadExecutor<'a> {
    backend: &'a BackendHandle,
    cache: &'a SharedCache,
    defaults: &'a BTreeMap<String, String>,
    timeout: Duration,
}

impl<'a> UploadExecutor<'a> {
    pub fn new(
        backend: &'a BackendHandle,
        cache: &'a SharedCache,
        defaults: &'a BTreeMap<String, String>,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            cache,
            defaults,
            timeout,
        }
    }

    /// Upload `bytes` to `path`.
    ///
    /// On success the hash reported by the backend is stored in the cache and
    /// returned. On failure the cache is left alone.
    #[instrument(skip(self, bytes, options), fields(backend = self.backend.name(), size = bytes.len()))]
    pub async fn execute(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
        options: UploadOptions,
    ) -> Result<ContentHash> {
        let options = self.options(content_type, options);
        let upload = self.backend.upload(Path::new(path), bytes, &options);
        let uploaded = match tokio::time::timeout(self.timeout, upload).await {
            Ok(result) => result.or_raise(|| ErrorKind::Upload(path.to_string()))?,
            Err(_elapsed) => exn::bail!(ErrorKind::Timeout(path.to_string())),
        };
        remember(self.cache, path, &uploaded.content_hash).await;
        Ok(uploaded.content_hash)
    }

    fn options(&self, content_type: &str, caller: UploadOptions) -> UploadOptions {
        let mut headers = self.defaults.clone();
        headers.extend(caller.headers);
        headers.retain(|name, _| !name.eq_ignore_ascii_case("content-type"));
        UploadOptions {
            content_type: content_type.to_string(),
            content_encoding: caller.content_encoding,
            headers,
        }
    }
}

/// Record `hash` for `key`. A failed autosave is not the file's fault; it's
/// logged and retried by the next mutation or the final flush.
pub(crate) async fn remember(cache: &SharedCache, key: &str, hash: &ContentHash) {
    let (key, hash) = (key.to_string(), hash.as_str().to_string());
    if let Err(e) = write(cache, move |cache| cache.set(key, hash)).await {
        tracing::warn!(error = ?e, "could not autosave hash cache");
    }
}

/// Forget whatever hash is recorded for `key`.
pub(crate) async fn forget(cache: &SharedCache, key: &str) {
    let key = key.to_string();
    if let Err(e) = write(cache, move |cache| cache.remove(&key)).await {
        tracing::warn!(error = ?e, "could not autosave hash cache");
    }
}

/// Run a cache operation that may write to disk on the blocking pool. The
/// lock is held until the operation finishes.
pub(crate) async fn write<T, F>(cache: &SharedCache, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut HashCache) -> shipr_cache::error::Result<T> + Send + 'static,
{
    let mut guard = Arc::clone(cache).lock_owned().await;
    tokio::task::spawn_blocking(move || op(&mut *guard))
        .await
        .or_raise(|| ErrorKind::Cache)?
        .or_raise(|| ErrorKind::Cache)
}
