use crate::content_type::content_type;
use crate::decide::{self, Decision, Policy};
use crate::error::{ErrorKind, Result};
use crate::fingerprint::fingerprint;
use crate::probe::probe;
use crate::record::{Contents, Disposition, FileRecord, UploadOutcome};
use crate::report::Summary;
use crate::upload::{SharedCache, UploadExecutor, forget, remember, write};
use async_stream::stream;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use shipr_cache::HashCache;
use shipr_storage::error::ErrorKind as StorageErrorKind;
use shipr_storage::{BackendHandle, UploadOptions, to_key};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::instrument;

/// Timeout applied to each backend call unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How a [`Publisher`] treats the records it's given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    /// Bypass the cache and remote-hash shortcuts; upload everything.
    pub force: bool,
    /// Never overwrite an existing remote object.
    pub create_only: bool,
    /// Probe and decide, but never upload, delete or touch the cache.
    pub dry_run: bool,
    /// Records flagged for deletion also delete the remote object.
    pub delete_remote: bool,
    /// Maximum number of records with backend calls in flight. With `1`,
    /// records come out in the order they went in.
    pub concurrency: usize,
    /// Timeout applied to each individual backend call.
    pub timeout: Duration,
    /// Headers added to every upload (records can override them).
    pub headers: BTreeMap<String, String>,
}
impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            force: false,
            create_only: false,
            dry_run: false,
            delete_remote: false,
            concurrency: 1,
            timeout: DEFAULT_TIMEOUT,
            headers: BTreeMap::new(),
        }
    }
}

/// Progress events emitted by [`Publisher::publish`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started): exactly once.
/// 2. [`Published`](Self::Published): zero or more times, one per record
///    that didn't fail.
/// 3. [`Complete`](Self::Complete): exactly once, after the hash cache has
///    been saved.
///
/// Per-file failures are interleaved as `Err` items. Only a failure to save
/// the hash cache at the end terminates the stream early, in which case
/// [`Complete`](Self::Complete) is never emitted.
#[derive(Debug)]
pub enum PublishEvent {
    /// Publishing has begun; emitted exactly once before any other event.
    Started,
    /// A record has been processed and carries its outcome (records without
    /// contents carry none).
    Published(FileRecord),
    /// Every record has been processed and the cache saved.
    Complete(Summary),
}

/// Publishes records to a backend, skipping whatever the hash cache or the
/// backend say is already there.
///
/// The publisher exclusively owns the hash cache for the duration of the
/// run; in-flight records share it through a mutex.
pub struct Publisher {
    backend: BackendHandle,
    cache: SharedCache,
    options: PublishOptions,
}

impl Publisher {
    /// Create a publisher for `backend`, using an already loaded `cache`.
    ///
    /// # Errors
    /// [`ErrorKind::Config`] if the backend has no identifier or the options
    /// are unusable.
    pub fn new(backend: BackendHandle, cache: HashCache, options: PublishOptions) -> Result<Self> {
        if backend.name().trim().is_empty() {
            exn::bail!(ErrorKind::Config("backend has no bucket identifier".to_string()));
        }
        if options.concurrency == 0 {
            exn::bail!(ErrorKind::Config("concurrency must be at least 1".to_string()));
        }
        tracing::debug!(backend = backend.name(), cache = %cache.path().display(), entries = cache.len(), "publisher ready");
        Ok(Self {
            backend,
            cache: Arc::new(Mutex::new(cache)),
            options,
        })
    }

    /// Default hash cache location for a backend: `.shipr-<name>` in the
    /// working directory.
    pub fn default_cache_path(name: &str) -> PathBuf {
        PathBuf::from(format!(".shipr-{name}"))
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    pub fn options(&self) -> &PublishOptions {
        &self.options
    }

    /// Hash currently cached for `key`.
    pub async fn cached(&self, key: &str) -> Option<String> {
        self.cache.lock().await.get(key).map(str::to_owned)
    }

    /// Save the hash cache to disk.
    pub async fn flush(&self) -> Result<()> {
        write(&self.cache, HashCache::flush).await
    }

    fn policy(&self) -> Policy {
        Policy {
            force: self.options.force,
            create_only: self.options.create_only,
        }
    }

    fn executor(&self) -> UploadExecutor<'_> {
        UploadExecutor::new(&self.backend, &self.cache, &self.options.headers, self.options.timeout)
    }

    /// Streams [`PublishEvent`]s while publishing every record of `records`.
    ///
    /// Up to [`concurrency`](PublishOptions::concurrency) records are
    /// processed at a time; further records are pulled as in-flight ones
    /// complete. Failed records are yielded as `Err` items and dropped; the
    /// stream carries on with the next record. The hash cache is saved before
    /// [`Complete`](PublishEvent::Complete) is yielded.
    pub fn publish<'a>(
        &'a self,
        records: impl Stream<Item = FileRecord> + 'a,
    ) -> impl Stream<Item = Result<PublishEvent>> + 'a {
        // `rustfmt` does not format macros that use braces. Wrap in parentheses!
        stream!({
            yield Ok(PublishEvent::Started);

            let mut summary = Summary::default();
            let mut processing =
                std::pin::pin!(records.map(|record| self.process(record)).buffer_unordered(self.options.concurrency));
            while let Some(result) = processing.next().await {
                match result {
                    Ok(record) => {
                        summary.add(&record);
                        yield Ok(PublishEvent::Published(record));
                    },
                    Err(e) => {
                        summary.failed += 1;
                        yield Err(e);
                    },
                }
            }

            if !self.options.dry_run
                && let Err(e) = self.flush().await
            {
                yield Err(e);
                return;
            }
            tracing::info!(backend = self.backend.name(), %summary, "publish complete");
            yield Ok(PublishEvent::Complete(summary));
        })
    }

    /// Publish a single record, attaching its outcome.
    ///
    /// The record path is normalized into its object key first.
    ///
    /// Records that already carry an outcome are returned unchanged, records
    /// without contents are returned without one. Records flagged for deletion bypass the decision
    /// entirely.
    ///
    /// # Errors
    /// - [`ErrorKind::InvalidPath`] if the path escapes the root or is empty.
    /// - [`ErrorKind::UnsupportedContent`] for streamed contents.
    /// - [`ErrorKind::Probe`], [`ErrorKind::Upload`], [`ErrorKind::Delete`] or
    ///   [`ErrorKind::Timeout`] if a backend call fails. The cache is not
    ///   changed for the record.
    #[instrument(skip_all, fields(backend = self.backend.name(), path = record.path()))]
    pub async fn process(&self, mut record: FileRecord) -> Result<FileRecord> {
        if record.outcome().is_some() {
            return Ok(record);
        }
        record.path = to_key(&record.path).or_raise(|| ErrorKind::InvalidPath(record.path.clone()))?;
        if record.is_delete() {
            return self.delete(record).await;
        }
        let local = match record.contents() {
            None => {
                tracing::debug!("no contents, passing through");
                return Ok(record);
            },
            Some(Contents::Stream(_)) => exn::bail!(ErrorKind::UnsupportedContent(record.path().to_string())),
            Some(Contents::Buffer(bytes)) => fingerprint(bytes),
        };
        record.set_content_hash(local.clone());
        let key = record.path().to_string();
        let policy = self.policy();

        let cached = self.cached(&key).await;
        if decide::is_cached(&local, cached.as_deref(), policy) {
            record.settle(UploadOutcome::new(Disposition::Cache, Some(local)));
            return Ok(record);
        }

        let remote = probe(&self.backend, &key, self.options.timeout).await?;
        let decision = decide::decide(&local, &remote, policy);
        let disposition = decision.disposition();
        tracing::debug!(%disposition, exists = remote.exists, remote_hash = ?remote.content_hash, "decided");
        let outcome = match decision {
            Decision::Skip(hash) => {
                if let Some(hash) = &hash
                    && !self.options.dry_run
                {
                    remember(&self.cache, &key, hash).await;
                }
                UploadOutcome::new(disposition, hash).with_remote_modified(remote.modified)
            },
            Decision::Create | Decision::Update if self.options.dry_run => UploadOutcome::new(disposition, Some(local)),
            Decision::Create | Decision::Update => {
                let options = UploadOptions {
                    content_type: String::new(),
                    content_encoding: record.content_encoding(),
                    headers: record.headers().clone(),
                };
                let content_type = record.content_type().map(str::to_owned).unwrap_or_else(|| content_type(&key));
                let bytes = record.bytes().unwrap_or_default();
                let hash = self.executor().execute(&key, bytes, &content_type, options).await?;
                UploadOutcome::new(disposition, Some(hash))
            },
        };
        record.settle(outcome);
        Ok(record)
    }

    async fn delete(&self, mut record: FileRecord) -> Result<FileRecord> {
        let key = record.path().to_string();
        if !self.options.dry_run {
            if self.options.delete_remote {
                let delete = self.backend.delete(Path::new(&key));
                match tokio::time::timeout(self.options.timeout, delete).await {
                    Err(_elapsed) => exn::bail!(ErrorKind::Timeout(key)),
                    Ok(Err(e)) if matches!(&*e, StorageErrorKind::NotFound(_)) => {
                        tracing::debug!("remote object already gone");
                    },
                    Ok(result) => result.or_raise(|| ErrorKind::Delete(key.clone()))?,
                }
            }
            forget(&self.cache, &key).await;
        }
        record.settle(UploadOutcome::new(Disposition::Delete, None));
        Ok(record)
    }
}
