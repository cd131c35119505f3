//! S3-compatible storage backend.
//!
//! This module provides a storage backend implementation for S3-compatible
//! services including AWS S3, Google Cloud Storage (interoperability API),
//! Backblaze B2, Tigris (Fly.io), and others.
//!
//! # Content Hashes
//!
//! S3 ETags are only an MD5 of the body for single-part, non-KMS uploads, so
//! they can't be relied on. Instead every upload stores the BLAKE3 hash of
//! its body as user metadata (`x-amz-meta-content-hash`), and
//! [`metadata()`](StorageBackend::metadata) reads it back. Objects written by
//! other tools have no recorded hash.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via the configuration file.

use crate::{
    ContentHash, FileInfo, RemoteMeta, StorageBackend, UploadOptions, Uploaded,
    backend::FileInfoStream,
    error::{ErrorKind, Result},
    to_key, validate_path,
};
use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, http::HttpResponse, retry::RetryConfig},
    error::{DisplayErrorContext, SdkError},
    primitives::{ByteStream, DateTime},
};
use exn::ResultExt;
use std::path::Path;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::instrument;

/// Generous default for concurrent S3 requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;
/// User metadata key the content hash is stored under.
const CONTENT_HASH_METADATA: &str = "content-hash";

/// S3-compatible storage backend.
///
/// Stores objects in an S3 bucket, optionally under a key prefix. All paths
/// are relative to the configured prefix (if any). The backend name is the
/// bucket name.
///
/// # Examples
///
/// ```no_run
/// use shipr_storage::backend::S3Backend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = S3Backend::new(
///     "www.example.com",
///     Some("site/".to_string()),
///     "auto",
///     Some("https://storage.googleapis.com"),
///     "access_key_id",
///     "secret_access_key",
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    /// Create a new S3 storage backend.
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `prefix` - Optional key prefix (acts as virtual directory)
    /// * `region` - AWS region or provider-specific region (e.g., "auto")
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - Access key ID
    /// * `key_secret` - Secret access key
    pub fn new(
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let bucket = bucket.into();
        if bucket.trim().is_empty() {
            exn::bail!(ErrorKind::BackendError("bucket name must not be empty".to_string()));
        }
        let prefix = prefix.map(to_key).transpose()?;
        let credentials = Credentials::new(key_id, key_secret, None, None, "shipr-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            // 1 initial attempt + 3 retries with exponential backoff
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Path-style addressing for S3-compatible services (MinIO, etc.)
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Ok(Self::with_client(Client::from_conf(config_builder.build()), bucket, prefix))
    }

    /// Wrap an already configured client. `prefix` must be a normalized key.
    fn with_client(client: Client, bucket: String, prefix: Option<String>) -> Self {
        Self {
            client,
            bucket,
            prefix,
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        }
    }

    /// Construct the full S3 key from a relative path.
    fn full_key(&self, path: &Path) -> Result<String> {
        Ok(join_key(self.prefix.as_deref(), &to_key(path)?))
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        self.rate_limiter
            .clone()
            .acquire_owned()
            .await
            .or_raise(|| ErrorKind::BackendError("S3 request limiter closed".to_string()))
    }

    fn file_info(&self, key: &str, object: &aws_sdk_s3::types::Object) -> Result<FileInfo> {
        let path = validate_path(strip_key(self.prefix.as_deref(), key))?;
        let modified = match object.last_modified() {
            Some(dt) => parse_datetime(dt)?,
            None => OffsetDateTime::UNIX_EPOCH,
        };
        Ok(FileInfo::new(path, size(object.size()), modified))
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.bucket
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        Box::pin(stream! {
            // Listing "assets" must not match "assets-old/", so list the
            // directory (trailing slash) rather than the raw string prefix.
            let list_prefix = match prefix {
                Some(p) => match self.full_key(p) {
                    Ok(key) => Some(format!("{key}/")),
                    Err(e) => {
                        yield Err(e);
                        return;
                    },
                },
                None => self.prefix.as_ref().map(|p| format!("{p}/")),
            };
            let mut pages = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .set_prefix(list_prefix)
                .into_paginator()
                .send();
            loop {
                let permit = match self.acquire_permit().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        yield Err(e);
                        return;
                    },
                };
                let Some(page) = pages.next().await else { break };
                drop(permit);
                let page = match page {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(classify(e, prefix.unwrap_or(Path::new(""))).into());
                        return;
                    },
                };
                for object in page.contents() {
                    let Some(key) = object.key() else { continue };
                    // Directory placeholder objects created by some consoles.
                    if key.ends_with('/') {
                        continue;
                    }
                    yield self.file_info(key, object);
                }
            }
        })
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| classify(e, path))?;
        let body = output
            .body
            .collect()
            .await
            .map_err(|e| ErrorKind::Network(format!("reading {key}: {e}")))?;
        Ok(body.into_bytes().to_vec())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn metadata(&self, path: &Path) -> Result<RemoteMeta> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| classify(e, path))?;
        let modified = output.last_modified().map(parse_datetime).transpose()?;
        let content_hash = output
            .metadata()
            .and_then(|metadata| metadata.get(CONTENT_HASH_METADATA))
            .map(|hash| ContentHash::from(hash.as_str()));
        Ok(RemoteMeta {
            path: validate_path(path)?,
            size: size(output.content_length()),
            modified,
            content_hash,
        })
    }

    #[instrument(skip(self, data, options), fields(bucket = %self.bucket, size = data.len()))]
    async fn upload(&self, path: &Path, data: &[u8], options: &UploadOptions) -> Result<Uploaded> {
        let key = self.full_key(path)?;
        let content_hash = ContentHash::compute(data);
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data.to_vec()))
            .content_type(&options.content_type)
            .metadata(CONTENT_HASH_METADATA, content_hash.as_str());
        if let Some(encoding) = options.content_encoding.header_value() {
            request = request.content_encoding(encoding);
        }
        for (name, value) in &options.headers {
            request = match name.to_ascii_lowercase().as_str() {
                "cache-control" => request.cache_control(value),
                "content-disposition" => request.content_disposition(value),
                "content-language" => request.content_language(value),
                // Set from the options above; a stray copy must not override them.
                "content-type" | "content-encoding" => request,
                other => match other.trim_start_matches("x-amz-meta-") {
                    CONTENT_HASH_METADATA => {
                        tracing::warn!(header = %name, "ignoring header that would replace the content hash");
                        request
                    },
                    metadata => request.metadata(metadata, value),
                },
            };
        }
        let _permit = self.acquire_permit().await?;
        request.send().await.map_err(|e| classify(e, path))?;
        tracing::debug!(key, hash = %content_hash, "uploaded object");
        Ok(Uploaded { content_hash })
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn delete(&self, path: &Path) -> Result<()> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        // S3 answers 204 for missing keys too, so NotFound is never reported.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| classify(e, path))?;
        Ok(())
    }
}

/// Joins an optional key prefix and a key.
fn join_key(prefix: Option<&str>, key: &str) -> String {
    match prefix.map(|p| p.trim_end_matches('/')) {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}/{key}"),
        _ => key.to_string(),
    }
}

/// Strips an optional key prefix from a key. Keys outside the prefix are
/// returned unchanged.
fn strip_key<'k>(prefix: Option<&str>, key: &'k str) -> &'k str {
    match prefix.map(|p| p.trim_end_matches('/')) {
        Some(prefix) if !prefix.is_empty() => key.strip_prefix(prefix).and_then(|s| s.strip_prefix('/')).unwrap_or(key),
        _ => key,
    }
}

fn size(length: Option<i64>) -> u64 {
    length.and_then(|l| u64::try_from(l).ok()).unwrap_or(0)
}

/// Convert AWS DateTime to OffsetDateTime.
fn parse_datetime(dt: &DateTime) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(dt.as_nanos())
        .or_raise(|| ErrorKind::BackendError("S3 datetime out of range".to_string()))
}

/// Maps an SDK error onto the actionable error categories.
fn classify<E>(err: SdkError<E, HttpResponse>, path: &Path) -> ErrorKind
where
    E: std::error::Error + Send + Sync + 'static,
{
    if let Some(response) = err.raw_response() {
        match response.status().as_u16() {
            404 => return ErrorKind::NotFound(path.to_path_buf()),
            403 => return ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => {},
        }
    }
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            ErrorKind::Network(DisplayErrorContext(&err).to_string())
        },
        _ => ErrorKind::BackendError(DisplayErrorContext(&err).to_string()),
    }
}
