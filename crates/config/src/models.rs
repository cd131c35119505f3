//! Configuration sections.

use serde::{Deserialize, Deserializer};
use shipr_compress::ContentEncoding;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Where files are published to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum TargetConfig {
    /// An S3-compatible bucket.
    S3 {
        bucket: String,
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default = "default_region")]
        region: String,
        #[serde(default)]
        endpoint: Option<String>,
        key_id: String,
        key_secret: String,
    },
    /// A directory on the local filesystem, mostly useful for staging.
    Local { path: PathBuf },
}
impl TargetConfig {
    /// Identifier of the target: the bucket name, or the directory name for
    /// local targets.
    pub fn identifier(&self) -> String {
        match self {
            Self::S3 { bucket, .. } => bucket.clone(),
            Self::Local { path } => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "local".to_string()),
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Hash cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Cache file location. Defaults to `.shipr-<target identifier>` in the
    /// working directory.
    pub path: Option<PathBuf>,
    /// Mutations between automatic flushes (`0` flushes only at the end).
    pub flush_every: usize,
}
impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            flush_every: 10,
        }
    }
}

/// Publishing policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishConfig {
    /// Ignore the cache and remote hashes; upload everything.
    pub force: bool,
    /// Never overwrite an object that already exists remotely.
    pub create_only: bool,
    /// Decide, but don't upload or touch the cache.
    pub dry_run: bool,
    /// Delete remote objects for records flagged for deletion.
    pub delete_remote: bool,
    /// Maximum number of files with backend calls in flight.
    pub concurrency: usize,
    /// Timeout applied to each individual backend call.
    pub timeout_secs: u64,
    /// Headers added to every upload.
    pub headers: BTreeMap<String, String>,
}
impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            force: false,
            create_only: false,
            dry_run: false,
            delete_remote: false,
            concurrency: 1,
            timeout_secs: 30,
            headers: BTreeMap::new(),
        }
    }
}

/// Pre-publish compression. Compression is disabled when the section is
/// absent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingConfig {
    #[serde(deserialize_with = "deserialize_encoding")]
    pub format: ContentEncoding,
    /// Suffix appended to the path of compressed files (e.g. `.gz`).
    pub ext: String,
    /// Keep the original when compressing doesn't make it smaller.
    pub smaller_only: bool,
}
impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            format: ContentEncoding::Gzip,
            ext: String::new(),
            smaller_only: false,
        }
    }
}

fn deserialize_encoding<'de, D>(deserializer: D) -> Result<ContentEncoding, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    name.parse()
        .map_err(|_| serde::de::Error::custom(format!("unsupported content encoding: {name}")))
}

/// Which outcomes get reported.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// Disposition names (`cache`, `skip`, `update`, `create`, `delete`).
    pub states: Vec<String>,
}
impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            states: vec!["create".to_string(), "update".to_string()],
        }
    }
}
