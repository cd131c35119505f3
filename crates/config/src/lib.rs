//! Configuration loading and validation.
//!
//! Configuration is layered with [`figment`], later sources overriding
//! earlier ones:
//!
//! 1. Built-in defaults.
//! 2. The user config file (`config.toml` in the platform config directory,
//!    e.g. `~/.config/shipr/config.toml`).
//! 3. `./shipr.toml`, or the file given explicitly (TOML, YAML or JSON,
//!    chosen by extension).
//! 4. Environment variables prefixed `SHIPR_`, nested with `__`
//!    (`SHIPR_PUBLISH__CONCURRENCY=4`).
//!
//! ```toml
//! [target]
//! type = "s3"
//! bucket = "www.example.com"
//! endpoint = "https://storage.googleapis.com"
//! key_id = "GOOG..."
//! key_secret = "..."
//!
//! [publish]
//! concurrency = 8
//! headers = { "Cache-Control" = "public, max-age=300" }
//!
//! [encoding]
//! format = "gzip"
//! smaller_only = true
//! ```

pub mod error;
mod models;

pub use crate::models::{CacheConfig, EncodingConfig, PublishConfig, ReportConfig, TargetConfig};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use serde::Deserialize;
use shipr_compress::ContentEncoding;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "shipr.toml";
/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "SHIPR_";

/// Complete, validated configuration.
///
/// Unknown top-level keys are ignored so that `SHIPR_*` variables meant for
/// the command line (such as `SHIPR_CONFIG`) don't break loading; unknown keys
/// inside a section are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    pub target: TargetConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub encoding: Option<EncodingConfig>,
    #[serde(default)]
    pub report: ReportConfig,
}

impl Config {
    /// Load configuration from every layer.
    ///
    /// An explicit `path` must exist; the implicit `./shipr.toml` and user
    /// config file are optional.
    #[instrument]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();
        if let Some(user) = user_config_file() {
            tracing::debug!(path = %user.display(), "user config file");
            figment = figment.merge(Toml::file(user));
        }
        figment = match path {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
                }
                merge_file(figment, path)
            },
            None => figment.merge(Toml::file(DEFAULT_CONFIG_FILE)),
        };
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load configuration from a single file, without user config or
    /// environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        Self::from_figment(merge_file(Figment::new(), path))
    }

    /// Extract and validate configuration from an assembled [`Figment`].
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        match &self.target {
            TargetConfig::S3 { bucket, .. } if bucket.trim().is_empty() => {
                exn::bail!(ErrorKind::Invalid("target.bucket must not be empty".to_string()))
            },
            TargetConfig::Local { path } if path.as_os_str().is_empty() => {
                exn::bail!(ErrorKind::Invalid("target.path must not be empty".to_string()))
            },
            _ => {},
        }
        if self.publish.concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("publish.concurrency must be at least 1".to_string()));
        }
        if self.publish.timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid("publish.timeout_secs must be at least 1".to_string()));
        }
        if let Some(encoding) = &self.encoding
            && encoding.format == ContentEncoding::Identity
        {
            exn::bail!(ErrorKind::Invalid("encoding.format must be a compressing encoding".to_string()));
        }
        Ok(())
    }

    /// Location of the hash cache file.
    pub fn cache_path(&self) -> PathBuf {
        self.cache
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!(".shipr-{}", self.target.identifier())))
    }

    /// Timeout applied to each backend call.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.publish.timeout_secs)
    }
}

fn merge_file(figment: Figment, path: &Path) -> Figment {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => figment.merge(Toml::file(path)),
    }
}

fn user_config_file() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "shipr").map(|dirs| dirs.config_dir().join("config.toml"))
}
