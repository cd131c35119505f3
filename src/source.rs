//! The build output directory, as a stream of file records.

use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use shipr_cache::HashCache;
use shipr_publish::FileRecord;
use shipr_storage::backend::LocalBackend;
use shipr_storage::error::{ErrorKind, Result};
use shipr_storage::{StorageBackend, to_key};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::instrument;

pub struct Source {
    backend: LocalBackend,
}

impl Source {
    /// Open an existing build output directory.
    pub fn open(dir: &Path) -> Result<Self> {
        let root = std::path::absolute(dir).or_raise(|| ErrorKind::InvalidPath(dir.to_path_buf()))?;
        if !root.is_dir() {
            exn::bail!(ErrorKind::NotFound(root));
        }
        Ok(Self {
            backend: LocalBackend::new("source", root)?,
        })
    }

    /// Object keys of every file in the directory, sorted.
    #[instrument(skip(self), fields(root = %self.backend.root().display()))]
    pub async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = self.backend.list(None).await?.into_iter().map(|info| to_key(info.path)).collect::<Result<Vec<_>>>()?;
        keys.sort();
        tracing::debug!(files = keys.len(), "listed build output");
        Ok(keys)
    }

    /// Read each of `keys` into a record. Files that can't be read are logged,
    /// counted in `failures` and left out.
    pub fn records<'a>(&'a self, keys: Vec<String>, failures: &'a AtomicUsize) -> impl Stream<Item = FileRecord> + 'a {
        // `rustfmt` does not format macros that use braces. Wrap in parentheses!
        stream!({
            for key in keys {
                match self.backend.read(Path::new(&key)).await {
                    Ok(bytes) => yield FileRecord::new(key, bytes),
                    Err(e) => {
                        tracing::error!(path = %key, error = ?e, "could not read file");
                        failures.fetch_add(1, Ordering::Relaxed);
                    },
                }
            }
        })
    }
}

/// Cached keys with no counterpart in the build output any more. A cached key
/// counts as present if its normalized form is a local key, or a local key
/// with `ext` appended (the name it's published under once compressed).
pub fn stale_keys(cache: &HashCache, keys: &[String], ext: &str) -> Vec<String> {
    let mut present: BTreeSet<String> = keys.iter().cloned().collect();
    if !ext.is_empty() {
        present.extend(keys.iter().map(|key| format!("{key}{ext}")));
    }
    cache
        .iter()
        .map(|(key, _)| key)
        .filter(|key| !to_key(key).is_ok_and(|normalized| present.contains(&normalized)))
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tempfile::TempDir;

    fn build_dir() -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("assets/css")).unwrap();
        std::fs::write(tmp.path().join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::write(tmp.path().join("assets/css/site.css"), "body {}").unwrap();
        std::fs::write(tmp.path().join("about.html"), "<h1>about</h1>").unwrap();
        tmp
    }

    #[tokio::test]
    async fn lists_sorted_keys() {
        let tmp = build_dir();
        let source = Source::open(tmp.path()).unwrap();
        assert_eq!(source.keys().await.unwrap(), vec!["about.html", "assets/css/site.css", "index.html"]);
    }

    #[tokio::test]
    async fn reads_records() {
        let tmp = build_dir();
        let source = Source::open(tmp.path()).unwrap();
        let failures = AtomicUsize::new(0);
        let keys = vec!["index.html".to_string(), "missing.html".to_string()];
        let records: Vec<_> = source.records(keys, &failures).collect().await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path(), "index.html");
        assert_eq!(records[0].bytes(), Some(&b"<h1>home</h1>"[..]));
        assert_eq!(failures.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn missing_directory() {
        let tmp = TempDir::new().unwrap();
        let err = Source::open(&tmp.path().join("dist")).err().unwrap();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn stale_keys_account_for_extension() {
        let tmp = TempDir::new().unwrap();
        let mut cache = HashCache::load(tmp.path().join(".shipr-test"));
        for key in ["index.html", "app.js.gz", "old.html", "old.css.gz"] {
            cache.set(key, "hash").unwrap();
        }
        let keys = vec!["index.html".to_string(), "app.js".to_string()];

        assert_eq!(stale_keys(&cache, &keys, ".gz"), vec!["old.css.gz", "old.html"]);
        assert_eq!(stale_keys(&cache, &keys, ""), vec!["app.js.gz", "old.css.gz", "old.html"]);
    }

    #[test]
    fn stale_keys_compare_normalized_keys() {
        let tmp = TempDir::new().unwrap();
        let mut cache = HashCache::load(tmp.path().join(".shipr-test"));
        for key in ["./index.html", "assets//app.js", "./gone.html"] {
            cache.set(key, "hash").unwrap();
        }
        let keys = vec!["index.html".to_string(), "assets/app.js".to_string()];

        assert_eq!(stale_keys(&cache, &keys, ""), vec!["./gone.html"]);
    }
}
