use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// On-disk mapping of object key to last-known remote content hash.
///
/// Mutations are applied in memory and written back in batches: every
/// `flush_every` mutations the whole mapping is flushed to disk, and the
/// owner is expected to call [`flush()`](Self::flush) once more when it's
/// done. A `HashCache` is not synchronised; share it behind a mutex.
///
/// # Examples
///
/// ```no_run
/// use shipr_cache::HashCache;
///
/// # fn example() -> shipr_cache::error::Result<()> {
/// let mut cache = HashCache::load(".shipr-www.example.com");
/// if cache.get("index.html") != Some("af1349b9") {
///     cache.set("index.html", "af1349b9")?;
/// }
/// cache.flush()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct HashCache {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    /// Mutations since the last successful flush.
    pending: usize,
    flush_every: usize,
}

impl HashCache {
    /// Number of mutations between automatic flushes, unless configured
    /// otherwise.
    pub const DEFAULT_FLUSH_EVERY: usize = 10;

    /// Load the cache stored at `path`.
    ///
    /// Never fails: a missing file is an empty cache, and an unreadable or
    /// unparsable file is logged and also treated as an empty cache (it will
    /// be overwritten on the next flush).
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<BTreeMap<String, String>>(&bytes) {
                Ok(entries) => {
                    tracing::debug!(entries = entries.len(), "loaded hash cache");
                    entries
                },
                Err(e) => {
                    tracing::warn!(error = %e, "hash cache is corrupt, starting empty");
                    BTreeMap::new()
                },
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no hash cache yet, starting empty");
                BTreeMap::new()
            },
            Err(e) => {
                tracing::warn!(error = %e, "hash cache is unreadable, starting empty");
                BTreeMap::new()
            },
        };
        Self {
            path,
            entries,
            pending: 0,
            flush_every: Self::DEFAULT_FLUSH_EVERY,
        }
    }

    /// Change the number of mutations between automatic flushes. Zero
    /// disables automatic flushing entirely.
    pub fn with_flush_every(mut self, flush_every: usize) -> Self {
        self.flush_every = flush_every;
        self
    }

    /// Location of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Record `hash` for `key`.
    ///
    /// The mutation is always applied; an error means only that the
    /// automatic flush it triggered failed (it will be retried on the next
    /// mutation or flush).
    pub fn set(&mut self, key: impl Into<String>, hash: impl Into<String>) -> Result<()> {
        self.entries.insert(key.into(), hash.into());
        self.mutated()
    }

    /// Forget `key`, returning the hash that was recorded for it.
    ///
    /// Removing a key that isn't cached is not a mutation. As with
    /// [`set()`](Self::set), an error only reports a failed automatic flush.
    pub fn remove(&mut self, key: &str) -> Result<Option<String>> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.mutated()?;
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if there are mutations not yet written to disk.
    pub fn is_dirty(&self) -> bool {
        self.pending > 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Write the whole mapping to disk, replacing the previous file.
    ///
    /// Parent directories are created as needed. The data is written to a
    /// temporary sibling file first and renamed over the cache file, so a
    /// crash mid-write never leaves a truncated cache behind.
    #[instrument(skip(self), fields(path = %self.path.display(), entries = self.entries.len()))]
    pub fn flush(&mut self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).or_raise(|| ErrorKind::Write(dir.to_path_buf()))?;
        }
        let json = serde_json::to_vec_pretty(&self.entries).or_raise(|| ErrorKind::InvalidData)?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, json).or_raise(|| ErrorKind::Write(tmp.clone()))?;
        std::fs::rename(&tmp, &self.path).or_raise(|| ErrorKind::Write(self.path.clone()))?;
        self.pending = 0;
        tracing::debug!("flushed hash cache");
        Ok(())
    }

    fn mutated(&mut self) -> Result<()> {
        self.pending += 1;
        if self.flush_every > 0 && self.pending >= self.flush_every {
            self.flush()?;
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}
