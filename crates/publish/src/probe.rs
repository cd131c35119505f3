//! Remote state probing.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use shipr_storage::{BackendHandle, ContentHash};
use std::path::Path;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::instrument;

/// What the backend knows about an object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteState {
    pub exists: bool,
    /// Hash recorded for the object. `None` when the object doesn't exist or
    /// was written without one.
    pub content_hash: Option<ContentHash>,
    pub modified: Option<OffsetDateTime>,
}
impl RemoteState {
    /// Nothing there.
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn existing(content_hash: Option<ContentHash>) -> Self {
        Self {
            exists: true,
            content_hash,
            modified: None,
        }
    }
}

/// Ask the backend about `path`, giving up after `timeout`.
///
/// "Not found" and "permission denied" both mean the object is absent; any
/// other failure is an error for this file.
#[instrument(skip(backend), fields(backend = backend.name()))]
pub async fn probe(backend: &BackendHandle, path: &str, timeout: Duration) -> Result<RemoteState> {
    let metadata = match tokio::time::timeout(timeout, backend.metadata(Path::new(path))).await {
        Ok(result) => result,
        Err(_elapsed) => exn::bail!(ErrorKind::Timeout(path.to_string())),
    };
    match metadata {
        Ok(meta) => Ok(RemoteState {
            exists: true,
            content_hash: meta.content_hash,
            modified: meta.modified,
        }),
        Err(e) if e.is_absent() => {
            tracing::debug!(reason = %*e, "remote object is absent");
            Ok(RemoteState::absent())
        },
        Err(e) => Err(e).or_raise(|| ErrorKind::Probe(path.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipr_storage::backend::{MockBackend, Operation};
    use std::sync::Arc;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn existing_object() {
        let backend: BackendHandle = Arc::new(MockBackend::with_files([("index.html", Vec::from(*b"hi"))]));
        let state = probe(&backend, "index.html", TIMEOUT).await.unwrap();
        assert!(state.exists);
        assert_eq!(state.content_hash, Some(ContentHash::compute(b"hi")));
        assert!(state.modified.is_some());
    }

    #[tokio::test]
    async fn not_found_is_absent() {
        let backend: BackendHandle = Arc::new(MockBackend::default());
        assert_eq!(probe(&backend, "missing.html", TIMEOUT).await.unwrap(), RemoteState::absent());
    }

    #[tokio::test]
    async fn forbidden_is_absent() {
        let mock = MockBackend::with_files([("secret.html", Vec::from(*b"hi"))]);
        mock.deny("secret.html").await;
        let backend: BackendHandle = Arc::new(mock);
        assert_eq!(probe(&backend, "secret.html", TIMEOUT).await.unwrap(), RemoteState::absent());
    }

    #[tokio::test]
    async fn other_failures_propagate() {
        let mock = MockBackend::default();
        mock.fail("flaky.html", Operation::Metadata).await;
        let backend: BackendHandle = Arc::new(mock);
        let err = probe(&backend, "flaky.html", TIMEOUT).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Probe(path) if path == "flaky.html"));
    }
}
