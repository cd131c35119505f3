//! Path validation and object key conversion.
//!
//! Every path handed to a backend is relative to the backend's root (a
//! directory, or a bucket plus optional prefix) and must never escape it.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a storage path for security and correctness.
/// Ensures that paths don't escape the storage root (no `..` traversal).
///
/// > **Note:** This does **not** normalize backslashes on Unix, non-UTF8
/// >           bytes, or platform-specific weirdness. Null bytes are
/// >           explicitly rejected.
///
/// # Returns
/// Returns the normalized path if valid, or [`InvalidPath`](crate::error::ErrorKind::InvalidPath)
/// if invalid.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use shipr_storage::validate_path;
/// // Valid paths
/// assert!(validate_path("assets/app.js").is_ok());
/// assert!(validate_path("a/../index.html").is_ok()); // (never leaves root)
/// // Invalid paths
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a/../../b").is_err()); // (leaves root)
/// assert!(validate_path("a\0b").is_err());
/// // Paths get resolved
/// assert_eq!(
///     validate_path("wrong/.././assets//./app.css/").unwrap(),
///     Path::new("assets/app.css")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let invalid = || exn::Exn::from(ErrorKind::InvalidPath(path.to_path_buf()));
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            // NUL survives `components()` on Unix but truncates paths in syscalls.
            Component::Normal(part) if part.as_encoded_bytes().contains(&0) => return Err(invalid()),
            Component::Normal(part) => normalized.push(part),
            Component::CurDir | Component::RootDir => {},
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(invalid());
                }
            },
            Component::Prefix(_) => return Err(invalid()),
        }
    }
    match normalized.as_os_str().is_empty() {
        true => Err(invalid()),
        false => Ok(normalized),
    }
}

/// Converts a storage path into an object key: validated, and joined with
/// `/` regardless of the platform separator.
///
/// Keys are what the hash cache and object stores are indexed by, so the
/// same file must produce the same key on every platform.
///
/// ```
/// use shipr_storage::to_key;
///
/// assert_eq!(to_key("assets/./css//site.css").unwrap(), "assets/css/site.css");
/// assert!(to_key("../secret").is_err());
/// ```
pub fn to_key(path: impl AsRef<Path>) -> Result<String> {
    let validated = validate(path.as_ref())?;
    let mut parts = Vec::new();
    for component in validated.components() {
        match component.as_os_str().to_str() {
            Some(part) => parts.push(part),
            None => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
        }
    }
    Ok(parts.join("/"))
}
