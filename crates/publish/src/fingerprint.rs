//! Content fingerprints.

use shipr_storage::ContentHash;

/// Fingerprint of a file's contents, comparable with the hash a backend
/// reports for the object it stores.
///
/// Deterministic and pure. The fingerprint of an empty file is well defined
/// (it's the BLAKE3 hash of the empty input).
///
/// ```
/// use shipr_publish::fingerprint;
///
/// assert_eq!(fingerprint(b"body {}"), fingerprint(b"body {}"));
/// assert_ne!(fingerprint(b"body {}"), fingerprint(b"body { }"));
/// ```
pub fn fingerprint(bytes: &[u8]) -> ContentHash {
    ContentHash::compute(bytes)
}
