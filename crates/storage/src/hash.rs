//! Content hashing.

use derive_more::{Display, From};

/// A content digest used for change detection.
///
/// The hash is the lowercase hex encoding of a BLAKE3 digest. Every backend
/// reports hashes in this form so that a locally computed hash can be
/// compared with a remote one using plain string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, From)]
#[display("{_0}")]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash arbitrary bytes.
    ///
    /// ```
    /// use shipr_storage::ContentHash;
    ///
    /// let empty = ContentHash::compute(b"");
    /// assert_eq!(empty.as_str().len(), 64);
    /// assert_eq!(empty, ContentHash::compute(&[]));
    /// ```
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(blake3::hash(data).to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}
impl From<&str> for ContentHash {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
impl PartialEq<str> for ContentHash {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
impl PartialEq<&str> for ContentHash {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        assert_eq!(ContentHash::compute(b"hello"), ContentHash::compute(b"hello"));
        assert_ne!(ContentHash::compute(b"hello"), ContentHash::compute(b"hello!"));
    }

    #[test]
    fn test_known_value() {
        // BLAKE3 of the empty input.
        assert_eq!(
            ContentHash::compute(b"").as_str(),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }

    #[test]
    fn test_no_normalization() {
        let hash = ContentHash::compute(b"hello");
        let upper = ContentHash::from(hash.as_str().to_uppercase());
        assert_ne!(hash, upper);
    }
}
