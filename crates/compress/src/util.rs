use crate::ContentEncoding;
use std::fmt::{Display, Formatter, Result as FmtResult};

impl Display for ContentEncoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl AsRef<str> for ContentEncoding {
    fn as_ref(&self) -> &'static str {
        self.as_str()
    }
}

impl ContentEncoding {
    /// Returns the conventional file extension for this encoding.
    #[inline]
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            ContentEncoding::Identity => "",
            #[cfg(feature = "brotli")]
            ContentEncoding::Brotli => ".br",
            ContentEncoding::Gzip => ".gz",
            #[cfg(feature = "zstd")]
            ContentEncoding::Zstd => ".zst",
        }
    }

    /// Returns the token used in the `Content-Encoding` header.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentEncoding::Identity => "identity",
            #[cfg(feature = "brotli")]
            ContentEncoding::Brotli => "br",
            ContentEncoding::Gzip => "gzip",
            #[cfg(feature = "zstd")]
            ContentEncoding::Zstd => "zstd",
        }
    }

    /// The value to send as `Content-Encoding`, or `None` for identity
    /// (which is never sent explicitly).
    #[inline]
    #[must_use]
    pub fn header_value(&self) -> Option<&'static str> {
        match self {
            ContentEncoding::Identity => None,
            other => Some(other.as_str()),
        }
    }
}
