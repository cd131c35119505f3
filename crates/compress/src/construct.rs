use crate::ContentEncoding;
use crate::error::{Error, ErrorKind};
use std::str::FromStr;

impl FromStr for ContentEncoding {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "identity" | "none" => Ok(ContentEncoding::Identity),
            #[cfg(feature = "brotli")]
            "br" | "brotli" => Ok(ContentEncoding::Brotli),
            #[cfg(not(feature = "brotli"))]
            "br" | "brotli" => exn::bail!(ErrorKind::DisabledEncoding(s.to_string())),
            "gz" | "gzip" => Ok(ContentEncoding::Gzip),
            #[cfg(feature = "zstd")]
            "zst" | "zstd" => Ok(ContentEncoding::Zstd),
            #[cfg(not(feature = "zstd"))]
            "zst" | "zstd" => exn::bail!(ErrorKind::DisabledEncoding(s.to_string())),
            _ => exn::bail!(ErrorKind::UnsupportedEncoding(s.to_string())),
        }
    }
}
