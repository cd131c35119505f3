//! HTTP `Content-Encoding` compression for published files.
//!
//! Object stores (and the CDNs in front of them) serve pre-compressed objects
//! verbatim as long as the object carries the right `Content-Encoding`
//! header. This crate wraps the compression libraries for the encodings that
//! browsers understand behind a single [`ContentEncoding`] enum, providing:
//!
//! - **Parsing** from configuration values ([`str::parse`])
//! - **In-memory** compression/decompression ([`ContentEncoding::compress`],
//!   [`ContentEncoding::decompress`])
//! - The **header token** and conventional file extension for each encoding
//!
//! Gzip is always available. Brotli and Zstd are behind feature flags.
//!
//! All compression uses the highest available level for each format; files
//! are compressed once at publish time and served many times.

mod construct;
pub mod error;
mod ops;
mod util;

/// A supported `Content-Encoding`.
///
/// Variants gated behind feature flags (`brotli`, `zstd`) are only available
/// when the corresponding feature is enabled. Defaults to
/// [`Identity`](Self::Identity) (uncompressed).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ContentEncoding {
    /// Uncompressed
    #[default]
    Identity,
    /// Brotli compression (`br`)
    #[cfg(feature = "brotli")]
    Brotli,
    /// Gzip compression (`gzip`)
    Gzip,
    /// Zstd compression (`zstd`)
    #[cfg(feature = "zstd")]
    Zstd,
}
