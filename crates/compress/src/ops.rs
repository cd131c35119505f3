//! Compression Operations

use crate::ContentEncoding;
use crate::error::{ErrorKind, Result};
#[cfg(feature = "brotli")]
use brotli::{CompressorWriter as BrotliEncoder, Decompressor as BrotliDecoder};
use exn::ResultExt;
use flate2::{Compression as GzCompression, read::GzDecoder, write::GzEncoder};
use std::io::{Read, Write};
use tracing::instrument;
#[cfg(feature = "zstd")]
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};

// Files are compressed once at publish time and then served many times, so
// always pay for the best ratio.
const GZIP_LEVEL: GzCompression = GzCompression::best();
#[cfg(feature = "zstd")]
const ZSTD_LEVEL: i32 = 19;
#[cfg(feature = "brotli")]
const BROTLI_LEVEL: u32 = 11;
#[cfg(feature = "brotli")]
const BROTLI_BUFFER_SIZE: usize = 4096;
#[cfg(feature = "brotli")]
const BROTLI_LG_WINDOW_SIZE: u32 = 22;

impl ContentEncoding {
    /// Compress a byte slice in memory.
    ///
    /// Output is deterministic for a given input (the gzip header carries no
    /// timestamp), so the content hash of a compressed file only changes when
    /// its source does.
    ///
    /// # Examples
    ///
    /// ```
    /// use shipr_compress::ContentEncoding;
    ///
    /// let data = b"body { color: red; } body { color: red; } body { color: red; }";
    /// let compressed = ContentEncoding::Gzip.compress(data).unwrap();
    /// assert!(compressed.len() < data.len());
    /// assert_eq!(compressed, ContentEncoding::Gzip.compress(data).unwrap());
    /// ```
    #[instrument(skip(input), fields(encoding = %self, input_size = input.len(), output_size))]
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        match self {
            ContentEncoding::Identity => output.extend_from_slice(input),
            #[cfg(feature = "brotli")]
            ContentEncoding::Brotli => {
                let mut encoder =
                    BrotliEncoder::new(&mut output, BROTLI_BUFFER_SIZE, BROTLI_LEVEL, BROTLI_LG_WINDOW_SIZE);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                // Brotli flushes the final block on drop.
                drop(encoder);
            },
            ContentEncoding::Gzip => {
                let mut encoder = GzEncoder::new(&mut output, GZIP_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
            #[cfg(feature = "zstd")]
            ContentEncoding::Zstd => {
                let mut encoder = ZstdEncoder::new(&mut output, ZSTD_LEVEL).or_raise(|| ErrorKind::Encoder)?;
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
        }
        tracing::Span::current().record("output_size", output.len());
        Ok(output)
    }

    /// Decompress a byte slice in memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use shipr_compress::ContentEncoding;
    ///
    /// let original = b"<!DOCTYPE html>";
    /// let compressed = ContentEncoding::Gzip.compress(original).unwrap();
    /// assert_eq!(ContentEncoding::Gzip.decompress(&compressed).unwrap(), original);
    /// ```
    #[instrument(skip(input), fields(encoding = %self, input_size = input.len(), output_size))]
    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        match self {
            ContentEncoding::Identity => output.extend_from_slice(input),
            #[cfg(feature = "brotli")]
            ContentEncoding::Brotli => {
                let mut decoder = BrotliDecoder::new(input, BROTLI_BUFFER_SIZE);
                decoder.read_to_end(&mut output).or_raise(|| ErrorKind::InvalidData)?;
            },
            ContentEncoding::Gzip => {
                let mut decoder = GzDecoder::new(input);
                decoder.read_to_end(&mut output).or_raise(|| ErrorKind::InvalidData)?;
            },
            #[cfg(feature = "zstd")]
            ContentEncoding::Zstd => {
                let mut decoder = ZstdDecoder::new(input).or_raise(|| ErrorKind::Encoder)?;
                decoder.read_to_end(&mut output).or_raise(|| ErrorKind::InvalidData)?;
            },
        }
        tracing::Span::current().record("output_size", output.len());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use crate::ContentEncoding;
    use rstest::rstest;

    #[rstest]
    #[case(ContentEncoding::Identity)]
    #[case(ContentEncoding::Gzip)]
    #[cfg_attr(feature = "brotli", case(ContentEncoding::Brotli))]
    #[cfg_attr(feature = "zstd", case(ContentEncoding::Zstd))]
    fn test_compress_decompress(#[case] encoding: ContentEncoding) {
        let original = b"Hello, world! This is a test of some compression.";
        let compressed = encoding.compress(original).unwrap();
        let decompressed = encoding.decompress(&compressed).unwrap();
        assert_eq!(decompressed, original);
    }

    #[rstest]
    #[case(ContentEncoding::Gzip)]
    #[cfg_attr(feature = "zstd", case(ContentEncoding::Zstd))]
    fn test_invalid_compressed_data(#[case] encoding: ContentEncoding) {
        let invalid_data = b"This is not compressed data";
        assert!(encoding.decompress(invalid_data).is_err());
    }

    #[test]
    fn test_gzip_is_deterministic() {
        let input = b"const a = 1; const b = 2; const c = 3;";
        let first = ContentEncoding::Gzip.compress(input).unwrap();
        let second = ContentEncoding::Gzip.compress(input).unwrap();
        assert_eq!(first, second);
        // Gzip magic bytes.
        assert_eq!(&first[..2], &[0x1F, 0x8B]);
    }

    #[test]
    fn test_empty_input() {
        let compressed = ContentEncoding::Gzip.compress(b"").unwrap();
        assert!(!compressed.is_empty());
        assert!(ContentEncoding::Gzip.decompress(&compressed).unwrap().is_empty());
    }
}
