// src/compression/mod.rs
//! Stream decompression for source artifacts
//!
//! Upstream tarballs arrive compressed with gzip, bzip2, xz or zstd, and a
//! few projects ship single compressed files without a tar layer. This module
//! names those formats, detects them from a file name or from magic bytes,
//! and hands back a boxed decoder over any reader.

use std::io::{self, Read};
use thiserror::Error;

/// Compression-related errors
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Failed to create {format} decoder: {source}")]
    DecoderCreation {
        format: &'static str,
        source: io::Error,
    },

    #[error("Failed to decompress {format} data: {source}")]
    Decompression {
        format: &'static str,
        source: io::Error,
    },
}

/// Supported compression formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// No compression (raw data)
    None,
    /// Gzip compression (.gz, .tgz)
    Gzip,
    /// Bzip2 compression (.bz2, .tbz2, .tbz)
    Bzip2,
    /// XZ/LZMA compression (.xz, .txz)
    Xz,
    /// Zstandard compression (.zst, .tzst)
    Zstd,
}

/// File name suffixes and the format they imply, longest first
const SUFFIXES: &[(&str, CompressionFormat)] = &[
    (".tzst", CompressionFormat::Zstd),
    (".zstd", CompressionFormat::Zstd),
    (".tbz2", CompressionFormat::Bzip2),
    (".bz2", CompressionFormat::Bzip2),
    (".tbz", CompressionFormat::Bzip2),
    (".tgz", CompressionFormat::Gzip),
    (".txz", CompressionFormat::Xz),
    (".zst", CompressionFormat::Zstd),
    (".gz", CompressionFormat::Gzip),
    (".xz", CompressionFormat::Xz),
];

impl CompressionFormat {
    /// Detect compression format from a file name
    ///
    /// Matching is case-insensitive and only looks at the final suffix, so
    /// `foo-1.0.tar.gz` and `foo-1.0.tgz` are both gzip.
    ///
    /// # Examples
    /// ```
    /// use setpm::compression::CompressionFormat;
    ///
    /// assert_eq!(CompressionFormat::from_extension("foo-1.0.tar.bz2"), CompressionFormat::Bzip2);
    /// assert_eq!(CompressionFormat::from_extension("foo-1.0.txz"), CompressionFormat::Xz);
    /// assert_eq!(CompressionFormat::from_extension("foo-1.0.tar"), CompressionFormat::None);
    /// ```
    pub fn from_extension(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        SUFFIXES
            .iter()
            .find(|(suffix, _)| lower.ends_with(suffix))
            .map(|(_, format)| *format)
            .unwrap_or(Self::None)
    }

    /// Detect compression format from magic bytes
    ///
    /// Magic bytes:
    /// - Gzip: `1f 8b`
    /// - Bzip2: `42 5a 68` ("BZh")
    /// - XZ: `fd 37 7a 58 5a 00` (FD + "7zXZ" + NUL)
    /// - Zstd: `28 b5 2f fd`
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.starts_with(&[0x1f, 0x8b]) {
            Self::Gzip
        } else if data.starts_with(b"BZh") {
            Self::Bzip2
        } else if data.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
            Self::Xz
        } else if data.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Self::Zstd
        } else {
            Self::None
        }
    }

    /// Get a human-readable name for this format
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }
}

impl std::fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Name of the file a bare compressed file decompresses to
///
/// Strips a single compression suffix (`notes.txt.gz` -> `notes.txt`). The
/// tar shorthands (`.tgz`, `.txz`, ...) become `.tar`. Returns `None` when
/// the name carries no compression suffix or nothing would remain.
pub fn decompressed_name(name: &str) -> Option<String> {
    let lower = name.to_ascii_lowercase();
    let (suffix, _) = SUFFIXES.iter().find(|(suffix, _)| lower.ends_with(suffix))?;
    let stem = &name[..name.len() - suffix.len()];
    if stem.is_empty() {
        return None;
    }
    if matches!(*suffix, ".tgz" | ".tbz2" | ".tbz" | ".txz" | ".tzst") {
        Some(format!("{}.tar", stem))
    } else {
        Some(stem.to_string())
    }
}

/// Create a decompressing reader for the given format
///
/// For `CompressionFormat::None`, returns the reader unchanged.
pub fn create_decoder<'a, R: Read + 'a>(
    reader: R,
    format: CompressionFormat,
) -> Result<Box<dyn Read + 'a>, CompressionError> {
    match format {
        CompressionFormat::None => Ok(Box::new(reader)),
        CompressionFormat::Gzip => Ok(Box::new(flate2::read::GzDecoder::new(reader))),
        CompressionFormat::Bzip2 => Ok(Box::new(bzip2::read::BzDecoder::new(reader))),
        CompressionFormat::Xz => Ok(Box::new(xz2::read::XzDecoder::new(reader))),
        CompressionFormat::Zstd => {
            let decoder = zstd::Decoder::new(reader).map_err(|e| CompressionError::DecoderCreation {
                format: "zstd",
                source: e,
            })?;
            Ok(Box::new(decoder))
        }
    }
}

/// Decompress everything from `reader` into `writer`
///
/// Returns the number of decompressed bytes written.
pub fn decompress_to<R: Read, W: io::Write>(
    reader: R,
    format: CompressionFormat,
    writer: &mut W,
) -> Result<u64, CompressionError> {
    let mut decoder = create_decoder(reader, format)?;
    io::copy(&mut decoder, writer).map_err(|e| CompressionError::Decompression {
        format: format.name(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(CompressionFormat::from_extension("foo.tar.gz"), CompressionFormat::Gzip);
        assert_eq!(CompressionFormat::from_extension("foo.TGZ"), CompressionFormat::Gzip);
        assert_eq!(CompressionFormat::from_extension("foo.tar.bz2"), CompressionFormat::Bzip2);
        assert_eq!(CompressionFormat::from_extension("foo.tbz"), CompressionFormat::Bzip2);
        assert_eq!(CompressionFormat::from_extension("foo.tar.xz"), CompressionFormat::Xz);
        assert_eq!(CompressionFormat::from_extension("foo.tar.zst"), CompressionFormat::Zstd);
        assert_eq!(CompressionFormat::from_extension("foo.tzst"), CompressionFormat::Zstd);
        assert_eq!(CompressionFormat::from_extension("foo.tar"), CompressionFormat::None);
        assert_eq!(CompressionFormat::from_extension("foo.zip"), CompressionFormat::None);
    }

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            CompressionFormat::from_magic_bytes(&[0x1f, 0x8b, 0x08, 0x00]),
            CompressionFormat::Gzip
        );
        assert_eq!(
            CompressionFormat::from_magic_bytes(b"BZh91AY&SY"),
            CompressionFormat::Bzip2
        );
        assert_eq!(
            CompressionFormat::from_magic_bytes(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]),
            CompressionFormat::Xz
        );
        assert_eq!(
            CompressionFormat::from_magic_bytes(&[0x28, 0xb5, 0x2f, 0xfd]),
            CompressionFormat::Zstd
        );
        assert_eq!(
            CompressionFormat::from_magic_bytes(b"PK\x03\x04"),
            CompressionFormat::None
        );
        // Too short for any magic
        assert_eq!(CompressionFormat::from_magic_bytes(&[0x1f]), CompressionFormat::None);
    }

    #[test]
    fn test_decompressed_name() {
        assert_eq!(decompressed_name("notes.txt.gz").as_deref(), Some("notes.txt"));
        assert_eq!(decompressed_name("tool.XZ").as_deref(), Some("tool"));
        assert_eq!(decompressed_name("foo-1.0.tgz").as_deref(), Some("foo-1.0.tar"));
        assert_eq!(decompressed_name("foo-1.0.tbz2").as_deref(), Some("foo-1.0.tar"));
        assert_eq!(decompressed_name("foo-1.0.txz").as_deref(), Some("foo-1.0.tar"));
        assert_eq!(decompressed_name("foo.tar"), None);
        assert_eq!(decompressed_name(".gz"), None);
    }

    #[test]
    fn test_decompress_gzip() {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"hello").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut out = Vec::new();
        let written = decompress_to(compressed.as_slice(), CompressionFormat::Gzip, &mut out).unwrap();
        assert_eq!(written, 5);
        assert_eq!(out, b"hello");
    }

    #[test]
    fn test_decompress_bzip2() {
        let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(b"hello bzip2").unwrap();
        let compressed = encoder.finish().unwrap();
        assert_eq!(
            CompressionFormat::from_magic_bytes(&compressed),
            CompressionFormat::Bzip2
        );

        let mut out = Vec::new();
        decompress_to(compressed.as_slice(), CompressionFormat::Bzip2, &mut out).unwrap();
        assert_eq!(out, b"hello bzip2");
    }

    #[test]
    fn test_decompress_corrupt() {
        let garbage: &[u8] = &[0x1f, 0x8b, 0x08, 0x00, 0xde, 0xad];
        let mut out = Vec::new();
        let err = decompress_to(garbage, CompressionFormat::Gzip, &mut out).unwrap_err();
        assert!(matches!(err, CompressionError::Decompression { format: "gzip", .. }));
    }
}
