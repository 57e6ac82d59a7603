//! Byte-buffer compressors used for WAL segment bodies once a segment is
//! rotated out of the write path (spec §4.3/§6).
//!
//! Grounded on the teacher's `compression/mod.rs` enum-of-algorithms
//! shape, but implemented with real ecosystem crates instead of
//! hand-rolled codecs — `flate2` for gzip/deflate (already a teacher
//! dependency) and `zstd`/`bzip2` (added; see DESIGN.md) for the
//! remaining two algorithms the spec names.

use crate::config::CompressionKind;
use crate::error::Result;
use std::io::{Read, Write};

/// Compresses `data` with `kind`. `CompressionKind::None` returns the
/// input unchanged.
pub fn compress(kind: CompressionKind, data: &[u8]) -> Result<Vec<u8>> {
    match kind {
        CompressionKind::None => Ok(data.to_vec()),
        CompressionKind::Gzip => {
            use flate2::write::GzEncoder;
            use flate2::Compression;
            let mut enc = GzEncoder::new(Vec::new(), Compression::default());
            enc.write_all(data)?;
            enc.finish().map_err(|e| e.into())
        }
        CompressionKind::Flate => {
            use flate2::write::DeflateEncoder;
            use flate2::Compression;
            let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
            enc.write_all(data)?;
            enc.finish().map_err(|e| e.into())
        }
        CompressionKind::Zstd => {
            zstd::stream::encode_all(data, 0).map_err(|e| e.into())
        }
        CompressionKind::Bzip2 => {
            use bzip2::write::BzEncoder;
            use bzip2::Compression;
            let mut enc = BzEncoder::new(Vec::new(), Compression::default());
            enc.write_all(data)?;
            enc.finish().map_err(|e| e.into())
        }
    }
}

/// Decompresses `data` that was compressed with `kind`.
pub fn decompress(kind: CompressionKind, data: &[u8]) -> Result<Vec<u8>> {
    match kind {
        CompressionKind::None => Ok(data.to_vec()),
        CompressionKind::Gzip => {
            use flate2::read::GzDecoder;
            let mut dec = GzDecoder::new(data);
            let mut out = Vec::new();
            dec.read_to_end(&mut out)?;
            Ok(out)
        }
        CompressionKind::Flate => {
            use flate2::read::DeflateDecoder;
            let mut dec = DeflateDecoder::new(data);
            let mut out = Vec::new();
            dec.read_to_end(&mut out)?;
            Ok(out)
        }
        CompressionKind::Zstd => {
            zstd::stream::decode_all(data).map_err(|e| e.into())
        }
        CompressionKind::Bzip2 => {
            use bzip2::read::BzDecoder;
            let mut dec = BzDecoder::new(data);
            let mut out = Vec::new();
            dec.read_to_end(&mut out)?;
            Ok(out)
        }
    }
}
