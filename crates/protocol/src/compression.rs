//! Compression layer for protocol frames
//!
//! Frames use zlib once the server has sent Set Compression.

use basalt_core::{BasaltError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Compress data with zlib
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| BasaltError::Compression(e.to_string()))?;
    encoder.finish().map_err(|e| BasaltError::Compression(e.to_string()))
}

/// Decompress a zlib stream that must inflate to exactly `expected_len` bytes
///
/// Reads at most one byte past `expected_len` so a lying length field cannot
/// make us inflate an unbounded stream.
pub fn decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::with_capacity(expected_len);
    decoder
        .take(expected_len as u64 + 1)
        .read_to_end(&mut decompressed)
        .map_err(|e| BasaltError::FrameCorrupt(format!("Bad zlib stream: {}", e)))?;

    if decompressed.len() != expected_len {
        return Err(BasaltError::FrameCorrupt(format!(
            "Decompressed length {} does not match declared {}",
            decompressed.len(),
            expected_len
        )));
    }
    Ok(decompressed)
}
