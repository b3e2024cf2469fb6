use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::info;
use std::io::{Read, Write};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct CompressedPayload {
    pub bytes: Vec<u8>,
    pub was_compressed: bool,
    pub original_len: usize,
    /// Length of the zlib stream, kept or not.
    pub compressed_len: usize,
}

pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut result = Vec::new();
    decoder.read_to_end(&mut result)?;
    Ok(result)
}

/// Compress `data` and keep the result only when it is strictly smaller.
pub fn compress_if_smaller(data: &[u8]) -> Result<CompressedPayload> {
    let compressed = compress(data)?;

    info!(
        "Original size: {} bytes, compressed size: {} bytes",
        data.len(),
        compressed.len()
    );

    let compressed_len = compressed.len();
    if compressed_len < data.len() {
        Ok(CompressedPayload {
            bytes: compressed,
            was_compressed: true,
            original_len: data.len(),
            compressed_len,
        })
    } else {
        Ok(CompressedPayload {
            bytes: data.to_vec(),
            was_compressed: false,
            original_len: data.len(),
            compressed_len,
        })
    }
}
