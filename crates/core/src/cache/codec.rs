//! Payload compression for stored content.
//!
//! Only stored payloads are compressed; callers always receive raw bytes.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::Error;

/// Compress a raw payload with zlib.
pub fn compress(payload: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(payload.len() / 2), Compression::default());
    encoder
        .write_all(payload)
        .map_err(|e| Error::Codec(format!("compress: {e}")))?;
    encoder.finish().map_err(|e| Error::Codec(format!("compress: {e}")))
}

/// Decompress a stored zlib payload.
pub fn decompress(stored: &[u8]) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(stored.len() * 4);
    ZlibDecoder::new(stored)
        .read_to_end(&mut out)
        .map_err(|e| Error::Codec(format!("decompress: {e}")))?;
    Ok(out)
}
