//! Payload codec
//!
//! Raw DEFLATE at the best compression level. The stream carries no zlib or
//! gzip framing, so stored payloads are exactly what a DEFLATE decoder expects.

use std::io::{self, Write};

use flate2::write::DeflateEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};

use crate::error::{BlobError, Result};

/// Output grows in steps of this many bytes while inflating
pub const BUFFER_SIZE: usize = 32 * 1024;

/// Compress a payload
pub fn compress(src: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(
        Vec::with_capacity(src.len() / 2 + 16),
        Compression::best(),
    );
    encoder.write_all(src).map_err(BlobError::CodecFault)?;
    encoder.finish().map_err(BlobError::CodecFault)
}

/// Decompress a payload produced by [`compress`]
///
/// The stream must run to its final block. Truncated or corrupt input is a
/// [`BlobError::CodecFault`], never a silently shortened payload.
pub fn decompress(src: &[u8]) -> Result<Vec<u8>> {
    let mut inflater = Decompress::new(false);
    let mut out = Vec::with_capacity(src.len().saturating_mul(2).max(64));

    loop {
        if out.len() == out.capacity() {
            out.reserve(BUFFER_SIZE);
        }

        let before_in = inflater.total_in();
        let before_out = inflater.total_out();
        let input = &src[before_in as usize..];

        let status = inflater
            .decompress_vec(input, &mut out, FlushDecompress::Finish)
            .map_err(|e| BlobError::CodecFault(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        match status {
            Status::StreamEnd => return Ok(out),
            Status::Ok | Status::BufError => {
                let stalled =
                    inflater.total_in() == before_in && inflater.total_out() == before_out;
                // No progress with room to spare: the input ended mid-stream
                if stalled && out.len() < out.capacity() {
                    return Err(BlobError::CodecFault(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!(
                            "deflate stream truncated after {} of {} bytes",
                            before_in,
                            src.len()
                        ),
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stream_is_not_empty_bytes() {
        let packed = compress(b"").unwrap();
        assert!(!packed.is_empty());
        assert!(decompress(b"").is_err());
    }
}
