//! Compression codec abstraction, per `spec.md` §4.6's four-method interface.
//!
//! The archive stores a codec choice per member, so mixed-algorithm
//! archives are legal — an archive may hold one `zlib` member next to one
//! stored uncompressed.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::member::CompressionAlgorithm;

/// Pluggable compression backend. The archive itself never depends on a
/// concrete codec; it only asks one for these four operations.
pub trait CompressionCodec {
    /// Which [`CompressionAlgorithm`] this codec implements.
    fn algorithm_id(&self) -> CompressionAlgorithm;
    /// Compress `data` at the given level (`0`–`9`; codecs that don't
    /// support levels may ignore it).
    fn compress(&self, data: &[u8], level: u8) -> Result<Vec<u8>>;
    /// Decompress `data`, which is known to expand to exactly `expected_size`
    /// bytes.
    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>>;
    /// Upper bound on the compressed size of `input_size` bytes of input,
    /// used to size scratch buffers.
    fn max_compressed_size(&self, input_size: usize) -> usize;
}

/// Identity codec: stores member payloads unmodified.
pub struct NoneCodec;

impl CompressionCodec for NoneCodec {
    fn algorithm_id(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::None
    }

    fn compress(&self, data: &[u8], _level: u8) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], _expected_size: usize) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn max_compressed_size(&self, input_size: usize) -> usize {
        input_size
    }
}

/// ZLIB codec backed by `flate2`.
pub struct ZlibCodec;

impl CompressionCodec for ZlibCodec {
    fn algorithm_id(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Zlib
    }

    fn compress(&self, data: &[u8], level: u8) -> Result<Vec<u8>> {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(u32::from(level.min(9))));
        encoder.write_all(data).map_err(|e| compression_failed("zlib", e))?;
        encoder.finish().map_err(|e| compression_failed("zlib", e))
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        use flate2::read::ZlibDecoder;

        let mut decoder = ZlibDecoder::new(data);
        let mut out = Vec::with_capacity(expected_size);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| decompression_failed("zlib", e))?;
        Ok(out)
    }

    fn max_compressed_size(&self, input_size: usize) -> usize {
        input_size + input_size / 1000 + 128
    }
}

/// LZ4 codec backed by `lz4_flex` (pure Rust, block format).
pub struct Lz4Codec;

impl CompressionCodec for Lz4Codec {
    fn algorithm_id(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Lz4
    }

    fn compress(&self, data: &[u8], _level: u8) -> Result<Vec<u8>> {
        Ok(lz4_flex::compress_prepend_size(data))
    }

    fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
        let out = lz4_flex::decompress_size_prepended(data)
            .map_err(|e| decompression_failed("lz4", e))?;
        if out.len() != expected_size {
            return Err(Error::DecompressionFailed {
                member: String::new(),
                algorithm: "lz4".into(),
                reason: format!("expected {expected_size} bytes, got {}", out.len()),
            });
        }
        Ok(out)
    }

    fn max_compressed_size(&self, input_size: usize) -> usize {
        lz4_flex::block::get_maximum_output_size(input_size) + 4
    }
}

/// LZMA is a recognized [`CompressionAlgorithm`] — archives that declare it
/// decode and list correctly — but no codec ships for it.
pub struct LzmaCodec;

impl CompressionCodec for LzmaCodec {
    fn algorithm_id(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Lzma
    }

    fn compress(&self, _data: &[u8], _level: u8) -> Result<Vec<u8>> {
        Err(Error::UnsupportedAlgorithm("lzma".into()))
    }

    fn decompress(&self, _data: &[u8], _expected_size: usize) -> Result<Vec<u8>> {
        Err(Error::UnsupportedAlgorithm("lzma".into()))
    }

    fn max_compressed_size(&self, input_size: usize) -> usize {
        input_size * 2 + 128
    }
}

/// Look up the codec for a stored [`CompressionAlgorithm`].
pub fn codec_for(algorithm: CompressionAlgorithm) -> Box<dyn CompressionCodec> {
    match algorithm {
        CompressionAlgorithm::None => Box::new(NoneCodec),
        CompressionAlgorithm::Lz4 => Box::new(Lz4Codec),
        CompressionAlgorithm::Zlib => Box::new(ZlibCodec),
        CompressionAlgorithm::Lzma => Box::new(LzmaCodec),
    }
}

fn compression_failed(algorithm: &str, e: std::io::Error) -> Error {
    Error::CompressionFailed {
        member: String::new(),
        algorithm: algorithm.into(),
        reason: e.to_string(),
    }
}

fn decompression_failed(algorithm: &str, e: impl std::fmt::Display) -> Error {
    Error::DecompressionFailed {
        member: String::new(),
        algorithm: algorithm.into(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_codec_is_identity() {
        let data = b"hello world".to_vec();
        let codec = NoneCodec;
        let compressed = codec.compress(&data, 0).unwrap();
        assert_eq!(compressed, data);
        assert_eq!(codec.decompress(&compressed, data.len()).unwrap(), data);
    }

    #[test]
    fn zlib_round_trips() {
        let data = vec![0x42u8; 4096];
        let codec = ZlibCodec;
        let compressed = codec.compress(&data, 6).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(codec.decompress(&compressed, data.len()).unwrap(), data);
    }

    #[test]
    fn lz4_round_trips() {
        let data = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_vec();
        let codec = Lz4Codec;
        let compressed = codec.compress(&data, 0).unwrap();
        assert_eq!(codec.decompress(&compressed, data.len()).unwrap(), data);
    }

    #[test]
    fn lzma_is_unsupported() {
        let codec = LzmaCodec;
        assert!(codec.compress(b"x", 0).is_err());
        assert!(codec.decompress(b"x", 1).is_err());
    }
}
