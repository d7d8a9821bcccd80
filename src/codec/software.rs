// Copyright (c) 2024-present, zipcache-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{Algorithm, Codec, CodecError};

/// The always-available software codec, backed by LZ4's block format.
///
/// Frames are self-delimiting only in the sense that `lz4_flex` knows how
/// to decode what it encoded; the tree is responsible for remembering the
/// original (uncompressed) length, since LZ4 block compression does not
/// prepend it.
#[derive(Debug, Default)]
pub struct SoftwareCodec;

impl SoftwareCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for SoftwareCodec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Software
    }

    fn compress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        lz4_flex::block::compress_into(src, dst).map_err(|err| match err {
            lz4_flex::block::CompressError::OutputTooSmall { .. } => CodecError::OutputTooSmall,
        })
    }

    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        lz4_flex::block::decompress_into(src, dst).map_err(|err| match err {
            lz4_flex::block::DecompressError::OutputTooSmall { .. } => CodecError::OutputTooSmall,
            _ => CodecError::Corrupt,
        })
    }

    fn bound(&self, src_len: usize) -> usize {
        lz4_flex::block::get_maximum_output_size(src_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn round_trips_arbitrary_bytes() {
        let codec = SoftwareCodec::new();
        let src = b"the quick brown fox jumps over the lazy dog, repeated, repeated, repeated";
        let mut compressed = vec![0u8; codec.bound(src.len())];
        let written = codec.compress(src, &mut compressed).unwrap();
        compressed.truncate(written);

        let mut decompressed = vec![0u8; src.len()];
        let n = codec.decompress(&compressed, &mut decompressed).unwrap();
        assert_eq!(&decompressed[..n], src);
    }

    #[test]
    fn undersized_output_buffer_is_reported() {
        let codec = SoftwareCodec::new();
        let src = vec![7u8; 256];
        let mut dst = vec![0u8; 4];
        assert_eq!(codec.compress(&src, &mut dst), Err(CodecError::OutputTooSmall));
    }
}
