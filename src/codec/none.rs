// Copyright (c) 2024-present, zipcache-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{Algorithm, Codec, CodecError};

/// Pass-through codec used only for diagnostic comparisons against the
/// compressed backends. Not recommended in production.
#[derive(Debug, Default)]
pub struct NoneCodec;

impl NoneCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for NoneCodec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::None
    }

    fn compress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        if dst.len() < src.len() {
            return Err(CodecError::OutputTooSmall);
        }
        dst[..src.len()].copy_from_slice(src);
        Ok(src.len())
    }

    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        self.compress(src, dst)
    }

    fn bound(&self, src_len: usize) -> usize {
        src_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn copies_bytes_verbatim() {
        let codec = NoneCodec::new();
        let src = b"exactly the same bytes back out";
        let mut dst = vec![0u8; codec.bound(src.len())];
        let n = codec.compress(src, &mut dst).unwrap();
        assert_eq!(&dst[..n], src);

        let mut roundtrip = vec![0u8; src.len()];
        let n = codec.decompress(&dst[..n], &mut roundtrip).unwrap();
        assert_eq!(&roundtrip[..n], src);
    }

    #[test]
    fn undersized_output_buffer_is_reported() {
        let codec = NoneCodec::new();
        let mut dst = [0u8; 2];
        assert_eq!(
            codec.compress(b"too long", &mut dst),
            Err(CodecError::OutputTooSmall)
        );
    }
}
