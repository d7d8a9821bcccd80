// Copyright (c) 2024-present, zipcache-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{Algorithm, Codec, CodecError};

/// The optional accelerated codec backend.
///
/// Behind the `hw-codec` feature this is backed by `zstd`'s bulk API,
/// standing in for a hardware-offloaded compressor; `init` probes
/// availability the same way a real accelerator driver would, and returns
/// `None` when the feature was not compiled in so callers fall back to
/// [`super::SoftwareCodec`] without any change in observable behavior.
#[derive(Debug)]
pub struct HardwareCodec {
    #[cfg(feature = "hw-codec")]
    level: i32,
}

impl HardwareCodec {
    /// Probe for backend availability. Mirrors the "BackendUnavailable"
    /// path: `init` never panics, it just reports absence. `level` is the
    /// configured compression-level hint; `0` maps to the backend's own
    /// default.
    pub fn init(level: u32) -> Option<Self> {
        #[cfg(feature = "hw-codec")]
        {
            let level = if level == 0 { 3 } else { level as i32 };
            Some(Self { level })
        }

        #[cfg(not(feature = "hw-codec"))]
        {
            let _ = level;
            None
        }
    }
}

impl Codec for HardwareCodec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::HardwareAccelerated
    }

    #[cfg(feature = "hw-codec")]
    fn compress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        zstd::bulk::compress_to_buffer(src, dst, self.level).map_err(|_| CodecError::OutputTooSmall)
    }

    #[cfg(not(feature = "hw-codec"))]
    fn compress(&self, _src: &[u8], _dst: &mut [u8]) -> Result<usize, CodecError> {
        Err(CodecError::BackendUnavailable)
    }

    #[cfg(feature = "hw-codec")]
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        zstd::bulk::decompress_to_buffer(src, dst).map_err(|_| CodecError::Corrupt)
    }

    #[cfg(not(feature = "hw-codec"))]
    fn decompress(&self, _src: &[u8], _dst: &mut [u8]) -> Result<usize, CodecError> {
        Err(CodecError::BackendUnavailable)
    }

    #[cfg(feature = "hw-codec")]
    fn bound(&self, src_len: usize) -> usize {
        zstd::zstd_safe::compress_bound(src_len)
    }
}

#[cfg(all(test, feature = "hw-codec"))]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn round_trips_arbitrary_bytes() {
        let codec = HardwareCodec::init(0).expect("hw-codec feature enabled");
        let src = b"some payload to be accelerated, accelerated, accelerated";
        let mut compressed = vec![0u8; codec.bound(src.len())];
        let written = codec.compress(src, &mut compressed).unwrap();
        compressed.truncate(written);

        let mut decompressed = vec![0u8; src.len()];
        let n = codec.decompress(&compressed, &mut decompressed).unwrap();
        assert_eq!(&decompressed[..n], src);
    }
}
