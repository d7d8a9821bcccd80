// Copyright (c) 2024-present, zipcache-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The codec interface: a uniform, allocation-free contract over
//! byte-oriented block compressors, plus the concrete backends that
//! implement it.

mod hardware;
mod none;
mod software;

pub use hardware::HardwareCodec;
pub use none::NoneCodec;
pub use software::SoftwareCodec;

/// Compression backend selector.
///
/// `None` is a pass-through used only for diagnostic comparisons against
/// the compressed backends and should not be selected in production.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Algorithm {
    /// Pass-through, no compression.
    None,
    /// Always-available software codec (LZ4 block format).
    Software,
    /// Optional accelerated backend; falls back to [`Algorithm::Software`]
    /// when unavailable.
    HardwareAccelerated,
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Software => "software",
            Self::HardwareAccelerated => "hardware-accelerated",
        })
    }
}

/// Errors a codec call can produce.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CodecError {
    /// The caller-supplied output buffer was too small to hold the result.
    OutputTooSmall,
    /// Decompression encountered a malformed frame.
    Corrupt,
    /// The backend could not be initialized (returned only by `init`).
    BackendUnavailable,
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for CodecError {}

/// A stateless, allocation-free block compressor/decompressor.
///
/// Implementations must never allocate the input or output buffers
/// themselves; callers own all memory involved in a call.
pub trait Codec: Send + Sync {
    /// The [`Algorithm`] this codec implements.
    fn algorithm(&self) -> Algorithm;

    /// Compress `src` into `dst`, returning the number of bytes written.
    fn compress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError>;

    /// Decompress `src` into `dst`, returning the number of bytes written.
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError>;

    /// Worst-case expansion for an input of length `src_len`.
    ///
    /// Implementations without a tighter bound may fall back to `src_len * 2`.
    fn bound(&self, src_len: usize) -> usize {
        src_len * 2
    }
}

/// Attempt to initialize the codec for `algorithm`.
///
/// Returns the backend together with the [`Algorithm`] that was actually
/// initialized: requesting [`Algorithm::HardwareAccelerated`] silently
/// substitutes [`Algorithm::Software`] when the hardware backend's `init`
/// reports [`CodecError::BackendUnavailable`]. Used when a tree is first
/// constructed, where a missing accelerator should never be a hard failure.
/// `level` is a codec-specific compression-level hint (`0` means "use the
/// codec's default") and is ignored by the codecs that have no such knob.
pub fn init_codec(algorithm: Algorithm, level: u32) -> (Box<dyn Codec>, Algorithm) {
    match algorithm {
        Algorithm::None => (Box::new(NoneCodec::new()), Algorithm::None),
        Algorithm::Software => (Box::new(SoftwareCodec::new()), Algorithm::Software),
        Algorithm::HardwareAccelerated => match HardwareCodec::init(level) {
            Some(codec) => (Box::new(codec), Algorithm::HardwareAccelerated),
            None => {
                log::warn!(
                    "hardware-accelerated codec unavailable, falling back to software codec"
                );
                (Box::new(SoftwareCodec::new()), Algorithm::Software)
            }
        },
    }
}

/// Attempt to initialize exactly `algorithm`, with no fallback.
///
/// Used by an explicit runtime codec switch, where substituting a
/// different backend than the one the caller asked for would be
/// surprising: the call should fail instead and leave the current codec
/// in place.
pub fn try_init_exact(algorithm: Algorithm, level: u32) -> Result<Box<dyn Codec>, CodecError> {
    match algorithm {
        Algorithm::None => Ok(Box::new(NoneCodec::new())),
        Algorithm::Software => Ok(Box::new(SoftwareCodec::new())),
        Algorithm::HardwareAccelerated => HardwareCodec::init(level)
            .map(|codec| Box::new(codec) as Box<dyn Codec>)
            .ok_or(CodecError::BackendUnavailable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn fallback_to_software_when_requested_explicitly() {
        let (codec, algo) = init_codec(Algorithm::Software, 0);
        assert_eq!(algo, Algorithm::Software);
        assert_eq!(codec.algorithm(), Algorithm::Software);
    }

    #[test]
    fn none_codec_is_diagnostic_passthrough() {
        let (codec, algo) = init_codec(Algorithm::None, 0);
        assert_eq!(algo, Algorithm::None);
        let src = b"hello world";
        let mut dst = [0u8; 32];
        let n = codec.compress(src, &mut dst).unwrap();
        assert_eq!(&dst[..n], src);
    }
}
