// Copyright (c) 2024-present, zipcache-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::Relaxed;

/// Per-tree counters, the only shared state besides the tree's
/// `RwLock` itself.
#[derive(Debug, Default)]
pub(crate) struct Metrics {
    /// Number of compress/decompress calls served by the LZ4 software
    /// codec.
    lz4_ops: AtomicUsize,

    /// Number of compress/decompress calls served by the accelerated
    /// codec.
    qpl_ops: AtomicUsize,

    /// Running total of uncompressed sub-page bytes, as of the last
    /// recompression of each sub-page still live.
    total_uncompressed: AtomicUsize,

    /// Running total of compressed sub-page bytes.
    total_compressed: AtomicUsize,

    /// Number of `get`s that hit a codec failure and fell back to the
    /// absent sentinel.
    codec_failures: AtomicUsize,
}

impl Metrics {
    pub(crate) fn record_op(&self, algo: crate::Algorithm) {
        match algo {
            crate::Algorithm::HardwareAccelerated => {
                self.qpl_ops.fetch_add(1, Relaxed);
            }
            crate::Algorithm::Software | crate::Algorithm::None => {
                self.lz4_ops.fetch_add(1, Relaxed);
            }
        }
    }

    pub(crate) fn record_codec_failure(&self) {
        self.codec_failures.fetch_add(1, Relaxed);
    }

    pub(crate) fn codec_failures(&self) -> usize {
        self.codec_failures.load(Relaxed)
    }

    /// Overwrite the accounted byte totals to match the current state of
    /// the tree (called after operations that change leaf byte counts).
    pub(crate) fn set_byte_totals(&self, uncompressed: usize, compressed: usize) {
        self.total_uncompressed.store(uncompressed, Relaxed);
        self.total_compressed.store(compressed, Relaxed);
    }

    pub(crate) fn byte_totals(&self) -> (usize, usize) {
        (
            self.total_uncompressed.load(Relaxed),
            self.total_compressed.load(Relaxed),
        )
    }

    pub(crate) fn algorithm_ops(&self) -> (usize, usize) {
        (self.lz4_ops.load(Relaxed), self.qpl_ops.load(Relaxed))
    }
}

/// Per-codec operation counts, as returned by
/// [`crate::CompressedBTree::get_algorithm_stats`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct AlgorithmStats {
    /// Operations served by the software (LZ4) codec.
    pub software_ops: usize,
    /// Operations served by the accelerated codec.
    pub hardware_ops: usize,
}
