// Copyright (c) 2024-present, zipcache-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::codec::Algorithm;

/// Leaf layout selector. `HashedCompressed` is the only layout today;
/// the variant is reserved for future leaf shapes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DefaultLayout {
    /// The hashed, sub-paged compressed leaf of §4.2.
    HashedCompressed,
}

/// Tuning surface for [`crate::CompressedBTree`].
///
/// This is the single tuning point of the engine: there is no environment
/// input and no persisted configuration file, so every knob a caller can
/// reach lives here.
#[derive(Clone, Debug)]
pub struct Config {
    /// Leaf layout to use. Reserved for future leaf shapes.
    pub default_layout: DefaultLayout,

    /// Compression backend to initialize with.
    pub algo: Algorithm,

    /// Number of hash partitions per leaf. Typical values: 4, 8, 16.
    pub default_sub_pages: usize,

    /// Directory slots per sub-page.
    pub slot_count: usize,

    /// Codec-specific compression-level hint. `0` means "use the codec's
    /// default".
    pub compression_level: u32,

    /// Write-buffer capacity in entries (lazy mode only).
    pub buffer_size: usize,

    /// Entry count at which the write buffer is drained into sub-pages.
    /// Must be `< buffer_size`.
    pub flush_threshold: usize,

    /// Whether to defer compression through a per-leaf write buffer
    /// rather than recompressing eagerly on every put.
    pub enable_lazy_compression: bool,
}

impl Config {
    /// Sets the compression algorithm.
    #[must_use]
    pub fn algorithm(mut self, algo: Algorithm) -> Self {
        self.algo = algo;
        self
    }

    /// Sets the number of hash partitions per leaf.
    ///
    /// # Panics
    ///
    /// Panics if `sub_pages` is zero.
    #[must_use]
    pub fn sub_pages(mut self, sub_pages: usize) -> Self {
        assert!(sub_pages > 0, "sub_pages must be > 0");
        self.default_sub_pages = sub_pages;
        self
    }

    /// Sets the directory slot count per sub-page.
    ///
    /// # Panics
    ///
    /// Panics if `slot_count` is zero.
    #[must_use]
    pub fn slot_count(mut self, slot_count: usize) -> Self {
        assert!(slot_count > 0, "slot_count must be > 0");
        self.slot_count = slot_count;
        self
    }

    /// Sets the write-buffer capacity, in entries.
    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Sets the flush threshold.
    ///
    /// # Panics
    ///
    /// Panics if `flush_threshold >= buffer_size`.
    #[must_use]
    pub fn flush_threshold(mut self, flush_threshold: usize) -> Self {
        assert!(
            flush_threshold < self.buffer_size,
            "flush_threshold must be < buffer_size"
        );
        self.flush_threshold = flush_threshold;
        self
    }

    /// Enables or disables lazy (write-buffered) compression.
    #[must_use]
    pub fn lazy_compression(mut self, enabled: bool) -> Self {
        self.enable_lazy_compression = enabled;
        self
    }

    /// Sets the codec-specific compression-level hint. `0` means "use the
    /// codec's default".
    #[must_use]
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        create_default_config(Algorithm::Software)
    }
}

/// Returns the documented default configuration: hashed layout,
/// 16 sub-pages, an 8-slot directory per sub-page, a 512-entry write
/// buffer, a flush threshold of 10, and lazy compression off.
#[must_use]
pub fn create_default_config(algo: Algorithm) -> Config {
    Config {
        default_layout: DefaultLayout::HashedCompressed,
        algo,
        default_sub_pages: 16,
        slot_count: 8,
        compression_level: 0,
        buffer_size: 512,
        flush_threshold: 10,
        enable_lazy_compression: false,
    }
}
