// Copyright (c) 2024-present, zipcache-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The compressed DRAM-tier B+Tree: an ordered `i64 -> i64` map whose leaf
//! pages compress their payload transparently.

use std::sync::RwLock;

use crate::codec::{init_codec, try_init_exact, Algorithm, Codec, CodecError};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::leaf::{CompressedLeaf, LeafConfig, ABSENT};
use crate::metrics::{AlgorithmStats, Metrics};
use crate::tree::BaseTree;

/// Byte accounting for a tree's current compressed state.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct Stats {
    /// Sum of each live sub-page's uncompressed size.
    pub uncompressed: usize,
    /// Sum of each live sub-page's compressed size.
    pub compressed: usize,
}

impl Stats {
    /// Ratio of uncompressed to compressed bytes. `1.0` when the tree is
    /// empty or the codec is a pass-through.
    #[must_use]
    pub fn compression_ratio(&self) -> f64 {
        if self.compressed == 0 {
            1.0
        } else {
            self.uncompressed as f64 / self.compressed as f64
        }
    }
}

struct Inner {
    base: BaseTree<CompressedLeaf>,
    codec: Box<dyn Codec>,
    algorithm: Algorithm,
    leaf_config: LeafConfig,
    compression_level: u32,
}

/// A compressed, hash-partitioned B+Tree mapping `i64` keys to `i64`
/// values.
///
/// A single [`std::sync::RwLock`] guards the whole tree: `get`, `empty`,
/// `size`, `stats`, `get_algorithm`, `get_algorithm_stats` and `dump` take
/// a shared lock; `put`, `delete` and `set_algorithm` take the exclusive
/// lock. There is no finer-grained (per-leaf) locking, and no lock-free
/// fast path.
pub struct CompressedBTree {
    inner: RwLock<Inner>,
    metrics: Metrics,
}

impl CompressedBTree {
    /// Builds a tree with the given branching `order` and per-leaf
    /// `capacity` (the number of entries a leaf holds before it splits).
    ///
    /// If `config.algo` requests [`Algorithm::HardwareAccelerated`] and no
    /// accelerated backend is available, the tree silently falls back to
    /// the software codec; query [`Self::get_algorithm`] afterwards to
    /// observe which one actually won.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `order < 2` or `capacity == 0`.
    pub fn init(order: usize, capacity: usize, config: Config) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidArgument("capacity must be > 0"));
        }
        let (codec, algorithm) = init_codec(config.algo, config.compression_level);
        let leaf_config = LeafConfig {
            sub_page_count: config.default_sub_pages,
            slot_count: config.slot_count,
            capacity,
            lazy: config.enable_lazy_compression,
            buffer_size: config.buffer_size,
            flush_threshold: config.flush_threshold,
        };
        let root_leaf = CompressedLeaf::new(leaf_config, codec.as_ref())?;
        let base = BaseTree::new(order, root_leaf)?;
        Ok(Self {
            inner: RwLock::new(Inner {
                base,
                codec,
                algorithm,
                leaf_config,
                compression_level: config.compression_level,
            }),
            metrics: Metrics::default(),
        })
    }

    /// Releases the tree. Consuming `self` gives the same "no use after
    /// deinit" guarantee the operation table asks for, enforced at compile
    /// time rather than at runtime.
    pub fn deinit(self) {}

    /// Looks up `key`. Returns [`ABSENT`] if the key is missing or if the
    /// lookup's decompression fails; a codec failure is counted but never
    /// propagated to the caller.
    #[must_use]
    pub fn get(&self, key: i64) -> i64 {
        let inner = self.inner.read().expect("lock is poisoned");
        match inner.base.get(key, inner.codec.as_ref()) {
            Ok(Some(value)) => value,
            Ok(None) => ABSENT,
            Err(_) => {
                self.metrics.record_codec_failure();
                ABSENT
            }
        }
    }

    /// Inserts or overwrites `key` with `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CodecFailure`] if compression fails (the tree is
    /// left unmodified) or [`Error::OutOfMemory`] if node allocation fails.
    pub fn put(&self, key: i64, value: i64) -> Result<()> {
        let mut inner = self.inner.write().expect("lock is poisoned");
        let algorithm = inner.algorithm;
        inner.base.put(key, value, inner.codec.as_ref())?;
        self.metrics.record_op(algorithm);
        Ok(())
    }

    /// Removes `key`. Returns `true` if it was present.
    #[must_use]
    pub fn delete(&self, key: i64) -> bool {
        let mut inner = self.inner.write().expect("lock is poisoned");
        inner.base.delete(key, inner.codec.as_ref()).unwrap_or(false)
    }

    /// Returns `true` if the tree holds no entries.
    #[must_use]
    pub fn empty(&self) -> bool {
        let inner = self.inner.read().expect("lock is poisoned");
        inner.base.is_empty()
    }

    /// Returns the number of live entries.
    #[must_use]
    pub fn size(&self) -> usize {
        let inner = self.inner.read().expect("lock is poisoned");
        inner.base.len()
    }

    /// Computes current uncompressed/compressed byte totals across every
    /// live leaf.
    #[must_use]
    pub fn stats(&self) -> Stats {
        let inner = self.inner.read().expect("lock is poisoned");
        let mut uncompressed = 0;
        let mut compressed = 0;
        inner.base.for_each_leaf(|leaf| {
            let (u, c) = leaf.byte_accounting();
            uncompressed += u;
            compressed += c;
        });
        self.metrics.set_byte_totals(uncompressed, compressed);
        Stats {
            uncompressed,
            compressed,
        }
    }

    /// Switches the tree's compression backend, re-encoding every leaf in
    /// place under the exclusive lock so no entry is lost.
    ///
    /// Unlike [`Self::init`], this does not fall back: if `algorithm` is
    /// unavailable, the call fails and the current codec is retained.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendUnavailable`] if `algorithm`'s backend
    /// cannot be initialized, or [`Error::CodecFailure`] if re-encoding a
    /// leaf under the old codec fails.
    pub fn set_algorithm(&self, algorithm: Algorithm) -> Result<()> {
        let mut inner = self.inner.write().expect("lock is poisoned");
        let new_codec = try_init_exact(algorithm, inner.compression_level).map_err(|err| match err {
            CodecError::BackendUnavailable => Error::BackendUnavailable,
            other => Error::CodecFailure(other),
        })?;
        let Inner { base, codec, .. } = &mut *inner;
        let old_codec_ref = codec.as_ref();
        let new_codec_ref = new_codec.as_ref();
        base.for_each_leaf_mut(|leaf| leaf.recompress_with(old_codec_ref, new_codec_ref))?;
        inner.codec = new_codec;
        inner.algorithm = algorithm;
        Ok(())
    }

    /// Returns the codec actually in effect (after any fallback).
    #[must_use]
    pub fn get_algorithm(&self) -> Algorithm {
        let inner = self.inner.read().expect("lock is poisoned");
        inner.algorithm
    }

    /// Returns per-codec operation counts accumulated since construction.
    #[must_use]
    pub fn get_algorithm_stats(&self) -> AlgorithmStats {
        let (software_ops, hardware_ops) = self.metrics.algorithm_ops();
        AlgorithmStats {
            software_ops,
            hardware_ops,
        }
    }

    /// Returns the number of `get` calls whose codec call failed and fell
    /// back to [`ABSENT`].
    #[must_use]
    pub fn codec_failures(&self) -> usize {
        self.metrics.codec_failures()
    }

    /// A one-line diagnostic summary, for logging and debugging only. The
    /// format is not a stable API.
    #[must_use]
    pub fn dump(&self) -> String {
        let inner = self.inner.read().expect("lock is poisoned");
        format!(
            "CompressedBTree {{ size: {}, height: {}, algorithm: {}, sub_pages: {}, slots: {} }}",
            inner.base.len(),
            inner.base.height(),
            inner.algorithm,
            inner.leaf_config.sub_page_count,
            inner.leaf_config.slot_count,
        )
    }
}
