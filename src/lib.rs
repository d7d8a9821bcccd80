// Copyright (c) 2024-present, zipcache-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A two-tier, in-memory indexing engine for a tiered key-value store.
//!
//! ##### About
//!
//! This crate provides two cooperating B+Tree variants:
//!
//! - [`CompressedBTree`] — an ordered `i64 -> i64` map whose leaf pages
//!   transparently compress their payload, so a large working set fits in
//!   DRAM. This is the hard core of the crate: a classical B+Tree combined
//!   with a hashed, sub-paged leaf layout, lazy compression buffers and
//!   pluggable codecs.
//! - [`ObjectTree`] — a simpler ordered `i64 -> ObjectPointer` map for
//!   locating payloads kept outside memory (on an SSD-resident object
//!   store this crate does not implement).
//!
//! Both share the same [`BaseTree`] skeleton; the leaf payload is the
//! only thing that differs between them.
//!
//! This crate is memory-resident only: there is no persisted format, no
//! crash recovery, and no cross-node distribution. See each module's docs
//! for the invariants it upholds.
//!
//! # Example
//!
//! ```
//! use zipcache_index::{CompressedBTree, Config};
//!
//! let tree = CompressedBTree::init(8, 32, Config::default()).unwrap();
//! tree.put(1, 101).unwrap();
//! assert_eq!(tree.get(1), 101);
//! assert_eq!(tree.get(2), zipcache_index::ABSENT);
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod codec;
mod common;
mod config;
mod ct;
mod error;
mod leaf;
mod lo;
mod metrics;
mod tree;

pub use codec::{Algorithm, Codec, CodecError};
pub use config::{create_default_config, Config, DefaultLayout};
pub use ct::{CompressedBTree, Stats};
pub use error::{Error, Result};
pub use leaf::ABSENT;
pub use lo::{ObjectPointer, ObjectTree};
pub use metrics::AlgorithmStats;
pub use tree::{BaseTree, LeafPayload};
