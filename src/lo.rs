// Copyright (c) 2024-present, zipcache-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The large-object B+Tree: an ordered `i64 -> ObjectPointer` map locating
//! payloads kept outside memory. It shares the base tree skeleton with
//! [`crate::CompressedBTree`] but needs no codec: its leaf payload is a
//! dense, sorted array rather than a compressed, hashed page.

use std::hash::Hasher;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::sync::RwLock;

use rustc_hash::FxHasher;

use crate::common::PutOutcome;
use crate::error::Result;
use crate::tree::{BaseTree, LeafPayload};

/// A pointer to a payload stored outside this process's memory: a
/// logical block address plus a size. `lba == 0` is reserved as the
/// invalid sentinel (no object ever allocates LBA zero, since
/// [`ObjectTree::allocate_object`] starts counting at one).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct ObjectPointer {
    pub lba: u64,
    pub size: u32,
    pub flags: u32,
}

impl ObjectPointer {
    /// The sentinel returned by a missing-key lookup.
    pub const INVALID: Self = Self {
        lba: 0,
        size: 0,
        flags: 0,
    };

    /// `true` unless this is [`Self::INVALID`].
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.lba != 0
    }
}

/// A leaf of the LO tree: a dense array of `(key, pointer)` kept sorted
/// by key at all times, so split, merge and range scans need no
/// decompression step.
#[derive(Debug, Clone)]
struct ObjectLeaf {
    capacity: usize,
    entries: Vec<(i64, ObjectPointer)>,
}

impl ObjectLeaf {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::new(),
        }
    }

    fn position(&self, key: i64) -> std::result::Result<usize, usize> {
        self.entries.binary_search_by_key(&key, |(k, _)| *k)
    }
}

impl LeafPayload for ObjectLeaf {
    type Value = ObjectPointer;
    type Ctx = ();

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    fn is_underflowing(&self) -> bool {
        self.entries.len() < self.capacity.div_ceil(2)
    }

    fn get(&self, key: i64, _ctx: &()) -> Result<Option<ObjectPointer>> {
        Ok(self.position(key).ok().map(|idx| self.entries[idx].1))
    }

    fn put(&mut self, key: i64, value: ObjectPointer, _ctx: &()) -> Result<PutOutcome> {
        match self.position(key) {
            Ok(idx) => {
                self.entries[idx].1 = value;
                Ok(PutOutcome::Done)
            }
            Err(idx) => {
                if self.entries.len() >= self.capacity {
                    return Ok(PutOutcome::NeedsSplit);
                }
                self.entries.insert(idx, (key, value));
                Ok(PutOutcome::Done)
            }
        }
    }

    fn delete(&mut self, key: i64, _ctx: &()) -> Result<bool> {
        match self.position(key) {
            Ok(idx) => {
                self.entries.remove(idx);
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    fn entries(&mut self, _ctx: &()) -> Result<Vec<(i64, ObjectPointer)>> {
        Ok(self.entries.clone())
    }

    fn split(&mut self, _ctx: &()) -> Result<(i64, Self)> {
        let mid = self.entries.len() / 2;
        let right_entries = self.entries.split_off(mid);
        let separator = right_entries[0].0;
        Ok((
            separator,
            Self {
                capacity: self.capacity,
                entries: right_entries,
            },
        ))
    }

    fn merge(&mut self, other: &mut Self, _ctx: &()) -> Result<()> {
        self.entries.append(&mut other.entries);
        self.entries.sort_unstable_by_key(|(k, _)| *k);
        Ok(())
    }
}

struct Inner {
    base: BaseTree<ObjectLeaf>,
    next_lba: u64,
}

/// An ordered `i64 -> ObjectPointer` map, guarded by the same
/// single-reader/writer-lock policy as [`crate::CompressedBTree`]:
/// `get`, `empty`, `size` and `get_range` take a shared lock; `put`,
/// `delete` and `allocate_object` take the exclusive lock.
pub struct ObjectTree {
    inner: RwLock<Inner>,
    total_size: AtomicU64,
}

impl ObjectTree {
    /// Builds a tree with the given branching `order` and per-leaf
    /// `capacity`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] if `order < 2` or
    /// `capacity == 0`.
    pub fn init(order: usize, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(crate::Error::InvalidArgument("capacity must be > 0"));
        }
        let base = BaseTree::new(order, ObjectLeaf::new(capacity))?;
        Ok(Self {
            inner: RwLock::new(Inner { base, next_lba: 1 }),
            total_size: AtomicU64::new(0),
        })
    }

    /// Allocates a new pointer with a monotonically increasing LBA and
    /// the requested `size`. Does not insert anything into the tree; the
    /// caller decides under which key (if any) to store it.
    pub fn allocate_object(&self, size: u32) -> ObjectPointer {
        let mut inner = self.inner.write().expect("lock is poisoned");
        let lba = inner.next_lba;
        inner.next_lba += 1;
        self.total_size.fetch_add(u64::from(size), Relaxed);
        ObjectPointer { lba, size, flags: 0 }
    }

    /// Looks up `key`, returning [`ObjectPointer::INVALID`] if absent.
    #[must_use]
    pub fn get(&self, key: i64) -> ObjectPointer {
        let inner = self.inner.read().expect("lock is poisoned");
        inner
            .base
            .get(key, &())
            .ok()
            .flatten()
            .unwrap_or(ObjectPointer::INVALID)
    }

    /// Inserts or overwrites `key` with `pointer`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfMemory`] if node allocation fails.
    pub fn put(&self, key: i64, pointer: ObjectPointer) -> Result<()> {
        let mut inner = self.inner.write().expect("lock is poisoned");
        inner.base.put(key, pointer, &())
    }

    /// Removes `key`. Returns `true` if it was present.
    #[must_use]
    pub fn delete(&self, key: i64) -> bool {
        let mut inner = self.inner.write().expect("lock is poisoned");
        inner.base.delete(key, &()).unwrap_or(false)
    }

    /// Returns `true` if the tree holds no entries.
    #[must_use]
    pub fn empty(&self) -> bool {
        let inner = self.inner.read().expect("lock is poisoned");
        inner.base.is_empty()
    }

    /// Number of live keys; always equal to `total_objects`.
    #[must_use]
    pub fn size(&self) -> usize {
        let inner = self.inner.read().expect("lock is poisoned");
        inner.base.len()
    }

    /// Alias for [`Self::size`] under the name `total_objects`.
    #[must_use]
    pub fn total_objects(&self) -> usize {
        self.size()
    }

    /// Cumulative size, in bytes, of every object ever allocated through
    /// this tree (whether or not it was subsequently inserted or is still
    /// live).
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size.load(Relaxed)
    }

    /// Collects up to `cap` entries with keys in the inclusive range
    /// `[lo, hi]`, in ascending key order.
    #[must_use]
    pub fn get_range(&self, lo: i64, hi: i64, cap: usize) -> Vec<(i64, ObjectPointer)> {
        let inner = self.inner.read().expect("lock is poisoned");
        let mut out = Vec::new();
        inner.base.for_each_leaf(|leaf| {
            if out.len() >= cap {
                return;
            }
            for &(key, pointer) in &leaf.entries {
                if out.len() >= cap {
                    break;
                }
                if key >= lo && key <= hi {
                    out.push((key, pointer));
                }
            }
        });
        out
    }
}

/// A deterministic 32-bit checksum over `bytes`, for callers validating
/// external payloads located via an [`ObjectPointer`]. Nonzero on
/// nonempty input, stable across calls, and equal for equal inputs.
#[must_use]
pub fn object_pointer_checksum(bytes: &[u8]) -> u32 {
    if bytes.is_empty() {
        return 0;
    }
    let mut hasher = FxHasher::default();
    hasher.write(bytes);
    match hasher.finish() as u32 {
        0 => 1,
        nonzero => nonzero,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn allocate_object_assigns_monotonic_lbas_and_tracks_size() {
        let tree = ObjectTree::init(4, 8).unwrap();
        let a = tree.allocate_object(1024);
        let b = tree.allocate_object(2048);
        assert!(a.lba < b.lba);
        assert_eq!(tree.total_size(), 3072);
    }

    #[test]
    fn put_then_get_round_trips_and_missing_key_is_invalid() {
        let tree = ObjectTree::init(4, 8).unwrap();
        let pointer = tree.allocate_object(4096);
        tree.put(10, pointer).unwrap();
        assert_eq!(tree.get(10), pointer);
        assert_eq!(tree.get(99), ObjectPointer::INVALID);
        assert!(!tree.get(99).is_valid());
    }

    #[test]
    fn delete_removes_entry_and_updates_total_objects() {
        let tree = ObjectTree::init(4, 8).unwrap();
        let pointer = tree.allocate_object(512);
        tree.put(1, pointer).unwrap();
        assert_eq!(tree.total_objects(), 1);
        assert!(tree.delete(1));
        assert_eq!(tree.total_objects(), 0);
        assert!(!tree.delete(1));
    }

    #[test]
    fn get_range_returns_ascending_inclusive_matches_capped() {
        let tree = ObjectTree::init(4, 4).unwrap();
        for key in [10, 20, 30, 40, 50] {
            let pointer = tree.allocate_object(key as u32 * 10);
            tree.put(key, pointer).unwrap();
        }
        let found = tree.get_range(20, 45, 10);
        let keys: Vec<i64> = found.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![20, 30, 40]);

        let capped = tree.get_range(0, 100, 2);
        assert_eq!(capped.len(), 2);
    }

    #[test]
    fn split_across_many_inserts_preserves_all_entries() {
        let tree = ObjectTree::init(4, 4).unwrap();
        for key in 0..50 {
            let pointer = tree.allocate_object(1);
            tree.put(key, pointer).unwrap();
        }
        assert_eq!(tree.size(), 50);
        for key in 0..50 {
            assert!(tree.get(key).is_valid());
        }
    }

    #[test]
    fn checksum_is_stable_nonzero_and_distinguishes_inputs() {
        let a = object_pointer_checksum(b"hello world");
        let b = object_pointer_checksum(b"hello world");
        let c = object_pointer_checksum(b"goodbye world");
        assert_ne!(a, 0);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(object_pointer_checksum(b""), 0);
    }
}
