// Copyright (c) 2024-present, zipcache-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The capability set a leaf must expose so [`super::BaseTree`] can stay
//! generic over the CT (compressed) and LO (object-pointer) leaf shapes
//! without an inheritance hierarchy.

use crate::common::PutOutcome;
use crate::error::Result;

/// A leaf payload: everything the base tree needs from a leaf to perform
/// search, insert, delete, split and merge, without knowing what is
/// actually stored inside.
pub trait LeafPayload: Sized {
    /// The value type this leaf maps keys to.
    type Value: Copy;

    /// External context a leaf operation needs but does not own — the
    /// shared codec handle for CT leaves, `()` for LO leaves.
    type Ctx: ?Sized;

    /// Number of live keys currently held by this leaf.
    fn len(&self) -> usize;

    /// `true` if [`LeafPayload::len`] is zero.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this leaf has reached the point where the base tree must
    /// split it before admitting another new key.
    fn is_full(&self) -> bool;

    /// Whether this leaf has fallen below the merge threshold (
    /// "half-full").
    fn is_underflowing(&self) -> bool;

    /// Look up `key`.
    fn get(&self, key: i64, ctx: &Self::Ctx) -> Result<Option<Self::Value>>;

    /// Insert or overwrite `key`. See [`PutOutcome`].
    fn put(&mut self, key: i64, value: Self::Value, ctx: &Self::Ctx) -> Result<PutOutcome>;

    /// Remove `key`, returning whether it was present.
    fn delete(&mut self, key: i64, ctx: &Self::Ctx) -> Result<bool>;

    /// All live entries in ascending key order. Flushes any pending write
    /// buffer first, so the result is always authoritative.
    fn entries(&mut self, ctx: &Self::Ctx) -> Result<Vec<(i64, Self::Value)>>;

    /// Split this leaf at its median key. `self` becomes the left half;
    /// the right half and its separator key are returned.
    fn split(&mut self, ctx: &Self::Ctx) -> Result<(i64, Self)>;

    /// Merge `other`'s entries into `self`.
    fn merge(&mut self, other: &mut Self, ctx: &Self::Ctx) -> Result<()>;
}
