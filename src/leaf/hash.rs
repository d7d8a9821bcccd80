// Copyright (c) 2024-present, zipcache-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Key-to-sub-page / key-to-slot routing.
//!
//! The exact mixer is not observable externally; this one only needs to
//! be a fast, stable avalanche over a signed 64-bit key, so routing reuses
//! `rustc-hash`'s `FxHasher` rather than rolling a bespoke one.

use std::hash::Hasher;

use rustc_hash::FxHasher;

fn mix(key: i64) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write_i64(key);
    hasher.finish()
}

/// Route a key to one of `sub_page_count` sub-pages. Stable for the
/// lifetime of the tree as long as `sub_page_count` does not change.
pub fn route(key: i64, sub_page_count: usize) -> usize {
    debug_assert!(sub_page_count > 0);
    (mix(key) as usize) % sub_page_count
}

/// Starting probe offset for linear probing within one sub-page's
/// directory. Derived independently of `route` so that keys colliding on
/// the same sub-page don't also collide on the same starting slot.
pub fn probe_start(key: i64, slot_count: usize) -> usize {
    debug_assert!(slot_count > 0);
    (mix(key.wrapping_add(1)) as usize) % slot_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn route_is_stable_across_calls() {
        for key in [-100, -1, 0, 1, 42, 1_000_000] {
            let a = route(key, 16);
            let b = route(key, 16);
            assert_eq!(a, b);
            assert!(a < 16);
        }
    }

    #[test]
    fn route_distributes_sequential_keys() {
        let mut buckets = [0usize; 8];
        for key in 0..800 {
            buckets[route(key, 8)] += 1;
        }
        // no bucket should be starved with a reasonably uniform mixer
        assert!(buckets.iter().all(|&count| count > 0));
    }
}
