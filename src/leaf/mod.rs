// Copyright (c) 2024-present, zipcache-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The compressed leaf page: a fixed-capacity logical page that
//! partitions its key space into hash-routed sub-pages, each owning a
//! compressed byte buffer and a small hash-indexed directory.

mod hash;

use crate::codec::Codec;
use crate::common::PutOutcome;
use crate::error::{Error, Result};
use hash::{probe_start, route};

/// Value width in bytes (the CT value is a machine `i64`).
const VALUE_WIDTH: usize = std::mem::size_of::<i64>();

/// Reserved "absent" sentinel. Stored literally when put, but
/// liveness is always decided by the directory's live-bit, never by value.
pub const ABSENT: i64 = -1;

#[derive(Debug, Clone, Copy)]
struct DirSlot {
    key: i64,
    live: bool,
}

impl Default for DirSlot {
    fn default() -> Self {
        Self { key: 0, live: false }
    }
}

/// One hash partition of a compressed leaf: a directory of up to
/// `slot_count` live entries, and the compressed byte buffer holding their
/// values.
#[derive(Debug, Clone)]
struct SubPage {
    slot_count: usize,
    directory: Vec<DirSlot>,
    compressed: Vec<u8>,
    uncompressed_size: usize,
}

impl SubPage {
    fn new(slot_count: usize, codec: &dyn Codec) -> Result<Self> {
        let plain = vec![0u8; slot_count * VALUE_WIDTH];
        let mut compressed = vec![0u8; codec.bound(plain.len())];
        let written = codec.compress(&plain, &mut compressed)?;
        compressed.truncate(written);
        Ok(Self {
            slot_count,
            directory: vec![DirSlot::default(); slot_count],
            compressed,
            uncompressed_size: plain.len(),
        })
    }

    fn decompress(&self, codec: &dyn Codec) -> Result<Vec<u8>> {
        let mut plain = vec![0u8; self.uncompressed_size];
        codec.decompress(&self.compressed, &mut plain)?;
        Ok(plain)
    }

    fn recompress(&mut self, plain: &[u8], codec: &dyn Codec) -> Result<()> {
        let mut compressed = vec![0u8; codec.bound(plain.len())];
        let written = codec.compress(plain, &mut compressed)?;
        compressed.truncate(written);
        self.compressed = compressed;
        self.uncompressed_size = plain.len();
        Ok(())
    }

    fn slot_of(&self, key: i64) -> Option<usize> {
        self.directory
            .iter()
            .position(|slot| slot.live && slot.key == key)
    }

    /// Read the value for `key` if it is live in this sub-page.
    fn get(&self, key: i64, codec: &dyn Codec) -> Result<Option<i64>> {
        let Some(idx) = self.slot_of(key) else {
            return Ok(None);
        };
        let plain = self.decompress(codec)?;
        Ok(Some(read_value(&plain, idx)))
    }

    /// Insert or overwrite `key`. Returns `false` if this is a new key and
    /// the directory has no free slot (hash-partition full); the sub-page
    /// is left unmodified in that case.
    fn put(&mut self, key: i64, value: i64, codec: &dyn Codec) -> Result<bool> {
        let mut plain = self.decompress(codec)?;

        let idx = if let Some(idx) = self.slot_of(key) {
            idx
        } else {
            let Some(idx) = self.find_free_slot(key) else {
                return Ok(false);
            };
            self.directory[idx] = DirSlot { key, live: true };
            idx
        };

        write_value(&mut plain, idx, value);
        self.recompress(&plain, codec)?;
        Ok(true)
    }

    fn find_free_slot(&self, key: i64) -> Option<usize> {
        let start = probe_start(key, self.slot_count);
        (0..self.slot_count)
            .map(|offset| (start + offset) % self.slot_count)
            .find(|&idx| !self.directory[idx].live)
    }

    /// Clear the live-bit for `key` if present. Stale compressed bytes are
    /// left as-is; they become unreachable once the directory forgets them.
    fn clear_if_present(&mut self, key: i64) -> bool {
        if let Some(idx) = self.slot_of(key) {
            self.directory[idx] = DirSlot::default();
            true
        } else {
            false
        }
    }

    fn live_entries(&self, codec: &dyn Codec) -> Result<Vec<(i64, i64)>> {
        if !self.directory.iter().any(|slot| slot.live) {
            return Ok(Vec::new());
        }
        let plain = self.decompress(codec)?;
        Ok(self
            .directory
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.live)
            .map(|(idx, slot)| (slot.key, read_value(&plain, idx)))
            .collect())
    }

    fn live_count(&self) -> usize {
        self.directory.iter().filter(|slot| slot.live).count()
    }
}

fn read_value(plain: &[u8], idx: usize) -> i64 {
    let start = idx * VALUE_WIDTH;
    let mut bytes = [0u8; VALUE_WIDTH];
    bytes.copy_from_slice(&plain[start..start + VALUE_WIDTH]);
    i64::from_le_bytes(bytes)
}

fn write_value(plain: &mut [u8], idx: usize, value: i64) {
    let start = idx * VALUE_WIDTH;
    plain[start..start + VALUE_WIDTH].copy_from_slice(&value.to_le_bytes());
}

/// An optional per-leaf append queue that defers compression work (lazy
/// mode). The buffer shadows any stale sub-page entry for the same key —
/// chosen representation: overwrites are
/// not eagerly cleared from the sub-page, only masked on read, and
/// reconciled at the next flush.
#[derive(Debug, Clone)]
struct WriteBuffer {
    entries: Vec<(i64, i64)>,
    flush_threshold: usize,
}

impl WriteBuffer {
    fn new(flush_threshold: usize) -> Self {
        Self {
            entries: Vec::new(),
            flush_threshold,
        }
    }

    /// Most recent buffered value for `key`, if any (last-writer-wins).
    fn lookup(&self, key: i64) -> Option<i64> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    fn contains(&self, key: i64) -> bool {
        self.entries.iter().any(|(k, _)| *k == key)
    }

    fn remove_all(&mut self, key: i64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| *k != key);
        self.entries.len() != before
    }
}

/// Per-leaf lazy-compression configuration, threaded in from the facade.
#[derive(Debug, Clone, Copy)]
pub struct LeafConfig {
    pub sub_page_count: usize,
    pub slot_count: usize,
    pub capacity: usize,
    pub lazy: bool,
    pub buffer_size: usize,
    pub flush_threshold: usize,
}

/// A compressed leaf page: `sub_page_count` hash partitions, each a
/// [`SubPage`], plus an optional lazy [`WriteBuffer`].
#[derive(Debug, Clone)]
pub struct CompressedLeaf {
    config: LeafConfig,
    sub_pages: Vec<SubPage>,
    write_buffer: Option<WriteBuffer>,
    len: usize,
}

impl CompressedLeaf {
    pub fn new(config: LeafConfig, codec: &dyn Codec) -> Result<Self> {
        let sub_pages = (0..config.sub_page_count)
            .map(|_| SubPage::new(config.slot_count, codec))
            .collect::<Result<Vec<_>>>()?;
        let write_buffer = config.lazy.then(|| WriteBuffer::new(config.flush_threshold));
        Ok(Self {
            config,
            sub_pages,
            write_buffer,
            len: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= self.config.capacity
    }

    pub fn is_underflowing(&self) -> bool {
        self.len < self.config.capacity.div_ceil(2)
    }

    fn contains_key(&self, key: i64) -> bool {
        if let Some(buf) = &self.write_buffer {
            if buf.contains(key) {
                return true;
            }
        }
        let sp = &self.sub_pages[route(key, self.sub_pages.len())];
        sp.slot_of(key).is_some()
    }

    /// Whether admitting `key` as a new entry would leave its destination
    /// sub-page with more distinct live keys than `slot_count` once the
    /// write buffer is flushed. Counts the sub-page's current live entries
    /// plus every buffered key (other than `key` itself) that routes to
    /// the same sub-page and isn't already live there, so a lazy `put`
    /// never admits more keys into one hash partition than a flush could
    /// actually fit.
    fn would_overflow_subpage(&self, key: i64) -> bool {
        let sp_idx = route(key, self.sub_pages.len());
        let sp = &self.sub_pages[sp_idx];
        if sp.slot_of(key).is_some() {
            return false;
        }

        let mut pending = std::collections::HashSet::new();
        pending.insert(key);
        if let Some(buf) = &self.write_buffer {
            for &(k, _) in &buf.entries {
                if k != key && route(k, self.sub_pages.len()) == sp_idx && sp.slot_of(k).is_none() {
                    pending.insert(k);
                }
            }
        }
        sp.live_count() + pending.len() > sp.slot_count
    }

    pub fn get(&self, key: i64, codec: &dyn Codec) -> Result<Option<i64>> {
        if let Some(buf) = &self.write_buffer {
            if let Some(value) = buf.lookup(key) {
                return Ok(Some(value));
            }
        }
        let sp = &self.sub_pages[route(key, self.sub_pages.len())];
        sp.get(key, codec)
    }

    pub fn put(&mut self, key: i64, value: i64, codec: &dyn Codec) -> Result<PutOutcome> {
        let is_new = !self.contains_key(key);
        if is_new && self.len >= self.config.capacity {
            return Ok(PutOutcome::NeedsSplit);
        }

        if self.config.lazy {
            if is_new && self.would_overflow_subpage(key) {
                return Ok(PutOutcome::NeedsSplit);
            }
            if self
                .write_buffer
                .as_ref()
                .map(|b| b.entries.len() + 1 > self.config.flush_threshold)
                .unwrap_or(false)
            {
                self.flush(codec)?;
                if is_new && self.would_overflow_subpage(key) {
                    return Ok(PutOutcome::NeedsSplit);
                }
            }
            let buf = self
                .write_buffer
                .get_or_insert_with(|| WriteBuffer::new(self.config.flush_threshold));
            buf.entries.push((key, value));
            if is_new {
                self.len += 1;
            }
            return Ok(PutOutcome::Done);
        }

        let sp_idx = route(key, self.sub_pages.len());
        let fit = self.sub_pages[sp_idx].put(key, value, codec)?;
        if !fit {
            return Ok(PutOutcome::NeedsSplit);
        }
        if is_new {
            self.len += 1;
        }
        Ok(PutOutcome::Done)
    }

    pub fn delete(&mut self, key: i64) -> bool {
        let mut found = false;
        if let Some(buf) = &mut self.write_buffer {
            if buf.remove_all(key) {
                found = true;
            }
        }
        let sp_idx = route(key, self.sub_pages.len());
        if self.sub_pages[sp_idx].clear_if_present(key) {
            found = true;
        }
        if found {
            self.len -= 1;
        }
        found
    }

    /// Drain the write buffer into its sub-pages, batched per sub-page, and
    /// recompress each touched sub-page exactly once. Triggered at the
    /// threshold, on structural events, and whenever a lookup requires
    /// authoritative sub-page data.
    pub fn flush(&mut self, codec: &dyn Codec) -> Result<()> {
        let Some(buf) = self.write_buffer.take() else {
            return Ok(());
        };
        if buf.entries.is_empty() {
            self.write_buffer = Some(buf);
            return Ok(());
        }

        let sub_page_count = self.sub_pages.len();
        let mut by_sub_page: Vec<Vec<(i64, i64)>> = vec![Vec::new(); sub_page_count];
        for (key, value) in &buf.entries {
            by_sub_page[route(*key, sub_page_count)].push((*key, *value));
        }

        for (idx, batch) in by_sub_page.into_iter().enumerate() {
            if batch.is_empty() {
                continue;
            }
            // Last-writer-wins among duplicates, preserving append order:
            // a later `put` for the same key in `batch` simply overwrites
            // the sub-page slot written by an earlier one.
            for (key, value) in batch {
                let fit = self.sub_pages[idx].put(key, value, codec)?;
                // `put()` rejects any new key via `would_overflow_subpage`
                // before it ever reaches the buffer, so every buffered key
                // must still fit its sub-page at flush time. Guard against
                // it anyway rather than silently dropping the entry.
                if !fit {
                    return Err(Error::InvalidArgument(
                        "buffered key no longer fits its sub-page at flush time",
                    ));
                }
            }
        }

        self.write_buffer = Some(WriteBuffer::new(self.config.flush_threshold));
        Ok(())
    }

    fn live_entries(&mut self, codec: &dyn Codec) -> Result<Vec<(i64, i64)>> {
        self.flush(codec)?;
        let mut all = Vec::with_capacity(self.len);
        for sp in &self.sub_pages {
            all.extend(sp.live_entries(codec)?);
        }
        all.sort_unstable_by_key(|(k, _)| *k);
        Ok(all)
    }

    /// Split this leaf in two at the median key. `self` becomes
    /// the left half; the right half is returned together with its
    /// starting (separator) key. Both halves get a fresh, full, empty
    /// sub-page array.
    pub fn split(&mut self, codec: &dyn Codec) -> Result<(i64, Self)> {
        let all = self.live_entries(codec)?;
        let mid = all.len() / 2;
        let (left_entries, right_entries) = all.split_at(mid);

        let mut left = Self::new(self.config, codec)?;
        for &(k, v) in left_entries {
            let outcome = left.put(k, v, codec)?;
            debug_assert_eq!(outcome, PutOutcome::Done);
        }

        let mut right = Self::new(self.config, codec)?;
        for &(k, v) in right_entries {
            let outcome = right.put(k, v, codec)?;
            debug_assert_eq!(outcome, PutOutcome::Done);
        }

        let separator = right_entries[0].0;
        *self = left;
        Ok((separator, right))
    }

    /// Merge `other`'s live entries into `self`.
    pub fn merge(&mut self, other: &mut Self, codec: &dyn Codec) -> Result<()> {
        let mut all = self.live_entries(codec)?;
        all.extend(other.live_entries(codec)?);
        all.sort_unstable_by_key(|(k, _)| *k);

        let mut merged = Self::new(self.config, codec)?;
        for (k, v) in all {
            let outcome = merged.put(k, v, codec)?;
            debug_assert_eq!(outcome, PutOutcome::Done);
        }
        *self = merged;
        Ok(())
    }

    /// Total uncompressed and compressed byte counts across sub-pages,
    /// for [`crate::ct::Stats`].
    pub fn byte_accounting(&self) -> (usize, usize) {
        self.sub_pages.iter().fold((0, 0), |(u, c), sp| {
            (u + sp.uncompressed_size, c + sp.compressed.len())
        })
    }

    /// Rebuilds this leaf from scratch under `new_codec`, decoding its
    /// current contents with `old_codec` first. Used when the tree-wide
    /// codec is switched at runtime; every entry survives the switch.
    pub fn recompress_with(&mut self, old_codec: &dyn Codec, new_codec: &dyn Codec) -> Result<()> {
        let entries = self.live_entries(old_codec)?;
        let mut fresh = Self::new(self.config, new_codec)?;
        for (k, v) in entries {
            let outcome = fresh.put(k, v, new_codec)?;
            debug_assert_eq!(outcome, PutOutcome::Done);
        }
        *self = fresh;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn sub_page_live_counts(&self) -> Vec<usize> {
        self.sub_pages.iter().map(SubPage::live_count).collect()
    }
}

impl crate::tree::LeafPayload for CompressedLeaf {
    type Value = i64;
    type Ctx = dyn Codec;

    fn len(&self) -> usize {
        CompressedLeaf::len(self)
    }

    fn is_full(&self) -> bool {
        CompressedLeaf::is_full(self)
    }

    fn is_underflowing(&self) -> bool {
        CompressedLeaf::is_underflowing(self)
    }

    fn get(&self, key: i64, ctx: &Self::Ctx) -> Result<Option<i64>> {
        CompressedLeaf::get(self, key, ctx)
    }

    fn put(&mut self, key: i64, value: i64, ctx: &Self::Ctx) -> Result<PutOutcome> {
        CompressedLeaf::put(self, key, value, ctx)
    }

    fn delete(&mut self, key: i64, _ctx: &Self::Ctx) -> Result<bool> {
        Ok(CompressedLeaf::delete(self, key))
    }

    fn entries(&mut self, ctx: &Self::Ctx) -> Result<Vec<(i64, i64)>> {
        CompressedLeaf::live_entries(self, ctx)
    }

    fn split(&mut self, ctx: &Self::Ctx) -> Result<(i64, Self)> {
        CompressedLeaf::split(self, ctx)
    }

    fn merge(&mut self, other: &mut Self, ctx: &Self::Ctx) -> Result<()> {
        CompressedLeaf::merge(self, other, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;
    use crate::codec::SoftwareCodec;

    fn leaf(sub_page_count: usize, slot_count: usize, capacity: usize, lazy: bool) -> CompressedLeaf {
        let codec = SoftwareCodec::new();
        CompressedLeaf::new(
            LeafConfig {
                sub_page_count,
                slot_count,
                capacity,
                lazy,
                buffer_size: 32,
                flush_threshold: 28,
            },
            &codec,
        )
        .unwrap()
    }

    #[test]
    fn put_then_get_round_trips() {
        let codec = SoftwareCodec::new();
        let mut leaf = leaf(4, 8, 32, false);
        for (k, v) in [(1, 101), (5, 105), (9, 109), (13, 113)] {
            assert_eq!(leaf.put(k, v, &codec).unwrap(), PutOutcome::Done);
        }
        for (k, v) in [(1, 101), (5, 105), (9, 109), (13, 113)] {
            assert_eq!(leaf.get(k, &codec).unwrap(), Some(v));
        }
    }

    #[test]
    fn absent_sentinel_value_is_distinguishable_from_missing_key() {
        let codec = SoftwareCodec::new();
        let mut leaf = leaf(4, 8, 32, false);
        assert_eq!(leaf.get(1, &codec).unwrap(), None);
        leaf.put(1, ABSENT, &codec).unwrap();
        assert_eq!(leaf.get(1, &codec).unwrap(), Some(ABSENT));
        leaf.delete(1);
        assert_eq!(leaf.get(1, &codec).unwrap(), None);
    }

    #[test]
    fn sub_page_saturation_reports_needs_split() {
        let codec = SoftwareCodec::new();
        let mut leaf = leaf(4, 8, 1_000, false);
        // Force everything into one sub-page by bypassing route() with
        // identical low bits is impractical here; instead shrink capacity
        // pressure by filling all partitions fully via direct key probing.
        let mut inserted = 0;
        let mut key = 0i64;
        loop {
            match leaf.put(key, key, &codec).unwrap() {
                PutOutcome::Done => {
                    inserted += 1;
                    key += 1;
                }
                PutOutcome::NeedsSplit => break,
            }
            if inserted > 10_000 {
                panic!("leaf never reported NeedsSplit");
            }
        }
        assert!(inserted >= 4 * 8);
    }

    #[test]
    fn lazy_mode_reports_needs_split_on_sub_page_saturation_before_flush() {
        let codec = SoftwareCodec::new();
        let mut leaf = leaf(1, 2, 100, true);

        assert_eq!(leaf.put(1, 1, &codec).unwrap(), PutOutcome::Done);
        assert_eq!(leaf.put(2, 2, &codec).unwrap(), PutOutcome::Done);
        // The single sub-page's 2 slots are already spoken for by the
        // two buffered keys above; a third distinct key must not be
        // silently admitted only to be dropped (or panic) at flush time.
        assert_eq!(leaf.put(3, 3, &codec).unwrap(), PutOutcome::NeedsSplit);

        // The leaf is left exactly as it was before the rejected put.
        assert_eq!(leaf.len(), 2);
        leaf.flush(&codec).unwrap();
        assert_eq!(leaf.get(1, &codec).unwrap(), Some(1));
        assert_eq!(leaf.get(2, &codec).unwrap(), Some(2));
        assert_eq!(leaf.get(3, &codec).unwrap(), None);
    }

    #[test]
    fn lazy_mode_matches_eager_mode_after_flush() {
        let codec = SoftwareCodec::new();
        let mut eager = leaf(16, 8, 1000, false);
        let mut lazy = leaf(16, 8, 1000, true);

        for i in 0..500 {
            eager.put(i, i * 10, &codec).unwrap();
            lazy.put(i, i * 10, &codec).unwrap();
        }
        lazy.flush(&codec).unwrap();

        for i in 0..500 {
            assert_eq!(
                eager.get(i, &codec).unwrap(),
                lazy.get(i, &codec).unwrap()
            );
        }
    }

    #[test]
    fn split_preserves_all_live_entries_in_sorted_halves() {
        let codec = SoftwareCodec::new();
        let mut leaf = leaf(8, 8, 64, false);
        for i in 0..40 {
            leaf.put(i, i * 10, &codec).unwrap();
        }
        let (separator, mut right) = leaf.split(&codec).unwrap();

        let mut left_entries = leaf.live_entries(&codec).unwrap();
        let mut right_entries = right.live_entries(&codec).unwrap();
        left_entries.append(&mut right_entries.clone());
        left_entries.sort_unstable_by_key(|(k, _)| *k);
        assert_eq!(left_entries, (0..40).map(|i| (i, i * 10)).collect::<Vec<_>>());

        assert!(right_entries.iter().all(|(k, _)| *k >= separator));
        assert!(leaf.live_entries(&codec).unwrap().iter().all(|(k, _)| *k < separator));
    }
}
