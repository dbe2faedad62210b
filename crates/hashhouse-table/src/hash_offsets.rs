//! Hash → Offsets Multimap
//!
//! The in-memory index at the heart of the table: for each topic (a
//! *column*), a map from a 32-bit key hash to the list of mixed offsets
//! where records of that hash live in the log.
//!
//! ## The Problem
//!
//! A table holding tens of millions of keys cannot afford a
//! `HashMap<i32, Vec<i32>>`: every entry costs a heap allocation, pointer
//! chasing on each probe, and per-`Vec` bookkeeping that dwarfs the one or
//! two offsets a typical key owns.
//!
//! ## The Solution
//!
//! Flat primitive storage, open addressing:
//!
//! ```text
//! keys:  [ NO_VALUE │ h₁ │ NO_VALUE │ h₂ │ ... ]   open-addressed, linear probing
//! lists: [    -     │ ▲  │    -     │ ▲  │ ... ]   handle into the pool per slot
//!                     │               │
//! pool:  [ cap len o₁ o₂ ... │ cap len o₁ ... ]    compact [cap, len, items…] blocks
//! ```
//!
//! - The key array uses `NO_VALUE` (`i32::MIN`) as its empty-slot sentinel;
//!   [`hashhouse_core::key_hash`] reserves that value, so no real key can
//!   collide with it.
//! - Offset lists live in a single `Vec<i32>` pool as `[cap, len, items…]`
//!   blocks. A full list relocates to a doubled block at the pool's end; the
//!   stale block is reclaimed when the column next rehashes.
//! - The slot table doubles once the load factor passes 3/4.
//!
//! Hash collisions between distinct keys are expected and fine: both keys'
//! offsets share one list, and readers disambiguate by comparing full key
//! bytes against the fetched records.

/// Sentinel marking an empty slot; never a valid key hash.
pub const NO_VALUE: i32 = i32::MIN;

const INITIAL_SLOTS: usize = 16;

/// Compact multi-value map from `(column, key hash)` to an ordered list of
/// mixed offsets.
pub struct HashOffsets {
    columns: Vec<OffsetColumn>,
}

impl HashOffsets {
    /// An empty map with `columns` independent columns.
    pub fn new(columns: usize) -> Self {
        Self {
            columns: (0..columns).map(|_| OffsetColumn::new()).collect(),
        }
    }

    pub(crate) fn from_columns(columns: Vec<OffsetColumn>) -> Self {
        Self { columns }
    }

    /// Append `mixed` to the offset list at `(col, hash)`, creating the
    /// entry if absent. Duplicates are permitted; order is preserved.
    pub fn put(&mut self, hash: i32, mixed: i32, col: usize) {
        self.columns[col].put(hash, mixed);
    }

    /// Substitute `old` with `new` in place within the list at `(col,
    /// hash)`, preserving order. Falls back to [`HashOffsets::put`] when
    /// `old` (or the whole entry) is not present.
    pub fn replace(&mut self, hash: i32, old: i32, new: i32, col: usize) {
        self.columns[col].replace(hash, old, new);
    }

    /// The offset list at `(col, hash)`, in insertion order, or `None`.
    pub fn get(&self, hash: i32, col: usize) -> Option<&[i32]> {
        self.columns[col].get(hash)
    }

    /// Count of distinct `(column, hash)` keys across all columns.
    pub fn size(&self) -> usize {
        self.columns.iter().map(|c| c.len).sum()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }
}

/// One column: an open-addressed table over a flat key array with pooled
/// offset-list storage.
pub(crate) struct OffsetColumn {
    keys: Vec<i32>,
    lists: Vec<u32>,
    pool: ListPool,
    len: usize,
}

impl OffsetColumn {
    pub(crate) fn new() -> Self {
        Self::with_slots(INITIAL_SLOTS)
    }

    fn with_slots(slots: usize) -> Self {
        debug_assert!(slots.is_power_of_two());
        Self {
            keys: vec![NO_VALUE; slots],
            lists: vec![0; slots],
            pool: ListPool::new(),
            len: 0,
        }
    }

    /// Slot holding `hash`, or the first empty slot of its probe chain.
    fn slot_of(&self, hash: i32) -> usize {
        let mask = self.keys.len() - 1;
        let mut idx = (hash as u32 as usize) & mask;
        loop {
            let key = self.keys[idx];
            if key == NO_VALUE || key == hash {
                return idx;
            }
            idx = (idx + 1) & mask;
        }
    }

    pub(crate) fn put(&mut self, hash: i32, mixed: i32) {
        debug_assert_ne!(hash, NO_VALUE);
        self.grow_if_needed();
        let idx = self.slot_of(hash);
        if self.keys[idx] == NO_VALUE {
            self.keys[idx] = hash;
            self.lists[idx] = self.pool.alloc_with(&[mixed]);
            self.len += 1;
        } else {
            self.lists[idx] = self.pool.push(self.lists[idx], mixed);
        }
    }

    pub(crate) fn replace(&mut self, hash: i32, old: i32, new: i32) {
        debug_assert_ne!(hash, NO_VALUE);
        self.grow_if_needed();
        let idx = self.slot_of(hash);
        if self.keys[idx] == NO_VALUE {
            self.keys[idx] = hash;
            self.lists[idx] = self.pool.alloc_with(&[new]);
            self.len += 1;
        } else if !self.pool.replace(self.lists[idx], old, new) {
            self.lists[idx] = self.pool.push(self.lists[idx], new);
        }
    }

    pub(crate) fn get(&self, hash: i32) -> Option<&[i32]> {
        let idx = self.slot_of(hash);
        if self.keys[idx] == NO_VALUE {
            None
        } else {
            Some(self.pool.items(self.lists[idx]))
        }
    }

    /// Double the slot table once the load factor passes 3/4. Rebuilding
    /// also compacts the pool, dropping blocks orphaned by list relocation.
    fn grow_if_needed(&mut self) {
        if (self.len + 1) * 4 <= self.keys.len() * 3 {
            return;
        }
        let mut grown = OffsetColumn::with_slots(self.keys.len() * 2);
        for i in 0..self.keys.len() {
            let hash = self.keys[i];
            if hash == NO_VALUE {
                continue;
            }
            let idx = grown.slot_of(hash);
            grown.keys[idx] = hash;
            grown.lists[idx] = grown.pool.alloc_with(self.pool.items(self.lists[i]));
            grown.len += 1;
        }
        *self = grown;
    }
}

/// Bump storage for offset lists: one `Vec<i32>` holding `[cap, len,
/// items…]` blocks addressed by handle.
struct ListPool {
    data: Vec<i32>,
}

impl ListPool {
    fn new() -> Self {
        Self { data: Vec::new() }
    }

    fn alloc(&mut self, cap: usize) -> u32 {
        let handle = self.data.len() as u32;
        self.data.push(cap as i32);
        self.data.push(0);
        self.data.resize(self.data.len() + cap, 0);
        handle
    }

    fn alloc_with(&mut self, items: &[i32]) -> u32 {
        let handle = self.alloc(items.len().max(1));
        let h = handle as usize;
        self.data[h + 1] = items.len() as i32;
        self.data[h + 2..h + 2 + items.len()].copy_from_slice(items);
        handle
    }

    /// Append `value` to the block at `handle`, relocating to a doubled
    /// block when full. Returns the block's (possibly new) handle.
    fn push(&mut self, handle: u32, value: i32) -> u32 {
        let h = handle as usize;
        let cap = self.data[h] as usize;
        let len = self.data[h + 1] as usize;
        if len < cap {
            self.data[h + 2 + len] = value;
            self.data[h + 1] = (len + 1) as i32;
            return handle;
        }

        let new_handle = self.alloc(cap * 2);
        let nh = new_handle as usize;
        self.data.copy_within(h + 2..h + 2 + len, nh + 2);
        self.data[nh + 2 + len] = value;
        self.data[nh + 1] = (len + 1) as i32;
        new_handle
    }

    fn items(&self, handle: u32) -> &[i32] {
        let h = handle as usize;
        let len = self.data[h + 1] as usize;
        &self.data[h + 2..h + 2 + len]
    }

    /// Substitute the first occurrence of `old` with `new`; false if absent.
    fn replace(&mut self, handle: u32, old: i32, new: i32) -> bool {
        let h = handle as usize;
        let len = self.data[h + 1] as usize;
        for slot in &mut self.data[h + 2..h + 2 + len] {
            if *slot == old {
                *slot = new;
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_returns_none() {
        let map = HashOffsets::new(1);
        assert!(map.get(42, 0).is_none());
    }

    #[test]
    fn test_put_then_get() {
        let mut map = HashOffsets::new(1);
        map.put(42, 7, 0);
        assert_eq!(map.get(42, 0), Some(&[7][..]));
    }

    #[test]
    fn test_put_preserves_insertion_order() {
        let mut map = HashOffsets::new(1);
        map.put(42, 1, 0);
        map.put(42, 9, 0);
        map.put(42, 3, 0);
        assert_eq!(map.get(42, 0), Some(&[1, 9, 3][..]));
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut map = HashOffsets::new(1);
        map.put(5, 8, 0);
        map.put(5, 8, 0);
        assert_eq!(map.get(5, 0), Some(&[8, 8][..]));
    }

    #[test]
    fn test_replace_in_place_keeps_order() {
        let mut map = HashOffsets::new(1);
        map.put(42, 1, 0);
        map.put(42, 2, 0);
        map.put(42, 3, 0);
        map.replace(42, 2, 20, 0);
        assert_eq!(map.get(42, 0), Some(&[1, 20, 3][..]));
    }

    #[test]
    fn test_replace_missing_value_appends() {
        let mut map = HashOffsets::new(1);
        map.put(42, 1, 0);
        map.replace(42, 99, 2, 0);
        assert_eq!(map.get(42, 0), Some(&[1, 2][..]));
    }

    #[test]
    fn test_replace_missing_key_inserts() {
        let mut map = HashOffsets::new(1);
        map.replace(42, 99, 7, 0);
        assert_eq!(map.get(42, 0), Some(&[7][..]));
        assert_eq!(map.size(), 1);
    }

    #[test]
    fn test_probe_chain_collisions() {
        // With 16 initial slots, hashes 1, 17 and 33 all land on slot 1 and
        // must chain linearly without clobbering each other.
        let mut map = HashOffsets::new(1);
        map.put(1, 10, 0);
        map.put(17, 20, 0);
        map.put(33, 30, 0);
        assert_eq!(map.get(1, 0), Some(&[10][..]));
        assert_eq!(map.get(17, 0), Some(&[20][..]));
        assert_eq!(map.get(33, 0), Some(&[30][..]));
        assert_eq!(map.size(), 3);
    }

    #[test]
    fn test_growth_keeps_all_entries() {
        let mut map = HashOffsets::new(1);
        for hash in 0..1000 {
            map.put(hash, hash * 2, 0);
        }
        assert_eq!(map.size(), 1000);
        for hash in 0..1000 {
            assert_eq!(map.get(hash, 0), Some(&[hash * 2][..]));
        }
    }

    #[test]
    fn test_long_lists_relocate_and_survive_growth() {
        let mut map = HashOffsets::new(1);
        // Interleave two keys so list relocation has to skip over foreign
        // blocks in the pool.
        for i in 0..50 {
            map.put(7, i, 0);
            map.put(8, 1000 + i, 0);
        }
        let expected_a: Vec<i32> = (0..50).collect();
        let expected_b: Vec<i32> = (1000..1050).collect();
        assert_eq!(map.get(7, 0), Some(&expected_a[..]));
        assert_eq!(map.get(8, 0), Some(&expected_b[..]));

        // Force a rehash and re-check.
        for hash in 100..200 {
            map.put(hash, hash, 0);
        }
        assert_eq!(map.get(7, 0), Some(&expected_a[..]));
        assert_eq!(map.get(8, 0), Some(&expected_b[..]));
    }

    #[test]
    fn test_columns_are_independent() {
        let mut map = HashOffsets::new(3);
        map.put(42, 1, 0);
        map.put(42, 2, 1);
        assert_eq!(map.get(42, 0), Some(&[1][..]));
        assert_eq!(map.get(42, 1), Some(&[2][..]));
        assert!(map.get(42, 2).is_none());
        assert_eq!(map.size(), 2);
    }

    #[test]
    fn test_negative_hashes() {
        let mut map = HashOffsets::new(1);
        map.put(-7, 1, 0);
        map.put(i32::MAX, 2, 0);
        assert_eq!(map.get(-7, 0), Some(&[1][..]));
        assert_eq!(map.get(i32::MAX, 0), Some(&[2][..]));
    }

    #[test]
    fn test_size_counts_keys_not_offsets() {
        let mut map = HashOffsets::new(2);
        map.put(1, 1, 0);
        map.put(1, 2, 0);
        map.put(1, 3, 0);
        map.put(2, 1, 1);
        assert_eq!(map.size(), 2);
    }
}
