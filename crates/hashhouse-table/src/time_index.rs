//! Timestamp → Key Index
//!
//! A dynamically grown array mapping a non-negative timestamp to the key
//! most recently written with that timestamp, across every topic of the
//! table. Slots no write has touched read as absent.
//!
//! The array grows by 20% (and at least to `timestamp + 1`) whenever a
//! write lands past the current end, so a monotonically increasing
//! timestamp stream amortizes its growth.

use bytes::Bytes;

/// Growable timestamp → key array; the most recent writer of a timestamp
/// wins.
#[derive(Default)]
pub struct TimeIndex {
    keys: Vec<Option<Bytes>>,
}

impl TimeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key` as the latest writer of `timestamp`. Negative
    /// timestamps mean "unset" and are ignored.
    pub fn put(&mut self, timestamp: i64, key: &Bytes) {
        if timestamp < 0 {
            return;
        }
        let slot = timestamp as usize;
        if slot >= self.keys.len() {
            let grown = (self.keys.len() as f64 * 1.2).ceil() as usize;
            self.keys.resize(grown.max(slot + 1), None);
        }
        self.keys[slot] = Some(key.clone());
    }

    /// The key most recently written with `timestamp`, if any.
    pub fn get(&self, timestamp: i64) -> Option<Bytes> {
        if timestamp < 0 {
            return None;
        }
        self.keys.get(timestamp as usize).cloned().flatten()
    }

    /// Current length of the backing array (not a count of populated slots).
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
