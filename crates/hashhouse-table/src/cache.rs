//! Per-Topic FIFO Value Cache
//!
//! A small bounded cache from key hash to the most recently written (or
//! read) value for that hash, consulted before any log fetch.
//!
//! ## Why FIFO?
//!
//! Eviction is strict insertion order - oldest in, first out - regardless
//! of how often an entry is hit. The cache's job is not working-set
//! tracking; it is (a) short-circuiting reads of recently written keys and
//! (b) carrying the previous mixed offset of a key so the write path can
//! replace it in the index instead of growing the offset list. Both favor
//! recency of *insertion*, and FIFO keeps eviction O(1) with no bookkeeping
//! on the read path.
//!
//! Re-inserting an existing key hash updates the entry in place and keeps
//! its original queue position.
//!
//! ## Statistics
//!
//! Every lookup is counted as a hit or a miss; `hit_rate` / `miss_rate` /
//! `read_count` expose the counters per topic and `reset_hit_rate` clears
//! them. Counters are atomics, so statistics reads never contend with the
//! map lock.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::Mutex;

/// A cached value: the payload plus where its record lives in the log.
///
/// The full key rides along because the cache is keyed by hash: a lookup
/// for a key that merely *shares* a hash with the cached one must miss, not
/// serve the other key's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedValue {
    pub key: Bytes,
    pub value: Bytes,
    pub timestamp: i64,
    pub mixed_offset: i32,
}

/// Insertion-order bounded cache from key hash to [`CachedValue`].
pub struct ValueCache {
    capacity: usize,
    inner: Mutex<Inner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

struct Inner {
    map: HashMap<i32, CachedValue>,
    queue: VecDeque<i32>,
}

impl ValueCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                queue: VecDeque::new(),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up `key_hash`, counting the call as a hit or a miss.
    ///
    /// An entry under the right hash but for a *different* key (a hash
    /// collision) counts - and behaves - as a miss.
    ///
    /// Returns a copy; callers may recycle their buffers freely.
    pub async fn get(&self, key_hash: i32, key: &[u8]) -> Option<CachedValue> {
        let inner = self.inner.lock().await;
        match inner.map.get(&key_hash) {
            Some(entry) if entry.key.as_ref() == key => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or update `key_hash`. New keys evict the oldest entry once
    /// the cache is at capacity; existing keys keep their queue position.
    pub async fn put(&self, key_hash: i32, value: CachedValue) {
        let mut inner = self.inner.lock().await;
        if inner.map.insert(key_hash, value).is_none() {
            inner.queue.push_back(key_hash);
            if inner.queue.len() > self.capacity {
                if let Some(oldest) = inner.queue.pop_front() {
                    inner.map.remove(&oldest);
                }
            }
        }
    }

    /// Evict every entry whose key hash appears in `key_hashes`.
    pub async fn remove(&self, key_hashes: &[i32]) {
        let mut inner = self.inner.lock().await;
        let mut removed = false;
        for kh in key_hashes {
            removed |= inner.map.remove(kh).is_some();
        }
        if removed {
            let map = &inner.map;
            let retained: VecDeque<i32> = inner.queue.iter().copied().filter(|kh| map.contains_key(kh)).collect();
            inner.queue = retained;
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.map.len()
    }

    /// Fraction of lookups since the last reset that hit, in `[0, 1]`.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn miss_rate(&self) -> f64 {
        let total = self.read_count();
        if total == 0 {
            0.0
        } else {
            1.0 - self.hit_rate()
        }
    }

    /// Total lookups since the last reset.
    pub fn read_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed) + self.misses.load(Ordering::Relaxed)
    }

    pub fn reset_hit_rate(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}
