//! The Table Engine
//!
//! The top-level component: a hash-indexed key/value view over a set of log
//! topics. For each declared topic it keeps, entirely in memory, the
//! [`HashOffsets`] index from key hash to log positions, a FIFO
//! [`ValueCache`], and (shared across topics) a [`TimeIndex`].
//!
//! ## Physical Topics
//!
//! Each declared topic `T` is backed by four physical topics in the log
//! engine; external tooling depends on these exact names:
//!
//! ```text
//! T        snapshot data        T_idx    snapshot index log
//! T~       post data            T~_idx   post index log
//! ```
//!
//! The index logs mirror every data append as a compact
//! `(big-endian key hash, big-endian raw offset)` record; they are what the
//! table replays at startup to rebuild [`HashOffsets`] without touching the
//! (much larger) data logs.
//!
//! ## Read Flow
//!
//! ```text
//! read(key, topic)
//!     ↓
//! value cache ──HIT──→ return
//!     ↓ miss
//! HashOffsets[topic].get(hash(key)) ──absent──→ None
//!     ↓ candidate mixed offsets, newest (tail) first
//! fetch a bounded window at each candidate
//!     ↓
//! exact offset + exact key match? collision → next candidate
//!     ↓
//! tombstone → None, else install in cache and return value
//! ```
//!
//! ## Locking
//!
//! One `RwLock` over the mutable state (index + time index): reads and
//! scans share it, writes and removes take it exclusively and hold it
//! across the log appends - offsets assigned by the engine must be applied
//! to the index in append order, so the append and the index update form
//! one critical section. Startup loaders run before any reader exists.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use hashhouse_core::{from_mixed, key_hash, to_mixed, FileSelector, LogRecord, NewRecord, MAX_RAW_OFFSET};
use hashhouse_log::LogEngine;
use tokio::sync::RwLock;

use crate::cache::{CachedValue, ValueCache};
use crate::config::TableConfig;
use crate::error::{Result, TableError};
use crate::hash_offsets::{HashOffsets, OffsetColumn};
use crate::time_index::TimeIndex;

/// Physical post-file topic name for `topic`.
pub fn post_topic(topic: &str) -> String {
    format!("{topic}~")
}

/// Index-log topic name for a data topic (snapshot or post).
pub fn index_topic(topic: &str) -> String {
    format!("{topic}_idx")
}

/// A value read back from the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub value: Bytes,
    /// Timestamp the record was written with; negative means unset.
    pub timestamp: i64,
}

/// One key/value pair submitted to a write batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub key: Bytes,
    pub value: Bytes,
    /// Timestamp to embed in the record; negative means unset.
    pub timestamp: i64,
}

impl WriteRecord {
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            timestamp: -1,
        }
    }

    pub fn with_timestamp(key: impl Into<Bytes>, value: impl Into<Bytes>, timestamp: i64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            timestamp,
        }
    }
}

/// Mutable state behind the table's reader/writer lock.
struct TableState {
    offsets: HashOffsets,
    time: TimeIndex,
}

/// A surviving record of a write batch, staged between the elision pass and
/// the index update.
struct Staged {
    kh: i32,
    prev_mixed: Option<i32>,
    key: Bytes,
    value: Bytes,
    timestamp: i64,
}

/// Hash-indexed key/value table over an append-only log engine.
pub struct Table {
    log: Arc<dyn LogEngine>,
    topics: Vec<String>,
    columns: HashMap<String, usize>,
    config: TableConfig,
    caches: Vec<ValueCache>,
    state: RwLock<TableState>,
}

impl Table {
    /// Open a table over `topics`, replaying every topic's index logs in
    /// parallel (plus, with `with_time_to_key`, column 0's data logs for
    /// the time index) before returning.
    pub async fn open(
        log: Arc<dyn LogEngine>,
        topics: Vec<String>,
        config: TableConfig,
    ) -> Result<Self> {
        let started = Instant::now();

        let mut loaders = Vec::with_capacity(topics.len());
        for topic in &topics {
            loaders.push(tokio::spawn(load_column(
                log.clone(),
                topic.clone(),
                config.fetch_max_bytes,
            )));
        }
        let time_loader = (config.with_time_to_key && !topics.is_empty()).then(|| {
            tokio::spawn(load_time_index(
                log.clone(),
                topics[0].clone(),
                config.fetch_max_bytes,
            ))
        });

        let mut columns = Vec::with_capacity(topics.len());
        for loader in loaders {
            columns.push(
                loader
                    .await
                    .map_err(|e| TableError::LoadFailed(e.to_string()))??,
            );
        }
        let time = match time_loader {
            Some(loader) => loader
                .await
                .map_err(|e| TableError::LoadFailed(e.to_string()))??,
            None => TimeIndex::new(),
        };

        let offsets = HashOffsets::from_columns(columns);
        tracing::info!(
            topics = topics.len(),
            entries = offsets.size(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "table opened"
        );

        let caches = topics.iter().map(|_| ValueCache::new(config.cache_size)).collect();
        let columns_by_name = topics
            .iter()
            .enumerate()
            .map(|(col, topic)| (topic.clone(), col))
            .collect();

        Ok(Self {
            log,
            topics,
            columns: columns_by_name,
            config,
            caches,
            state: RwLock::new(TableState { offsets, time }),
        })
    }

    /// The topics this table was opened with, in column order.
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Distinct `(topic, key hash)` entries in the in-memory index.
    pub async fn index_size(&self) -> usize {
        self.state.read().await.offsets.size()
    }

    fn column_of(&self, topic: &str) -> Result<usize> {
        self.columns
            .get(topic)
            .copied()
            .ok_or_else(|| TableError::UnknownTopic(topic.to_string()))
    }

    fn data_topic(&self, col: usize, file: FileSelector) -> String {
        match file {
            FileSelector::Snapshot => self.topics[col].clone(),
            FileSelector::Post => post_topic(&self.topics[col]),
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Point read of `key` in `topic`: the newest value, or `None` if the
    /// key was never written or its newest record is a tombstone.
    pub async fn read(&self, key: &[u8], topic: &str) -> Result<Option<Entry>> {
        self.read_inner(key, topic, false).await
    }

    /// Like [`Table::read`], but neither consults nor populates the value
    /// cache.
    pub async fn read_bypass_cache(&self, key: &[u8], topic: &str) -> Result<Option<Entry>> {
        self.read_inner(key, topic, true).await
    }

    async fn read_inner(&self, key: &[u8], topic: &str, bypass_cache: bool) -> Result<Option<Entry>> {
        let col = self.column_of(topic)?;
        let kh = key_hash(key);
        let state = self.state.read().await;

        if !bypass_cache {
            if let Some(hit) = self.caches[col].get(kh, key).await {
                return Ok(Some(Entry {
                    value: hit.value,
                    timestamp: hit.timestamp,
                }));
            }
        }

        let Some(offsets) = state.offsets.get(kh, col) else {
            return Ok(None);
        };

        // Tail first: offsets are kept in insertion order, so the newest
        // record for this key is at the tail-most of its positions.
        'candidates: for &mixed in offsets.iter().rev() {
            let (file, raw) = from_mixed(mixed);
            let source = self.data_topic(col, file);
            for (_partition, fetched) in
                self.log.read(&source, raw, self.config.fetch_max_bytes).await
            {
                let batch = match fetched {
                    Ok(batch) => batch,
                    Err(error) => {
                        tracing::error!(topic = %source, offset = raw, error = %error, "fetch failed");
                        continue;
                    }
                };
                for rec in &batch {
                    if rec.offset != raw {
                        continue;
                    }
                    if rec.key.as_deref() != Some(key) {
                        // Another key shares this hash; its record sits at
                        // this offset. Try the next candidate.
                        tracing::trace!(topic = %source, offset = raw, "hash collision, next candidate");
                        continue 'candidates;
                    }
                    let Some(value) = &rec.value else {
                        // Newest record is a tombstone.
                        return Ok(None);
                    };
                    if !bypass_cache {
                        self.caches[col]
                            .put(
                                kh,
                                CachedValue {
                                    key: Bytes::copy_from_slice(key),
                                    value: value.clone(),
                                    timestamp: rec.timestamp,
                                    mixed_offset: mixed,
                                },
                            )
                            .await;
                    }
                    return Ok(Some(Entry {
                        value: value.clone(),
                        timestamp: rec.timestamp,
                    }));
                }
            }
        }
        Ok(None)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Append `records` to `topic`'s snapshot file. Equivalent to
    /// [`Table::write_snap`].
    pub async fn write(&self, records: Vec<WriteRecord>, topic: &str) -> Result<Vec<usize>> {
        self.write_to(records, topic, FileSelector::Snapshot).await
    }

    /// Append `records` to `topic`'s snapshot file.
    pub async fn write_snap(&self, records: Vec<WriteRecord>, topic: &str) -> Result<Vec<usize>> {
        self.write_to(records, topic, FileSelector::Snapshot).await
    }

    /// Append `records` to `topic`'s post file.
    pub async fn write_post(&self, records: Vec<WriteRecord>, topic: &str) -> Result<Vec<usize>> {
        self.write_to(records, topic, FileSelector::Post).await
    }

    async fn write_to(
        &self,
        records: Vec<WriteRecord>,
        topic: &str,
        file: FileSelector,
    ) -> Result<Vec<usize>> {
        let col = self.column_of(topic)?;
        let mut state = self.state.write().await;

        // Elide records whose value matches the cached one, and capture the
        // previously known offset of every surviving key. Survivors are
        // handed to the log newest-input-first; index updates below walk
        // them in the same order so positions line up.
        let mut staged: Vec<Staged> = Vec::with_capacity(records.len());
        for record in records {
            let kh = key_hash(&record.key);
            let prev = self.caches[col].get(kh, &record.key).await;
            if let Some(prev) = &prev {
                if prev.value == record.value {
                    continue;
                }
            }
            staged.push(Staged {
                kh,
                prev_mixed: prev.map(|p| p.mixed_offset),
                key: record.key,
                value: record.value,
                timestamp: record.timestamp,
            });
        }
        staged.reverse();

        if staged.is_empty() {
            return Ok(Vec::new());
        }

        let data_topic = self.data_topic(col, file);
        let batch: Vec<NewRecord> = staged
            .iter()
            .map(|s| NewRecord {
                key: Some(s.key.clone()),
                value: Some(s.value.clone()),
                timestamp: (s.timestamp >= 0).then_some(s.timestamp),
            })
            .collect();

        let results = self.log.write(&data_topic, batch, self.config.compression).await;
        let mut counts = Vec::with_capacity(results.len());
        for (partition, outcome) in results {
            let info = match outcome {
                Ok(info) => info,
                Err(error) => {
                    tracing::error!(
                        topic = %data_topic,
                        partition,
                        error = %error,
                        "append failed; index not updated"
                    );
                    counts.push(0);
                    continue;
                }
            };
            if info.num_messages == 0 {
                counts.push(0);
                continue;
            }
            if info.last_offset > MAX_RAW_OFFSET {
                tracing::error!(
                    topic = %data_topic,
                    last_offset = info.last_offset,
                    "assigned offsets exceed 31 bits; batch refused"
                );
                return Err(TableError::OffsetOverflow {
                    topic: data_topic,
                    last_offset: info.last_offset,
                });
            }
            assert_eq!(
                info.last_offset,
                info.first_offset + staged.len() as i64 - 1,
                "log engine acknowledged {} records for a batch of {}",
                info.num_messages,
                staged.len()
            );

            let mut index_records = Vec::with_capacity(staged.len());
            for (i, s) in staged.iter().enumerate() {
                let raw = info.first_offset + i as i64;
                let mixed = to_mixed(file, raw);
                match s.prev_mixed {
                    Some(prev) => state.offsets.replace(s.kh, prev, mixed, col),
                    None => state.offsets.put(s.kh, mixed, col),
                }
                self.caches[col]
                    .put(
                        s.kh,
                        CachedValue {
                            key: s.key.clone(),
                            value: s.value.clone(),
                            timestamp: s.timestamp,
                            mixed_offset: mixed,
                        },
                    )
                    .await;
                state.time.put(s.timestamp, &s.key);
                index_records.push(index_record(s.kh, raw));
            }

            counts.push(
                self.append_index_records(&index_topic(&data_topic), index_records)
                    .await,
            );
        }
        Ok(counts)
    }

    /// Remove `keys` from `topic` by appending tombstones to its post file.
    ///
    /// Prior offsets of the removed keys stay in the index; later reads
    /// walk them and stop at the newer tombstone. Reclaiming them is
    /// deferred to an index rebuild.
    pub async fn remove(&self, keys: Vec<Bytes>, topic: &str) -> Result<Vec<usize>> {
        let col = self.column_of(topic)?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut state = self.state.write().await;

        let hashes: Vec<i32> = keys.iter().map(|k| key_hash(k)).collect();
        self.caches[col].remove(&hashes).await;

        let post = self.data_topic(col, FileSelector::Post);
        let batch: Vec<NewRecord> = keys.iter().cloned().map(NewRecord::tombstone).collect();
        let results = self.log.write(&post, batch, self.config.compression).await;
        let mut counts = Vec::with_capacity(results.len());
        for (partition, outcome) in results {
            let info = match outcome {
                Ok(info) => info,
                Err(error) => {
                    tracing::error!(
                        topic = %post,
                        partition,
                        error = %error,
                        "tombstone append failed; index not updated"
                    );
                    counts.push(0);
                    continue;
                }
            };
            if info.num_messages == 0 {
                counts.push(0);
                continue;
            }
            if info.last_offset > MAX_RAW_OFFSET {
                tracing::error!(
                    topic = %post,
                    last_offset = info.last_offset,
                    "assigned offsets exceed 31 bits; batch refused"
                );
                return Err(TableError::OffsetOverflow {
                    topic: post,
                    last_offset: info.last_offset,
                });
            }
            assert_eq!(
                info.last_offset,
                info.first_offset + hashes.len() as i64 - 1,
                "log engine acknowledged {} records for a batch of {}",
                info.num_messages,
                hashes.len()
            );

            let mut index_records = Vec::with_capacity(hashes.len());
            for (i, &kh) in hashes.iter().enumerate() {
                let raw = info.first_offset + i as i64;
                // Appended, never replaced: locating the key's previous
                // offset would cost a read, and the tombstone wins at read
                // time by being tail-most anyway.
                state.offsets.put(kh, to_mixed(FileSelector::Post, raw), col);
                index_records.push(index_record(kh, raw));
            }

            counts.push(
                self.append_index_records(&index_topic(&post), index_records)
                    .await,
            );
        }
        Ok(counts)
    }

    /// Mirror a batch of `(key hash, raw offset)` records into an index
    /// topic, returning how many were written (0 when the append failed).
    async fn append_index_records(&self, topic: &str, records: Vec<NewRecord>) -> usize {
        let count = records.len();
        let results = self.log.write(topic, records, self.config.compression).await;
        let mut ok = true;
        for (partition, outcome) in &results {
            if let Err(error) = outcome {
                tracing::error!(topic = %topic, partition = *partition, error = %error, "index append failed");
                ok = false;
            }
        }
        if ok {
            count
        } else {
            0
        }
    }

    // ------------------------------------------------------------------
    // Scans
    // ------------------------------------------------------------------

    /// Stream every record of `topic` from `fetch_offset` onward through
    /// `op(offset, record)`.
    pub async fn iterate_over<F>(&self, fetch_offset: i64, topic: &str, mut op: F) -> Result<()>
    where
        F: FnMut(i64, &LogRecord) + Send,
    {
        let _state = self.state.read().await;
        self.log
            .iterate_over(topic, fetch_offset, self.config.fetch_max_bytes, &mut op)
            .await?;
        Ok(())
    }

    /// Deliver a single bounded batch of `topic` starting at `fetch_offset`
    /// through `op(offset, record)`.
    pub async fn read_once<F>(&self, fetch_offset: i64, topic: &str, mut op: F) -> Result<()>
    where
        F: FnMut(i64, &LogRecord) + Send,
    {
        let _state = self.state.read().await;
        self.log
            .read_once(topic, fetch_offset, self.config.fetch_max_bytes, &mut op)
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Time index
    // ------------------------------------------------------------------

    /// The key most recently written with `timestamp`, or `None` - always
    /// `None` when the table was opened without `with_time_to_key`.
    ///
    /// The read lock is taken even in the always-`None` case, like every
    /// other read operation.
    pub async fn get_key_by_time(&self, timestamp: i64) -> Option<Bytes> {
        let state = self.state.read().await;
        if !self.config.with_time_to_key {
            return None;
        }
        state.time.get(timestamp)
    }

    /// Record `key` as the latest writer of `timestamp` directly, without
    /// going through a write batch.
    pub async fn put_time_to_key(&self, timestamp: i64, key: &Bytes) {
        self.state.write().await.time.put(timestamp, key);
    }

    // ------------------------------------------------------------------
    // Cache statistics
    // ------------------------------------------------------------------

    pub fn hit_rate(&self, topic: &str) -> Result<f64> {
        Ok(self.caches[self.column_of(topic)?].hit_rate())
    }

    pub fn miss_rate(&self, topic: &str) -> Result<f64> {
        Ok(self.caches[self.column_of(topic)?].miss_rate())
    }

    pub fn read_count(&self, topic: &str) -> Result<u64> {
        Ok(self.caches[self.column_of(topic)?].read_count())
    }

    pub fn reset_hit_rate(&self, topic: &str) -> Result<()> {
        self.caches[self.column_of(topic)?].reset_hit_rate();
        Ok(())
    }
}

/// The `(big-endian key hash, big-endian raw offset)` mirror record written
/// to index topics. The file selector is not encoded: it is implied by
/// which index topic the record lives in.
fn index_record(key_hash: i32, raw_offset: i64) -> NewRecord {
    NewRecord {
        key: Some(Bytes::copy_from_slice(&key_hash.to_be_bytes())),
        value: Some(Bytes::copy_from_slice(&(raw_offset as i32).to_be_bytes())),
        timestamp: None,
    }
}

/// Replay one topic's index logs (snapshot then post) into a fresh column.
async fn load_column(
    log: Arc<dyn LogEngine>,
    topic: String,
    fetch_max_bytes: usize,
) -> Result<OffsetColumn> {
    let mut column = OffsetColumn::new();
    for file in [FileSelector::Snapshot, FileSelector::Post] {
        let source = match file {
            FileSelector::Snapshot => index_topic(&topic),
            FileSelector::Post => index_topic(&post_topic(&topic)),
        };
        let mut loaded = 0u64;
        let mut skipped = 0u64;
        log.iterate_over(&source, 0, fetch_max_bytes, &mut |_offset, rec| {
            let (Some(hash_bytes), Some(offset_bytes)) = (&rec.key, &rec.value) else {
                skipped += 1;
                return;
            };
            let (Ok(hash), Ok(raw)) = (
                <[u8; 4]>::try_from(hash_bytes.as_ref()).map(i32::from_be_bytes),
                <[u8; 4]>::try_from(offset_bytes.as_ref()).map(i32::from_be_bytes),
            ) else {
                skipped += 1;
                return;
            };
            if raw < 0 {
                skipped += 1;
                return;
            }
            column.put(hash, to_mixed(file, raw as i64));
            loaded += 1;
        })
        .await?;
        tracing::debug!(topic = %source, loaded, skipped, "index log replayed");
    }
    Ok(column)
}

/// Replay column 0's data logs (snapshot then post) into a fresh time
/// index. On a timestamp written in both files, the post file's key wins.
async fn load_time_index(
    log: Arc<dyn LogEngine>,
    topic: String,
    fetch_max_bytes: usize,
) -> Result<TimeIndex> {
    let mut index = TimeIndex::new();
    for source in [topic.clone(), post_topic(&topic)] {
        log.iterate_over(&source, 0, fetch_max_bytes, &mut |_offset, rec| {
            let (Some(key), Some(_value)) = (&rec.key, &rec.value) else {
                return;
            };
            index.put(rec.timestamp, key);
        })
        .await?;
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_naming() {
        assert_eq!(post_topic("accounts"), "accounts~");
        assert_eq!(index_topic("accounts"), "accounts_idx");
        assert_eq!(index_topic(&post_topic("accounts")), "accounts~_idx");
    }

    #[test]
    fn test_index_record_encoding() {
        let rec = index_record(0x1234_5678, 0x0A0B_0C0D);
        assert_eq!(rec.key.unwrap().as_ref(), &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(rec.value.unwrap().as_ref(), &[0x0A, 0x0B, 0x0C, 0x0D]);
        assert!(rec.timestamp.is_none());
    }

    #[test]
    fn test_write_record_defaults_timestamp_unset() {
        let rec = WriteRecord::new("k", "v");
        assert_eq!(rec.timestamp, -1);
        let rec = WriteRecord::with_timestamp("k", "v", 10);
        assert_eq!(rec.timestamp, 10);
    }
}
