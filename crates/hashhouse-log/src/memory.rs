//! In-Memory Log Engine
//!
//! A complete [`LogEngine`] implementation backed by plain vectors, for
//! fast isolated tests and for embedders that want the table's semantics
//! without any durability.
//!
//! ## Behavior
//!
//! - Topics are auto-created on first write
//! - Offsets are dense, starting at 0, assigned in append order
//! - Every topic is a single partition (partition id 0)
//! - Records appended without an explicit timestamp are stored with `-1`;
//!   the engine never invents wall-clock time, which keeps tests
//!   deterministic
//! - `read` returns a batch that begins up to two records *before* the
//!   requested offset. Real log engines return whole stored batches, so
//!   callers must scan for the exact offset they asked for; starting early
//!   keeps that scan honest in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use hashhouse_core::{Compression, LogRecord, NewRecord};
use tokio::sync::RwLock;

use crate::{AppendInfo, AppendResults, FetchResults, LogEngine, RecordFn, Result};

/// How many records before the requested offset a fetch batch may include.
const FETCH_LOOKBACK: i64 = 2;

/// In-memory, single-partition log engine.
#[derive(Default)]
pub struct MemoryLog {
    topics: RwLock<HashMap<String, Vec<LogRecord>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records physically appended to `topic`. Zero for unknown
    /// topics. Tests use this to assert write elision.
    pub async fn record_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .await
            .get(topic)
            .map(|r| r.len())
            .unwrap_or(0)
    }

    /// Raw copy of every record in `topic`, in offset order.
    pub async fn records(&self, topic: &str) -> Vec<LogRecord> {
        self.topics
            .read()
            .await
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    fn slice_from(records: &[LogRecord], from_offset: i64) -> &[LogRecord] {
        if from_offset <= 0 {
            return records;
        }
        if from_offset as usize >= records.len() {
            return &[];
        }
        &records[from_offset as usize..]
    }
}

#[async_trait]
impl LogEngine for MemoryLog {
    async fn write(
        &self,
        topic: &str,
        records: Vec<NewRecord>,
        _compression: Compression,
    ) -> AppendResults {
        let mut topics = self.topics.write().await;
        let log = topics.entry(topic.to_string()).or_default();

        let first_offset = log.len() as i64;
        let num_messages = records.len() as i32;
        for (i, rec) in records.into_iter().enumerate() {
            log.push(LogRecord::new(
                first_offset + i as i64,
                rec.key,
                rec.value,
                rec.timestamp.unwrap_or(-1),
            ));
        }

        vec![(
            0,
            Ok(AppendInfo {
                first_offset,
                last_offset: first_offset + num_messages as i64 - 1,
                num_messages,
            }),
        )]
    }

    async fn read(&self, topic: &str, offset: i64, max_bytes: usize) -> FetchResults {
        let topics = self.topics.read().await;
        let Some(log) = topics.get(topic) else {
            return vec![(0, Ok(Vec::new()))];
        };
        if offset < 0 || offset as usize >= log.len() {
            return vec![(0, Ok(Vec::new()))];
        }

        let start = (offset - FETCH_LOOKBACK).max(0) as usize;
        let mut batch = Vec::new();
        let mut bytes = 0usize;
        for rec in &log[start..] {
            // The batch always covers the requested offset; beyond it, the
            // byte budget applies.
            if rec.offset > offset && bytes + rec.estimated_size() > max_bytes {
                break;
            }
            bytes += rec.estimated_size();
            batch.push(rec.clone());
        }

        vec![(0, Ok(batch))]
    }

    async fn iterate_over(
        &self,
        topic: &str,
        from_offset: i64,
        _max_bytes: usize,
        op: RecordFn<'_>,
    ) -> Result<()> {
        let records = {
            let topics = self.topics.read().await;
            topics
                .get(topic)
                .map(|log| Self::slice_from(log, from_offset).to_vec())
                .unwrap_or_default()
        };
        for rec in &records {
            op(rec.offset, rec);
        }
        Ok(())
    }

    async fn read_once(
        &self,
        topic: &str,
        from_offset: i64,
        max_bytes: usize,
        op: RecordFn<'_>,
    ) -> Result<()> {
        let batch = {
            let topics = self.topics.read().await;
            let Some(log) = topics.get(topic) else {
                return Ok(());
            };
            let mut batch = Vec::new();
            let mut bytes = 0usize;
            for rec in Self::slice_from(log, from_offset) {
                bytes += rec.estimated_size();
                if !batch.is_empty() && bytes > max_bytes {
                    break;
                }
                batch.push(rec.clone());
            }
            batch
        };
        for rec in &batch {
            op(rec.offset, rec);
        }
        Ok(())
    }
}
