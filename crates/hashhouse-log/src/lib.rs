//! HashHouse Log-Engine Contract
//!
//! The table engine does not own any durable storage. It sits on top of an
//! append-only record log service - a system of named topics to which record
//! batches are appended and from which they are fetched by offset - and
//! consumes it through the narrow [`LogEngine`] trait defined here.
//!
//! ## Why a Trait?
//!
//! The log engine is the single abstraction boundary of the system. The
//! table cares about four operations only:
//!
//! - `write`: append a batch, learn the offsets it was assigned
//! - `read`: fetch a bounded batch of records at (or just before) an offset
//! - `iterate_over`: stream every record from an offset onward
//! - `read_once`: fetch a single bounded batch and stop
//!
//! Everything else the log service does - partitioning, retention,
//! compression, replication, retries - stays behind this seam. Implementors
//! are the retry boundary; the table performs no retries of its own.
//!
//! ## Implementations
//!
//! - [`MemoryLog`]: a complete in-memory engine, used by the test suites and
//!   by hosts that want table semantics without durability.
//!
//! ## Thread Safety
//!
//! Implementations must be `Send + Sync`; the table consumes the engine as
//! `Arc<dyn LogEngine>` and may call it concurrently from reader tasks.

pub mod error;
pub mod memory;

pub use error::{LogError, Result};
pub use memory::MemoryLog;

use async_trait::async_trait;
use hashhouse_core::{Compression, LogRecord, NewRecord};

/// What the log engine reports back for one appended batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendInfo {
    /// Offset assigned to the first record of the batch.
    pub first_offset: i64,
    /// Offset assigned to the last record of the batch.
    pub last_offset: i64,
    /// Number of records appended.
    pub num_messages: i32,
}

/// Per-partition outcome of an append. A topic may be spread over several
/// partitions; each reports independently.
pub type AppendResults = Vec<(u32, Result<AppendInfo>)>;

/// Per-partition outcome of a fetch: a batch of records in offset order.
///
/// The batch starts *at or before* the requested offset - engines are free
/// to return whole stored batches, so callers scan forward for the exact
/// offset they asked for.
pub type FetchResults = Vec<(u32, Result<Vec<LogRecord>>)>;

/// Callback invoked per record by the streaming read operations.
pub type RecordFn<'a> = &'a mut (dyn FnMut(i64, &LogRecord) + Send);

/// The append-only record log the table engine is built on.
#[async_trait]
pub trait LogEngine: Send + Sync {
    /// Append `records` to `topic` in order.
    ///
    /// Returns one `(partition, AppendInfo)` entry per partition the batch
    /// landed on. A failed partition reports its error in place; callers
    /// decide whether to treat the batch as appended.
    async fn write(
        &self,
        topic: &str,
        records: Vec<NewRecord>,
        compression: Compression,
    ) -> AppendResults;

    /// Fetch a batch of up to `max_bytes` worth of records containing
    /// `offset`.
    ///
    /// The returned batch may begin before `offset`; it covers `offset`
    /// whenever that offset exists in the topic. An unknown topic or an
    /// offset past the end reads as an empty batch.
    async fn read(&self, topic: &str, offset: i64, max_bytes: usize) -> FetchResults;

    /// Stream every record of `topic` from `from_offset` to the current end,
    /// invoking `op(offset, record)` for each, fetching internally in
    /// `max_bytes`-bounded chunks.
    async fn iterate_over(
        &self,
        topic: &str,
        from_offset: i64,
        max_bytes: usize,
        op: RecordFn<'_>,
    ) -> Result<()>;

    /// Like [`LogEngine::iterate_over`] but delivers a single bounded batch
    /// and stops.
    async fn read_once(
        &self,
        topic: &str,
        from_offset: i64,
        max_bytes: usize,
        op: RecordFn<'_>,
    ) -> Result<()>;
}
