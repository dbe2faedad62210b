//! HashHouse Core Types
//!
//! This crate defines the shared vocabulary of HashHouse - the types that
//! cross the boundary between the table engine and the log engine it sits on.
//!
//! ## What Lives Here
//!
//! - **Records** ([`LogRecord`], [`NewRecord`]): the unit of data in every
//!   log topic, modeled after a stream message (offset, timestamp, optional
//!   key, optional value). A record with no value is a tombstone.
//! - **Mixed offsets** ([`offset`]): every topic is physically split into a
//!   snapshot file and a post file. A mixed offset packs which file a record
//!   lives in together with its 31-bit position into a single `i32`, so the
//!   in-memory index can store plain primitive integers.
//! - **Key hashing** ([`key_hash`]): the stable 32-bit hash that keys are
//!   indexed under. It is persisted in index logs, so it can never change.
//!
//! ## Design Decisions
//!
//! - Uses `bytes::Bytes` for keys and values (zero-copy clones into caches)
//! - No I/O and no async here - pure data and pure functions
//! - `i32`/`i64` throughout to match the on-disk index record format

pub mod hash;
pub mod offset;
pub mod record;

pub use hash::key_hash;
pub use offset::{from_mixed, to_mixed, FileSelector, FILE_HEADER_BITS, MAX_RAW_OFFSET};
pub use record::{Compression, LogRecord, NewRecord};
