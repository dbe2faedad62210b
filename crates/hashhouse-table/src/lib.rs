//! HashHouse Table
//!
//! This crate implements the HashHouse table engine - a hash-indexed
//! key/value overlay kept entirely in RAM on top of an append-only log
//! service.
//!
//! ## What is the Table?
//!
//! For a fixed set of named topics (logical keyspaces), the [`Table`]
//! maintains a mapping from the 32-bit hash of each key to the log offsets
//! where records of that hash were appended. Reads resolve a key by pulling
//! a small window of records at the candidate offsets and selecting the
//! newest whose full key matches. Writes append to the log, update the
//! index and a per-topic value cache, and mirror `(hash, offset)` pairs
//! into an *index log* from which the whole structure is rebuilt at
//! startup.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                    Table                      │
//! │                                               │
//! │  HashOffsets     ValueCache (per topic)       │
//! │  hash → [mixed]  hash → (value, ts, mixed)    │
//! │                                               │
//! │  TimeIndex: timestamp → last key              │
//! └───────────────┬───────────────────────────────┘
//!                 │ Arc<dyn LogEngine>
//!                 ▼
//!   T  /  T~  /  T_idx  /  T~_idx   (per topic)
//! ```
//!
//! ## Main Components
//!
//! - [`HashOffsets`]: compact open-addressed `i32 → [i32]` multimap, one
//!   column per topic
//! - [`ValueCache`]: bounded FIFO cache with hit/miss statistics
//! - [`TimeIndex`]: growable timestamp → key array
//! - [`Table`]: the engine tying them to a [`hashhouse_log::LogEngine`]

pub mod cache;
pub mod config;
pub mod error;
pub mod hash_offsets;
pub mod table;
pub mod time_index;

pub use cache::{CachedValue, ValueCache};
pub use config::TableConfig;
pub use error::{Result, TableError};
pub use hash_offsets::{HashOffsets, NO_VALUE};
pub use table::{index_topic, post_topic, Entry, Table, WriteRecord};
pub use time_index::TimeIndex;
