//! Record Data Structures
//!
//! This module defines the two record shapes that move between the table
//! engine and the log engine.
//!
//! ## LogRecord vs NewRecord
//!
//! - [`LogRecord`] is what the log engine hands back: it carries the offset
//!   the engine assigned at append time.
//! - [`NewRecord`] is what callers hand to the log engine: no offset yet,
//!   and the timestamp is optional (the engine may stamp one, or leave it
//!   unset).
//!
//! ## Tombstones
//!
//! A record whose value is absent is a tombstone: it marks the key deleted
//! as of that offset. Readers that land on a tombstone report the key as
//! absent.
//!
//! ## Example
//! ```ignore
//! let rec = NewRecord::keyed(Bytes::from("alice"), Bytes::from("100"), Some(10));
//! assert!(rec.value.is_some());
//!
//! let tomb = NewRecord::tombstone(Bytes::from("alice"));
//! assert!(tomb.value.is_none());
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A record as stored in (and read back from) a log topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Offset of this record within its topic, assigned by the log engine
    pub offset: i64,

    /// Optional key
    pub key: Option<Bytes>,

    /// Value (payload); `None` marks a tombstone
    pub value: Option<Bytes>,

    /// Timestamp in milliseconds since epoch; negative means unset
    pub timestamp: i64,
}

impl LogRecord {
    pub fn new(offset: i64, key: Option<Bytes>, value: Option<Bytes>, timestamp: i64) -> Self {
        Self {
            offset,
            key,
            value,
            timestamp,
        }
    }

    /// Whether this record carries a value (i.e. is not a tombstone).
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Estimate the size of this record in bytes, as the log engine counts
    /// it when bounding fetch batches.
    pub fn estimated_size(&self) -> usize {
        8 + // offset
        8 + // timestamp
        self.key.as_ref().map(|k| k.len()).unwrap_or(0) +
        self.value.as_ref().map(|v| v.len()).unwrap_or(0)
    }
}

/// A record to be appended, before the log engine has assigned an offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    /// Optional key
    pub key: Option<Bytes>,

    /// Value (payload); `None` appends a tombstone
    pub value: Option<Bytes>,

    /// Explicit timestamp, or `None` to leave it to the engine
    pub timestamp: Option<i64>,
}

impl NewRecord {
    /// A keyed record with a value.
    pub fn keyed(key: Bytes, value: Bytes, timestamp: Option<i64>) -> Self {
        Self {
            key: Some(key),
            value: Some(value),
            timestamp,
        }
    }

    /// A tombstone for `key`: a record with no value.
    pub fn tombstone(key: Bytes) -> Self {
        Self {
            key: Some(key),
            value: None,
            timestamp: None,
        }
    }

    pub fn estimated_size(&self) -> usize {
        8 + 8
            + self.key.as_ref().map(|k| k.len()).unwrap_or(0)
            + self.value.as_ref().map(|v| v.len()).unwrap_or(0)
    }
}

/// Compression applied to record batches by the log engine.
///
/// The table engine only passes this through; whether and how batches are
/// compressed is the log engine's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None = 0,
    Lz4 = 1,
}

impl Default for Compression {
    fn default() -> Self {
        Compression::None
    }
}
