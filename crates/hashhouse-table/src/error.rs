//! Table Error Types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    /// The topic was not in the list the table was constructed with.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// The log engine assigned offsets past the 31-bit range a mixed offset
    /// can carry; the batch's index updates were refused.
    #[error("offsets for topic {topic} exceed 31 bits (last_offset {last_offset})")]
    OffsetOverflow { topic: String, last_offset: i64 },

    #[error("log engine error: {0}")]
    Log(#[from] hashhouse_log::LogError),

    /// A startup index loader task failed to complete.
    #[error("index load failed: {0}")]
    LoadFailed(String),
}

pub type Result<T> = std::result::Result<T, TableError>;
