//! Log-Engine Error Types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("offset {offset} out of range for topic {topic}")]
    OffsetOutOfRange { topic: String, offset: i64 },

    #[error("log backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, LogError>;
