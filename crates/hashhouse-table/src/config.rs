//! Table Configuration
//!
//! Controls the table's caching, fetch sizing and optional time index:
//!
//! - **cache_size**: per-topic FIFO value cache capacity (default: 10 000)
//! - **fetch_max_bytes**: byte bound for point-read fetch windows and for
//!   the startup loaders' streaming chunks (default: 1 MiB)
//! - **with_time_to_key**: build the timestamp→key index at startup and
//!   serve `get_key_by_time` (default: off; writes maintain the index either
//!   way, reads just return absent without it)
//! - **compression**: passed through to the log engine on every append
//!
//! ## Usage
//!
//! ```ignore
//! use hashhouse_table::TableConfig;
//!
//! let config = TableConfig {
//!     with_time_to_key: true,
//!     ..Default::default()
//! };
//! ```

use hashhouse_core::Compression;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Per-topic value cache capacity in entries (default: 10 000)
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    /// Maximum bytes per fetch window (default: 1 MiB)
    #[serde(default = "default_fetch_max_bytes")]
    pub fetch_max_bytes: usize,

    /// Whether `get_key_by_time` is served (default: false)
    #[serde(default)]
    pub with_time_to_key: bool,

    /// Compression requested from the log engine (default: none)
    #[serde(default)]
    pub compression: Compression,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            cache_size: default_cache_size(),
            fetch_max_bytes: default_fetch_max_bytes(),
            with_time_to_key: false,
            compression: Compression::default(),
        }
    }
}

fn default_cache_size() -> usize {
    10_000
}

fn default_fetch_max_bytes() -> usize {
    1024 * 1024 // 1 MiB
}
