//! Unified error handling for the rendezvous search.
//!
//! Errors are grouped by how far they propagate:
//! - row-level (`Parse`) errors drop the offending row and never leave the shard
//! - shard-level (`ShardIo`, `EmptyShard`) errors exclude one shard from the global fold
//! - `Config` errors are fatal at startup
//! - `NoRendezvous` reports a global result that is still the sentinel

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for rendezvous operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RendezvousError {
    /// A single row could not be parsed
    #[error("Malformed row: {message}")]
    Parse { message: String },

    /// A shard file could not be opened or read
    #[error("Shard '{}' could not be read: {message}", path.display())]
    ShardIo { path: PathBuf, message: String },

    /// A shard produced no window with two distinct vessels
    #[error("Shard '{}' produced no candidate pair", path.display())]
    EmptyShard { path: PathBuf },

    /// Invalid geofence, window or worker parameters
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A result file could not be written
    #[error("Cannot write '{}': {message}", path.display())]
    Output { path: PathBuf, message: String },

    /// Every shard failed or was empty
    #[error("No rendezvous found across {shards_total} shards ({shards_failed} failed)")]
    NoRendezvous {
        shards_total: usize,
        shards_failed: usize,
    },
}

impl RendezvousError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        RendezvousError::Config {
            message: message.into(),
        }
    }

    pub(crate) fn shard_io(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        RendezvousError::ShardIo {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for rendezvous operations.
pub type Result<T> = std::result::Result<T, RendezvousError>;

/// Extension trait for converting Option to RendezvousError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a configuration error.
    fn ok_or_config(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_config(self, message: &str) -> Result<T> {
        self.ok_or_else(|| RendezvousError::config(message))
    }
}
