//! Error types for the tile cache.

use keyline_model::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while fetching or storing cached artifacts.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Network failure, timeout or non-success HTTP status.
    #[error("Failed to download {url}: {reason}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Downloaded bytes do not match the advertised checksum.
    #[error("Checksum mismatch for tile {item_id}: expected={expected}, got={actual}")]
    Integrity {
        /// Tile item id.
        item_id: String,
        /// Digest advertised by the index (prefix stripped).
        expected: String,
        /// Digest of the downloaded bytes.
        actual: String,
    },

    /// Filesystem failure below the cache root.
    #[error("Storage error at {}: {source}", path.display())]
    Storage {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Descriptor cannot be mapped to a safe location under the cache root.
    #[error("Invalid tile descriptor: {0}")]
    InvalidDescriptor(String),

    /// Download tracker lock was poisoned (a thread panicked while holding it).
    #[error("Download tracker lock was poisoned")]
    TrackerPoisoned,
}

impl CacheError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Storage {
            path: path.into(),
            source,
        }
    }

    /// Taxonomy classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::Transport { .. } => ErrorKind::Transport,
            CacheError::Integrity { .. } => ErrorKind::Integrity,
            CacheError::Storage { .. }
            | CacheError::InvalidDescriptor(_)
            | CacheError::TrackerPoisoned => ErrorKind::Storage,
        }
    }
}
