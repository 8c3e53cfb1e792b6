//! Error types for tile discovery.

use keyline_model::ErrorKind;
use thiserror::Error;

/// Errors that can occur while querying a tile index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Connection failure, timeout or non-success HTTP status.
    #[error("Tile index request to {url} failed: {reason}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Response body could not be decoded as a STAC item collection.
    #[error("Tile index response from {url} is not a valid item collection: {reason}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Decoder message.
        reason: String,
    },

    /// Pagination did not terminate.
    #[error("Tile index pagination exceeded {0} pages")]
    TooManyPages(usize),
}

impl IndexError {
    /// Taxonomy classification of this error.
    ///
    /// Every index failure is a remote failure the caller may retry.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Transport
    }
}
