//! Error types for the model crate, plus the pipeline-wide error taxonomy.

use thiserror::Error;

/// Errors raised when a value object fails validation at construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Bounding box with inverted or degenerate extents.
    #[error("Invalid bounding box: {0}")]
    InvalidBoundingBox(String),

    /// Processing parameter outside its allowed range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Unknown coordinate system code or name.
    #[error("Unsupported coordinate system: {0}")]
    UnsupportedCoordinateSystem(String),

    /// Unknown resolution tier.
    #[error("Unsupported resolution: {0}")]
    UnsupportedResolution(String),
}

/// Classification of every failure a pipeline run can surface.
///
/// Each crate keeps its own error enum; this is the common vocabulary callers
/// use to decide whether an error is their fault, retryable, or fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Ambiguous or missing AOI source, or invalid parameters. Caller error.
    InvalidInput,
    /// Malformed or topologically invalid AOI. Caller error.
    InvalidGeometry,
    /// AOI outside the supported territory. Caller error.
    OutOfDomain,
    /// Network or remote index failure. Retryable by the caller.
    Transport,
    /// Checksum mismatch on a downloaded tile. Fatal for that tile.
    Integrity,
    /// No tiles (or no valid elevation) for the AOI.
    NoData,
    /// Filesystem failure.
    Storage,
    /// External raster tool failure.
    Raster,
}

impl ErrorKind {
    /// Whether a caller may reasonably retry the same request with backoff.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transport)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::InvalidGeometry => "InvalidGeometry",
            ErrorKind::OutOfDomain => "OutOfDomain",
            ErrorKind::Transport => "TransportError",
            ErrorKind::Integrity => "IntegrityError",
            ErrorKind::NoData => "NoDataError",
            ErrorKind::Storage => "StorageError",
            ErrorKind::Raster => "RasterError",
        };
        f.write_str(name)
    }
}
