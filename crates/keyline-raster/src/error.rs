//! Error types for raster operations.

use keyline_model::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while processing DEM rasters.
#[derive(Debug, Error)]
pub enum RasterError {
    /// I/O error on a raster or scratch file.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// TIFF decoding error.
    #[error("TIFF decode error in {}: {source}", path.display())]
    TiffDecode {
        /// Raster being decoded.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: tiff::TiffError,
    },

    /// External tool could not be started.
    #[error("{tool} is not available: {source}")]
    ToolUnavailable {
        /// Program name.
        tool: String,
        /// Spawn error.
        #[source]
        source: std::io::Error,
    },

    /// External tool exited unsuccessfully.
    #[error("{tool} failed ({status}): {stderr}")]
    ToolFailed {
        /// Program name.
        tool: String,
        /// Exit status description.
        status: String,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// Contour output could not be interpreted.
    #[error("Invalid contour output: {0}")]
    InvalidContours(String),

    /// Mosaic requested from an empty tile list.
    #[error("No tile paths provided for mosaic construction")]
    NoTiles,

    /// Clipped raster holds no valid elevation.
    #[error("Raster {} contains no valid elevation values", path.display())]
    EmptyRaster {
        /// Raster path.
        path: PathBuf,
    },
}

impl RasterError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RasterError::Io {
            path: path.into(),
            source,
        }
    }

    /// Taxonomy classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RasterError::Io { .. } => ErrorKind::Storage,
            RasterError::NoTiles | RasterError::EmptyRaster { .. } => ErrorKind::NoData,
            RasterError::TiffDecode { .. }
            | RasterError::ToolUnavailable { .. }
            | RasterError::ToolFailed { .. }
            | RasterError::InvalidContours(_) => ErrorKind::Raster,
        }
    }
}
