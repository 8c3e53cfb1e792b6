//! Error types for AOI normalisation.

use keyline_model::{ErrorKind, ModelError};
use thiserror::Error;

/// Errors that can occur while normalising an AOI.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// Ambiguous or missing AOI source.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unsupported geometry type, malformed coordinates, or invalid topology.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// AOI does not intersect the supported territory at all.
    #[error(
        "AOI bbox {bbox:?} appears to be outside Swiss territory (LV95 bounds: {reference:?}). \
         Check your CRS and coordinates."
    )]
    OutOfDomain {
        /// AOI extent in LV95.
        bbox: [f64; 4],
        /// Reference territory extent in LV95.
        reference: [f64; 4],
    },
}

impl GeometryError {
    /// Taxonomy classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GeometryError::InvalidInput(_) => ErrorKind::InvalidInput,
            GeometryError::InvalidGeometry(_) => ErrorKind::InvalidGeometry,
            GeometryError::OutOfDomain { .. } => ErrorKind::OutOfDomain,
        }
    }
}

impl From<ModelError> for GeometryError {
    fn from(err: ModelError) -> Self {
        GeometryError::InvalidGeometry(err.to_string())
    }
}
