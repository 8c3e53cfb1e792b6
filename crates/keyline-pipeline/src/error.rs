//! Error type for pipeline runs.

use keyline_cache::CacheError;
use keyline_geometry::GeometryError;
use keyline_index::IndexError;
use keyline_model::ErrorKind;
use keyline_raster::RasterError;
use std::path::PathBuf;
use thiserror::Error;

/// Any failure of a pipeline run.
///
/// Collaborator errors are wrapped transparently so the originating error
/// and its message reach the caller unchanged.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    /// The tile index returned nothing for the AOI.
    #[error(
        "No {collection} tiles found for bbox={bbox:?} at gsd={gsd}. \
         Check that the AOI is within Swiss territory."
    )]
    NoData {
        collection: String,
        bbox: [f64; 4],
        gsd: f64,
    },

    /// Writing or removing an output file failed.
    #[error("I/O error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Storage {
            path: path.into(),
            source,
        }
    }

    /// Taxonomy classification, delegated to the wrapped error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Geometry(e) => e.kind(),
            PipelineError::Cache(e) => e.kind(),
            PipelineError::Index(e) => e.kind(),
            PipelineError::Raster(e) => e.kind(),
            PipelineError::NoData { .. } => ErrorKind::NoData,
            PipelineError::Storage { .. } => ErrorKind::Storage,
        }
    }
}
