//! # keyline-pipeline
//!
//! End-to-end contour generation for a Swiss area of interest.
//!
//! A [`Pipeline`] owns one instance of each collaborator and runs the linear
//! sequence
//!
//! ```text
//! Start -> AoiNormalized -> TilesDiscovered -> TilesCached -> MosaicBuilt
//!       -> Clipped -> ContoursGenerated -> ManifestWritten -> Done
//! ```
//!
//! Outputs land in a directory derived from the AOI and parameter
//! fingerprints unless the request names one. The directory is held under an
//! advisory lock for the whole run, and `manifest.json` is written last.
//!
//! ## Output layout
//!
//! ```text
//! <output_dir>/mosaic.vrt
//! <output_dir>/dem_clip.tif        (unless discarded)
//! <output_dir>/contours.geojson
//! <output_dir>/manifest.json
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use keyline_cache::{CacheConfig, HttpTransport, TileCache};
//! use keyline_geometry::{AoiSource, GeometryNormalizer, SwissTransform};
//! use keyline_index::StacClient;
//! use keyline_model::ProcessingParameters;
//! use keyline_pipeline::{Pipeline, PipelineRequest};
//! use keyline_raster::GdalEngine;
//!
//! let config = CacheConfig::from_env();
//! let timeout = config.download_timeout;
//! let cache = TileCache::new(config, Box::new(HttpTransport::new(timeout)?));
//! let pipeline = Pipeline::new(
//!     GeometryNormalizer::new(SwissTransform::new()),
//!     Box::new(StacClient::from_env(timeout)?),
//!     cache,
//!     Box::new(GdalEngine::new()),
//! );
//!
//! let request = PipelineRequest::new(
//!     AoiSource::BoundingBox([2_600_000.0, 1_200_000.0, 2_600_500.0, 1_200_500.0]),
//!     ProcessingParameters::default(),
//! );
//! let result = pipeline.run(&request)?;
//! println!("{} contours in {}", result.contour_count, result.contours_path.display());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod canonical;
mod error;
mod pipeline;

pub use canonical::{canonicalize, elevation_range, to_geojson, write_contours, OUTPUT_PRECISION};
pub use error::PipelineError;
pub use pipeline::{
    Pipeline, PipelineRequest, PipelineState, ProcessingResult, CLIPPED_DEM_FILE_NAME,
    CONTOURS_FILE_NAME, MANIFEST_FILE_NAME, MOSAIC_FILE_NAME,
};

/// Result type for pipeline runs.
pub type Result<T> = std::result::Result<T, PipelineError>;
