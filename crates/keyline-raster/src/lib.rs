//! # keyline-raster
//!
//! Raster engine for the keyline pipeline: mosaic cached tiles, clip the
//! mosaic to an AOI, summarise the clipped DEM and extract contour lines.
//!
//! The pipeline only sees the [`RasterEngine`] trait, so its caching and
//! determinism logic can be exercised against a stub. [`GdalEngine`] is the
//! production implementation and drives the GDAL command-line utilities.
//! Statistics are read in-process from the clipped GeoTIFF with the `tiff`
//! crate.

mod contours;
mod error;
mod gdal;
mod stats;

pub use contours::parse_contour_collection;
pub use error::RasterError;
pub use gdal::{buildvrt_args, contour_args, warp_args, GdalEngine, GDALBUILDVRT, GDALWARP, GDAL_CONTOUR};
pub use stats::{raster_stats, UNKNOWN_CRS};

use keyline_model::{Aoi, ContourFeature, ProcessingParameters, RasterStats};
use std::path::{Path, PathBuf};

/// Result type for raster operations.
pub type Result<T> = std::result::Result<T, RasterError>;

/// NoData value written outside the AOI cutline.
pub const DEFAULT_NODATA: f64 = -9999.0;

/// Mosaic, clip and contour operations on local rasters.
pub trait RasterEngine: Send + Sync {
    /// Combine `tiles` into one virtual raster at `dest`.
    ///
    /// Fails with [`RasterError::NoTiles`] on an empty list.
    fn build_mosaic(&self, tiles: &[PathBuf], dest: &Path) -> Result<PathBuf>;

    /// Clip `mosaic` to the AOI geometry, writing a GeoTIFF to `dest`, and
    /// return statistics of the clipped raster.
    fn clip(&self, mosaic: &Path, aoi: &Aoi, nodata: f64, dest: &Path) -> Result<RasterStats>;

    /// Contour lines of `raster` at `params.interval()`.
    ///
    /// Returned features are not yet rounded or ordered.
    fn extract_contours(&self, raster: &Path, params: &ProcessingParameters) -> Result<Vec<ContourFeature>>;
}
