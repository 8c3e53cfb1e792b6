//! # keyline-model
//!
//! Immutable value types shared by every stage of the keyline contour pipeline.
//!
//! All types validate their invariants at construction and expose no setters,
//! so a value that exists is a value that is valid:
//!
//! - [`CoordinateSystem`] / [`Resolution`]: closed sets of supported systems and
//!   swissALTI3D resolution tiers
//! - [`BoundingBox`]: axis-aligned rectangle tagged with its coordinate system
//! - [`Aoi`]: a normalised area of interest (always LV95)
//! - [`TileDescriptor`]: one remotely discoverable elevation tile
//! - [`ProcessingParameters`]: contour-generation configuration
//! - [`RasterStats`] / [`ContourFeature`]: raster engine results
//! - [`ProvenanceManifest`]: the record written after a successful run
//!
//! ## Example
//!
//! ```
//! use keyline_model::{BoundingBox, CoordinateSystem, ProcessingParameters, Resolution};
//!
//! let bbox = BoundingBox::new(2_600_000.0, 1_200_000.0, 2_601_000.0, 1_201_000.0, CoordinateSystem::Lv95)?;
//! assert_eq!(bbox.area(), 1_000_000.0);
//!
//! let params = ProcessingParameters::new(2.0, "elevation", 0.0, Resolution::Standard)?;
//! assert_eq!(params.interval(), 2.0);
//! # Ok::<(), keyline_model::ModelError>(())
//! ```

mod aoi;
mod bbox;
mod crs;
mod error;
mod manifest;
mod numeric;
mod params;
mod raster;
mod tile;

pub use aoi::{Aoi, AoiGeometry};
pub use bbox::BoundingBox;
pub use crs::{CoordinateSystem, Resolution};
pub use error::{ErrorKind, ModelError};
pub use manifest::{ProvenanceManifest, ATTRIBUTION};
pub use numeric::round_decimal;
pub use params::ProcessingParameters;
pub use raster::{ContourFeature, RasterStats};
pub use tile::TileDescriptor;

/// Result type for model construction.
pub type Result<T> = std::result::Result<T, ModelError>;
