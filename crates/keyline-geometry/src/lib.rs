//! # keyline-geometry
//!
//! Geometry normalisation and fingerprinting for the keyline pipeline.
//!
//! ## Overview
//!
//! - [`SwissTransform`]: the rigorous swisstopo WGS84 ⇄ CH1903+/LV95
//!   transformation, with all projection constants computed once
//! - [`GeometryNormalizer`]: validates a raw AOI (GeoJSON or bbox tuple),
//!   reprojects it to LV95 and checks it against the Swiss territory
//! - [`aoi_fingerprint`] / [`params_fingerprint`]: short SHA-256 keys used as
//!   cache coordinates
//!
//! Nothing in this crate performs I/O.
//!
//! ## Example
//!
//! ```
//! use keyline_geometry::{aoi_fingerprint, AoiSource, GeometryNormalizer, SwissTransform};
//! use keyline_model::CoordinateSystem;
//!
//! let normalizer = GeometryNormalizer::new(SwissTransform::new());
//! let source = AoiSource::BoundingBox([2_600_000.0, 1_200_000.0, 2_601_000.0, 1_201_000.0]);
//! let aoi = normalizer.normalize(&source, CoordinateSystem::Lv95)?;
//!
//! assert_eq!(aoi.bbox().area(), 1_000_000.0);
//! assert_eq!(aoi_fingerprint(&aoi).len(), 16);
//! # Ok::<(), keyline_geometry::GeometryError>(())
//! ```

mod error;
mod fingerprint;
mod normalize;
mod transform;
mod validate;

pub use error::GeometryError;
pub use fingerprint::{
    aoi_fingerprint, canonical_json, params_fingerprint, round_coordinates, AOI_KEY_LEN,
    COORDINATE_PRECISION, PARAMS_KEY_LEN,
};
pub use normalize::{AoiSource, GeometryNormalizer, SWISS_REFERENCE_EXTENT};
pub use transform::SwissTransform;
pub use validate::{parse_geojson_geometry, validate_geometry};

/// Result type for geometry operations.
pub type Result<T> = std::result::Result<T, GeometryError>;
