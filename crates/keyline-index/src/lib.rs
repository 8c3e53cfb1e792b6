//! # keyline-index
//!
//! Discovery of elevation tiles overlapping an area of interest.
//!
//! [`TileIndex`] is the seam the pipeline depends on; [`StacClient`] is the
//! production implementation backed by the swisstopo STAC API.

mod error;
mod stac;

pub use error::IndexError;
pub use stac::{
    parse_item, ItemCollection, StacAsset, StacClient, StacItem, StacLink, MAX_PAGES, PAGE_LIMIT,
    STAC_API_URL, STAC_URL_ENV, SWISSALTI3D_COLLECTION,
};

use keyline_model::{BoundingBox, CoordinateSystem, Resolution, TileDescriptor};

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Source of tile descriptors.
pub trait TileIndex: Send + Sync {
    /// Coordinate system `search` expects its bounding box in.
    fn coordinate_system(&self) -> CoordinateSystem;

    /// All tiles of `collection` at `resolution` overlapping `bbox`.
    ///
    /// An empty vector is a successful answer; deciding whether that is an
    /// error is left to the caller.
    fn search(
        &self,
        collection: &str,
        bbox: &BoundingBox,
        resolution: Resolution,
    ) -> Result<Vec<TileDescriptor>>;
}
