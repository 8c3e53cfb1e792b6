//! Area of interest.

use crate::{BoundingBox, CoordinateSystem, ModelError, Result};
use geo::{BoundingRect, LineString, MultiPolygon, Polygon};
use serde_json::{json, Value};

/// Polygonal AOI geometry. Only the polygon family is supported.
#[derive(Debug, Clone, PartialEq)]
pub enum AoiGeometry {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl AoiGeometry {
    /// GeoJSON type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            AoiGeometry::Polygon(_) => "Polygon",
            AoiGeometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// Whether the geometry has no coordinates at all.
    pub fn is_empty(&self) -> bool {
        match self {
            AoiGeometry::Polygon(p) => p.exterior().0.is_empty(),
            AoiGeometry::MultiPolygon(mp) => mp.0.iter().all(|p| p.exterior().0.is_empty()),
        }
    }

    /// Polygons making up this geometry.
    pub fn polygons(&self) -> Vec<&Polygon<f64>> {
        match self {
            AoiGeometry::Polygon(p) => vec![p],
            AoiGeometry::MultiPolygon(mp) => mp.0.iter().collect(),
        }
    }

    /// Extent as `[xmin, ymin, xmax, ymax]`, or `None` when empty.
    pub fn extent(&self) -> Option<[f64; 4]> {
        let rect = match self {
            AoiGeometry::Polygon(p) => p.bounding_rect(),
            AoiGeometry::MultiPolygon(mp) => mp.bounding_rect(),
        }?;
        Some([rect.min().x, rect.min().y, rect.max().x, rect.max().y])
    }

    /// GeoJSON geometry object (`{"type": .., "coordinates": ..}`).
    pub fn to_geojson(&self) -> Value {
        match self {
            AoiGeometry::Polygon(p) => json!({
                "type": "Polygon",
                "coordinates": polygon_coordinates(p),
            }),
            AoiGeometry::MultiPolygon(mp) => json!({
                "type": "MultiPolygon",
                "coordinates": mp.0.iter().map(polygon_coordinates).collect::<Vec<_>>(),
            }),
        }
    }
}

fn ring_coordinates(ring: &LineString<f64>) -> Vec<[f64; 2]> {
    ring.0.iter().map(|c| [c.x, c.y]).collect()
}

fn polygon_coordinates(polygon: &Polygon<f64>) -> Vec<Vec<[f64; 2]>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors().iter())
        .map(ring_coordinates)
        .collect()
}

/// Area of interest, normalised to the canonical coordinate system.
///
/// Built by the geometry normaliser; `geometry` and `bbox` are always LV95.
#[derive(Debug, Clone, PartialEq)]
pub struct Aoi {
    geometry: AoiGeometry,
    bbox: BoundingBox,
    source_crs: CoordinateSystem,
}

impl Aoi {
    /// Wrap an already validated, already reprojected LV95 geometry.
    pub fn new(geometry: AoiGeometry, source_crs: CoordinateSystem) -> Result<Self> {
        let extent = geometry
            .extent()
            .ok_or_else(|| ModelError::InvalidBoundingBox("geometry is empty".to_string()))?;
        let bbox = BoundingBox::from_array(extent, CoordinateSystem::CANONICAL)?;
        Ok(Self {
            geometry,
            bbox,
            source_crs,
        })
    }

    pub fn geometry(&self) -> &AoiGeometry {
        &self.geometry
    }

    /// LV95 bounding box of the geometry.
    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// Coordinate system the AOI was supplied in, before normalisation.
    pub fn source_crs(&self) -> CoordinateSystem {
        self.source_crs
    }
}
