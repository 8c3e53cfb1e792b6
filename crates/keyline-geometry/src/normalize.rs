//! AOI normalisation: validate, reproject to LV95, sanity-check extent.

use geo::{LineString, Polygon};
use keyline_model::{Aoi, AoiGeometry, BoundingBox, CoordinateSystem};
use serde_json::Value;
use tracing::debug;

use crate::validate::{parse_geojson_geometry, validate_geometry};
use crate::{GeometryError, Result, SwissTransform};

/// Approximate LV95 extent of Switzerland, `[xmin, ymin, xmax, ymax]`.
pub const SWISS_REFERENCE_EXTENT: [f64; 4] = [2_485_000.0, 1_075_000.0, 2_834_000.0, 1_296_000.0];

/// Where an AOI comes from. Exactly one source is ever present.
#[derive(Debug, Clone, PartialEq)]
pub enum AoiSource {
    /// GeoJSON geometry, `Feature` or `FeatureCollection`.
    Geometry(Value),
    /// `[xmin, ymin, xmax, ymax]` in the declared source CRS.
    BoundingBox([f64; 4]),
}

impl AoiSource {
    /// Build from two optional inputs, requiring exactly one of them.
    pub fn from_options(geometry: Option<Value>, bbox: Option<[f64; 4]>) -> Result<Self> {
        match (geometry, bbox) {
            (Some(_), Some(_)) => Err(GeometryError::InvalidInput(
                "Provide either geojson or bbox, not both.".to_string(),
            )),
            (None, None) => Err(GeometryError::InvalidInput(
                "Provide either geojson or bbox.".to_string(),
            )),
            (Some(geometry), None) => Ok(AoiSource::Geometry(geometry)),
            (None, Some(bbox)) => Ok(AoiSource::BoundingBox(bbox)),
        }
    }
}

/// Turns raw AOI input into a canonical LV95 [`Aoi`].
///
/// Holds the one transform instance used for every call, so reprojection is
/// never rebuilt per request.
#[derive(Debug, Clone)]
pub struct GeometryNormalizer {
    transform: SwissTransform,
    reference: [f64; 4],
}

impl GeometryNormalizer {
    pub fn new(transform: SwissTransform) -> Self {
        Self {
            transform,
            reference: SWISS_REFERENCE_EXTENT,
        }
    }

    /// The transform this normaliser reprojects with.
    pub fn transform(&self) -> &SwissTransform {
        &self.transform
    }

    /// Validate, reproject to LV95 and check against the reference territory.
    pub fn normalize(&self, source: &AoiSource, crs: CoordinateSystem) -> Result<Aoi> {
        let geometry = match source {
            AoiSource::Geometry(value) => parse_geojson_geometry(value)?,
            AoiSource::BoundingBox(extent) => {
                let bbox = BoundingBox::from_array(*extent, crs)?;
                let ring: Vec<(f64, f64)> = bbox.ring().iter().map(|[x, y]| (*x, *y)).collect();
                let geometry = AoiGeometry::Polygon(Polygon::new(LineString::from(ring), vec![]));
                validate_geometry(&geometry)?;
                geometry
            }
        };

        let geometry = self.to_canonical(geometry, crs);
        let aoi = Aoi::new(geometry, crs)?;
        self.check_within_reference(aoi.bbox())?;

        debug!(
            source_crs = %crs,
            bbox = ?aoi.bbox().as_array(),
            area_m2 = aoi.bbox().area(),
            "AOI normalised"
        );
        Ok(aoi)
    }

    /// Reproject a bounding box through this normaliser's transform.
    pub fn reproject_bbox(&self, bbox: &BoundingBox, target: CoordinateSystem) -> Result<BoundingBox> {
        self.transform.reproject_bbox(bbox, target)
    }

    fn to_canonical(&self, geometry: AoiGeometry, crs: CoordinateSystem) -> AoiGeometry {
        let canonical = CoordinateSystem::CANONICAL;
        if crs == canonical {
            return geometry;
        }
        match geometry {
            AoiGeometry::Polygon(p) => AoiGeometry::Polygon(self.transform.reproject(&p, crs, canonical)),
            AoiGeometry::MultiPolygon(mp) => {
                AoiGeometry::MultiPolygon(self.transform.reproject(&mp, crs, canonical))
            }
        }
    }

    fn check_within_reference(&self, bbox: &BoundingBox) -> Result<()> {
        let [xmin, ymin, xmax, ymax] = self.reference;
        let disjoint =
            bbox.xmax() < xmin || bbox.xmin() > xmax || bbox.ymax() < ymin || bbox.ymin() > ymax;
        if disjoint {
            return Err(GeometryError::OutOfDomain {
                bbox: bbox.as_array(),
                reference: self.reference,
            });
        }
        Ok(())
    }
}
