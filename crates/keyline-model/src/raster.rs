//! Raster engine result types.

use geo::{BoundingRect, LineString};
use serde::{Deserialize, Serialize};

/// Summary statistics of a clipped elevation raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation over valid pixels.
    pub std: f64,
    pub nodata: Option<f64>,
    pub width: u32,
    pub height: u32,
    /// Authority identifier of the raster's CRS, e.g. `EPSG:2056`.
    pub crs: String,
}

/// One contour isoline: a single elevation value and its line geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourFeature {
    pub elevation: f64,
    pub geometry: LineString<f64>,
}

impl ContourFeature {
    pub fn new(elevation: f64, geometry: LineString<f64>) -> Self {
        Self {
            elevation,
            geometry,
        }
    }

    /// Lower-left corner of the feature's bounding box, used as sort key.
    pub fn min_corner(&self) -> (f64, f64) {
        self.geometry
            .bounding_rect()
            .map(|r| (r.min().x, r.min().y))
            .unwrap_or((f64::INFINITY, f64::INFINITY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    #[test]
    fn test_min_corner() {
        let f = ContourFeature::new(
            500.0,
            line_string![(x: 3.0, y: 9.0), (x: 1.0, y: 10.0), (x: 2.0, y: 4.0)],
        );
        assert_eq!(f.min_corner(), (1.0, 4.0));
    }

    #[test]
    fn test_stats_keys() {
        let stats = RasterStats {
            min: 1.0,
            max: 2.0,
            mean: 1.5,
            std: 0.5,
            nodata: None,
            width: 10,
            height: 20,
            crs: "EPSG:2056".to_string(),
        };
        let value = serde_json::to_value(&stats).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["crs", "height", "max", "mean", "min", "nodata", "std", "width"]);
    }
}
