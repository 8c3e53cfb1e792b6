//! Byte-stable contour output.
//!
//! Identical inputs must produce identical `contours.geojson` files, so
//! features are rounded to centimetres, ordered by elevation then by the
//! lower-left corner of their extent, and serialised with a fixed key order.

use crate::{PipelineError, Result};
use geo::{Coord, LineString, MapCoords};
use keyline_model::{round_decimal, ContourFeature};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Decimal places kept for contour coordinates and elevations.
pub const OUTPUT_PRECISION: usize = 2;

#[derive(Serialize)]
struct FeatureCollection<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    features: Vec<Feature<'a>>,
}

#[derive(Serialize)]
struct Feature<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    geometry: LineGeometry,
    properties: BTreeMap<&'a str, f64>,
}

#[derive(Serialize)]
struct LineGeometry {
    #[serde(rename = "type")]
    kind: &'static str,
    coordinates: Vec<[f64; 2]>,
}

/// Round every feature, then sort by (elevation, min x, min y).
pub fn canonicalize(features: Vec<ContourFeature>) -> Vec<ContourFeature> {
    let mut rounded: Vec<ContourFeature> = features
        .into_iter()
        .map(|f| {
            let geometry: LineString<f64> = f.geometry.map_coords(|c| Coord {
                x: round_decimal(c.x, OUTPUT_PRECISION),
                y: round_decimal(c.y, OUTPUT_PRECISION),
            });
            ContourFeature::new(round_decimal(f.elevation, OUTPUT_PRECISION), geometry)
        })
        .collect();

    rounded.sort_by(|a, b| {
        let (ax, ay) = a.min_corner();
        let (bx, by) = b.min_corner();
        a.elevation
            .total_cmp(&b.elevation)
            .then(ax.total_cmp(&bx))
            .then(ay.total_cmp(&by))
    });
    rounded
}

/// Lowest and highest contour elevation, if any.
pub fn elevation_range(features: &[ContourFeature]) -> Option<(f64, f64)> {
    features.iter().fold(None, |range, f| match range {
        None => Some((f.elevation, f.elevation)),
        Some((lo, hi)) => Some((lo.min(f.elevation), hi.max(f.elevation))),
    })
}

/// Render features as a pretty-printed GeoJSON `FeatureCollection`.
///
/// Expects features already passed through [`canonicalize`].
pub fn to_geojson(features: &[ContourFeature], attribute: &str) -> serde_json::Result<String> {
    let collection = FeatureCollection {
        kind: "FeatureCollection",
        features: features
            .iter()
            .map(|f| Feature {
                kind: "Feature",
                geometry: LineGeometry {
                    kind: "LineString",
                    coordinates: f.geometry.0.iter().map(|c| [c.x, c.y]).collect(),
                },
                properties: BTreeMap::from([(attribute, f.elevation)]),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&collection)
}

/// Write `text` next to `path` and rename it into place.
pub(crate) fn write_atomic(path: &Path, text: &str) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".write-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| PipelineError::storage(dir, e))?;
    tmp.write_all(text.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| PipelineError::storage(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| PipelineError::storage(path, e.error))?;
    Ok(())
}

/// Serialise canonical contours to `path`.
pub fn write_contours(path: &Path, features: &[ContourFeature], attribute: &str) -> Result<()> {
    let text = to_geojson(features, attribute).map_err(|e| PipelineError::storage(path, e.into()))?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| PipelineError::storage(dir, e))?;
    }
    write_atomic(path, &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;
    use serde_json::Value;

    fn feature(elevation: f64, x0: f64, y0: f64) -> ContourFeature {
        ContourFeature::new(
            elevation,
            line_string![(x: x0, y: y0), (x: x0 + 10.0, y: y0 + 5.0)],
        )
    }

    #[test]
    fn test_sorted_by_elevation_then_corner() {
        let features = vec![
            feature(520.0, 5.0, 0.0),
            feature(510.0, 9.0, 9.0),
            feature(520.0, 1.0, 7.0),
            feature(520.0, 1.0, 3.0),
        ];
        let sorted = canonicalize(features);
        let keys: Vec<(f64, (f64, f64))> = sorted.iter().map(|f| (f.elevation, f.min_corner())).collect();
        assert_eq!(
            keys,
            vec![
                (510.0, (9.0, 9.0)),
                (520.0, (1.0, 3.0)),
                (520.0, (1.0, 7.0)),
                (520.0, (5.0, 0.0)),
            ]
        );
    }

    #[test]
    fn test_rounding() {
        let f = ContourFeature::new(
            512.3456,
            line_string![(x: 2_600_000.123_4, y: 1_200_000.987_6), (x: 2_600_001.0, y: 1_200_001.0)],
        );
        let out = canonicalize(vec![f]);
        assert_eq!(out[0].elevation, 512.35);
        assert_eq!(out[0].geometry.0[0], Coord { x: 2_600_000.12, y: 1_200_000.99 });
    }

    #[test]
    fn test_elevation_range() {
        assert_eq!(elevation_range(&[]), None);
        let features = [feature(530.0, 0.0, 0.0), feature(510.0, 0.0, 0.0)];
        assert_eq!(elevation_range(&features), Some((510.0, 530.0)));
    }

    #[test]
    fn test_geojson_key_order() {
        let text = to_geojson(&[feature(510.0, 1.0, 2.0)], "elevation").unwrap();
        let type_pos = text.find("\"type\": \"FeatureCollection\"").unwrap();
        let features_pos = text.find("\"features\"").unwrap();
        assert!(type_pos < features_pos);

        let geometry_pos = text.find("\"geometry\"").unwrap();
        let properties_pos = text.find("\"properties\"").unwrap();
        assert!(geometry_pos < properties_pos);
        assert!(text.contains("\"elevation\": 510.0"));

        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["features"][0]["geometry"]["coordinates"][1][0], 11.0);
    }

    #[test]
    fn test_write_contours_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("contours.geojson");
        let features = canonicalize(vec![feature(520.0, 0.0, 0.0), feature(510.0, 0.0, 0.0)]);

        write_contours(&path, &features, "elevation").unwrap();
        let first = fs::read(&path).unwrap();
        write_contours(&path, &features, "elevation").unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
