//! Interpretation of raw contour GeoJSON.

use crate::{RasterError, Result};
use geo::{EuclideanLength, LineString, Simplify};
use keyline_model::ContourFeature;
use serde_json::Value;
use tracing::warn;

/// Turn a contour `FeatureCollection` into cleaned features.
///
/// `MultiLineString` geometries are split into one feature per part, so the
/// feature count can exceed the number of input features. Empty or
/// zero-length lines are dropped. Douglas-Peucker simplification runs per
/// line when `simplify_tolerance > 0`; a closed contour that would collapse
/// below a valid ring keeps its original vertices. A missing elevation
/// attribute reads as 0.
pub fn parse_contour_collection(
    collection: &Value,
    attribute: &str,
    simplify_tolerance: f64,
) -> Result<Vec<ContourFeature>> {
    let features = collection
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| RasterError::InvalidContours("missing \"features\" array".to_string()))?;

    if features.is_empty() {
        warn!("No contour features generated, DEM may be flat or too small");
    }

    let mut out = Vec::new();
    for feature in features {
        let elevation = feature
            .get("properties")
            .and_then(|p| p.get(attribute))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);

        for line in feature_lines(feature)? {
            if let Some(line) = clean_line(line, simplify_tolerance) {
                out.push(ContourFeature::new(elevation, line));
            }
        }
    }
    Ok(out)
}

fn feature_lines(feature: &Value) -> Result<Vec<LineString<f64>>> {
    let Some(geometry) = feature.get("geometry").filter(|g| !g.is_null()) else {
        return Ok(Vec::new());
    };
    let coordinates = geometry.get("coordinates");
    match geometry.get("type").and_then(Value::as_str) {
        Some("LineString") => Ok(vec![parse_line(coordinates)?]),
        Some("MultiLineString") => coordinates
            .and_then(Value::as_array)
            .ok_or_else(|| RasterError::InvalidContours("MultiLineString without coordinates".to_string()))?
            .iter()
            .map(|part| parse_line(Some(part)))
            .collect(),
        other => Err(RasterError::InvalidContours(format!(
            "unexpected contour geometry type {other:?}"
        ))),
    }
}

fn parse_line(coordinates: Option<&Value>) -> Result<LineString<f64>> {
    let positions = coordinates
        .and_then(Value::as_array)
        .ok_or_else(|| RasterError::InvalidContours("line without coordinates".to_string()))?;
    positions
        .iter()
        .map(|p| {
            let x = p.get(0).and_then(Value::as_f64);
            let y = p.get(1).and_then(Value::as_f64);
            match (x, y) {
                (Some(x), Some(y)) => Ok((x, y)),
                _ => Err(RasterError::InvalidContours(format!("bad position {p}"))),
            }
        })
        .collect::<Result<Vec<_>>>()
        .map(LineString::from)
}

fn is_degenerate(line: &LineString<f64>) -> bool {
    line.0.len() < 2 || line.euclidean_length() == 0.0
}

/// Positions in the smallest valid closed ring.
const MIN_RING_POSITIONS: usize = 4;

fn clean_line(line: LineString<f64>, tolerance: f64) -> Option<LineString<f64>> {
    if is_degenerate(&line) {
        return None;
    }
    if tolerance <= 0.0 {
        return Some(line);
    }
    let simplified = line.simplify(&tolerance);
    if line.is_closed() && simplified.0.len() < MIN_RING_POSITIONS {
        return Some(line);
    }
    (!is_degenerate(&simplified)).then_some(simplified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collection() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"ID": 0, "elev": 510.0},
                    "geometry": {"type": "LineString", "coordinates": [
                        [2600000.0, 1200000.0], [2600001.0, 1200000.01], [2600002.0, 1200000.0]
                    ]}
                },
                {
                    "type": "Feature",
                    "properties": {"ID": 1, "elev": 520.0},
                    "geometry": {"type": "LineString", "coordinates": [[2600000.0, 1200000.0], [2600000.0, 1200000.0]]}
                },
                {
                    "type": "Feature",
                    "properties": {"ID": 2, "elev": 530.0},
                    "geometry": {"type": "MultiLineString", "coordinates": [
                        [[0.0, 0.0], [1.0, 1.0]],
                        [[5.0, 5.0], [6.0, 6.0]]
                    ]}
                }
            ]
        })
    }

    #[test]
    fn test_parse_drops_degenerate_and_splits_multi() {
        let features = parse_contour_collection(&collection(), "elev", 0.0).unwrap();
        let elevations: Vec<f64> = features.iter().map(|f| f.elevation).collect();
        assert_eq!(elevations, vec![510.0, 530.0, 530.0]);
        assert_eq!(features[0].geometry.0.len(), 3);
    }

    #[test]
    fn test_simplify() {
        let features = parse_contour_collection(&collection(), "elev", 0.5).unwrap();
        assert_eq!(features[0].geometry.0.len(), 2);
    }

    #[test]
    fn test_simplify_keeps_small_closed_contour() {
        let ring = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"elev": 540.0},
                "geometry": {"type": "LineString", "coordinates": [
                    [2600000.0, 1200000.0], [2600001.0, 1200000.0],
                    [2600001.0, 1200001.0], [2600000.0, 1200001.0],
                    [2600000.0, 1200000.0]
                ]}
            }]
        });
        let features = parse_contour_collection(&ring, "elev", 5.0).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].geometry.0.len(), 5);
        assert!(features[0].geometry.is_closed());
    }

    #[test]
    fn test_missing_attribute_is_zero() {
        let features = parse_contour_collection(&collection(), "height", 0.0).unwrap();
        assert!(features.iter().all(|f| f.elevation == 0.0));
    }

    #[test]
    fn test_invalid_collection() {
        assert!(parse_contour_collection(&json!({"type": "Feature"}), "elev", 0.0).is_err());
        let polygon = json!({"features": [{"geometry": {"type": "Polygon", "coordinates": []}}]});
        assert!(parse_contour_collection(&polygon, "elev", 0.0).is_err());
    }

    #[test]
    fn test_empty_collection() {
        let empty = json!({"type": "FeatureCollection", "features": []});
        assert!(parse_contour_collection(&empty, "elev", 0.0).unwrap().is_empty());
    }
}
