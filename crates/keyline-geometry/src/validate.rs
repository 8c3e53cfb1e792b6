//! GeoJSON parsing and topology checks for AOI polygons.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::coordinate_position::{CoordPos, CoordinatePosition};
use geo::{Area, Coord, Line, LineString, MultiPolygon, Polygon};
use keyline_model::AoiGeometry;
use serde_json::Value;

use crate::{GeometryError, Result};

/// Minimum number of positions in a closed ring (triangle + closing point).
const MIN_RING_POSITIONS: usize = 4;

/// Parse a GeoJSON value into a validated polygonal geometry.
///
/// Accepts a bare geometry object, a `Feature` (its `geometry` member) or a
/// `FeatureCollection` (the geometry of its first feature).
pub fn parse_geojson_geometry(value: &Value) -> Result<AoiGeometry> {
    let geometry = unwrap_feature(value)?;
    let geo_type = geometry.get("type").and_then(Value::as_str).unwrap_or("<missing>");
    let coordinates = geometry.get("coordinates");

    let parsed = match geo_type {
        "Polygon" => AoiGeometry::Polygon(parse_polygon(require_coordinates(coordinates)?)?),
        "MultiPolygon" => {
            let parts = as_array(require_coordinates(coordinates)?, "MultiPolygon coordinates")?;
            let polygons = parts.iter().map(parse_polygon).collect::<Result<Vec<_>>>()?;
            AoiGeometry::MultiPolygon(MultiPolygon(polygons))
        }
        other => {
            return Err(GeometryError::InvalidGeometry(format!(
                "Unsupported geometry type: {other}. Expected Polygon or MultiPolygon."
            )))
        }
    };

    validate_geometry(&parsed)?;
    Ok(parsed)
}

/// Check the topology of a polygonal geometry.
///
/// Every ring must be closed, have at least four finite positions, enclose a
/// non-zero area and be free of self-intersections. Within a polygon, holes
/// lie inside the shell, never inside each other, and rings meet at one point
/// at most. Parts of a multipolygon may touch at points but not overlap or
/// share edges.
pub fn validate_geometry(geometry: &AoiGeometry) -> Result<()> {
    if geometry.is_empty() {
        return Err(GeometryError::InvalidGeometry("Geometry is empty".to_string()));
    }
    let polygons = geometry.polygons();
    for polygon in &polygons {
        validate_ring(polygon.exterior(), "exterior ring")?;
        for (idx, hole) in polygon.interiors().iter().enumerate() {
            validate_ring(hole, &format!("interior ring {idx}"))?;
        }
        validate_holes(polygon)?;
    }
    for (i, a) in polygons.iter().enumerate() {
        for (j, b) in polygons.iter().enumerate().skip(i + 1) {
            validate_parts(a, b, i, j)?;
        }
    }
    Ok(())
}

fn invalid(message: String) -> GeometryError {
    GeometryError::InvalidGeometry(message)
}

/// How the edges of two distinct rings meet.
#[derive(Debug, Default)]
struct RingContact {
    /// A point where edges cross or run along each other.
    crossing: Option<Coord<f64>>,
    /// Distinct points where the rings only touch.
    touches: Vec<Coord<f64>>,
}

fn ring_contact(a: &LineString<f64>, b: &LineString<f64>) -> RingContact {
    let mut contact = RingContact::default();
    for ea in a.lines().filter(|l| l.start != l.end) {
        for eb in b.lines().filter(|l| l.start != l.end) {
            match line_intersection(ea, eb) {
                None => {}
                Some(LineIntersection::Collinear { intersection }) => {
                    contact.crossing = Some(intersection.start);
                    return contact;
                }
                Some(LineIntersection::SinglePoint {
                    intersection,
                    is_proper: true,
                }) => {
                    contact.crossing = Some(intersection);
                    return contact;
                }
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    if !contact.touches.contains(&intersection) {
                        contact.touches.push(intersection);
                    }
                }
            }
        }
    }
    contact
}

/// Whether any vertex or edge midpoint of `ring` lies at `pos` relative to
/// `area`. Midpoints catch rings whose vertices all sit on the other boundary.
fn any_sample_at(ring: &LineString<f64>, area: &Polygon<f64>, pos: CoordPos) -> bool {
    let midpoints = ring.lines().map(|l| Coord {
        x: (l.start.x + l.end.x) / 2.0,
        y: (l.start.y + l.end.y) / 2.0,
    });
    ring.coords()
        .copied()
        .chain(midpoints)
        .any(|c| area.coordinate_position(&c) == pos)
}

/// Reject rings that cross, share an edge or touch more than once.
fn check_ring_pair(a: &LineString<f64>, b: &LineString<f64>, label: &str) -> Result<()> {
    let contact = ring_contact(a, b);
    if let Some(at) = contact.crossing {
        return Err(invalid(format!("Self-intersection[{} {}] between {label}", at.x, at.y)));
    }
    if contact.touches.len() > 1 {
        let at = contact.touches[1];
        return Err(invalid(format!(
            "Interior is disconnected[{} {}]: {label} touch at {} points",
            at.x,
            at.y,
            contact.touches.len()
        )));
    }
    Ok(())
}

fn validate_holes(polygon: &Polygon<f64>) -> Result<()> {
    let shell = Polygon::new(polygon.exterior().clone(), vec![]);
    let holes = polygon.interiors();
    for (i, hole) in holes.iter().enumerate() {
        check_ring_pair(polygon.exterior(), hole, &format!("exterior ring and interior ring {i}"))?;
        if any_sample_at(hole, &shell, CoordPos::Outside) {
            return Err(invalid(format!("Hole lies outside shell: interior ring {i}")));
        }

        let area = Polygon::new(hole.clone(), vec![]);
        for (j, other) in holes.iter().enumerate().skip(i + 1) {
            check_ring_pair(hole, other, &format!("interior rings {i} and {j}"))?;
            let other_area = Polygon::new(other.clone(), vec![]);
            let nested = any_sample_at(other, &area, CoordPos::Inside)
                || any_sample_at(hole, &other_area, CoordPos::Inside);
            if nested {
                return Err(invalid(format!("Nested holes: interior rings {i} and {j}")));
            }
        }
    }
    Ok(())
}

/// Two parts of a multipolygon may meet at points only.
fn validate_parts(a: &Polygon<f64>, b: &Polygon<f64>, i: usize, j: usize) -> Result<()> {
    let rings_a = std::iter::once(a.exterior()).chain(a.interiors());
    for ring_a in rings_a {
        let rings_b = std::iter::once(b.exterior()).chain(b.interiors());
        for ring_b in rings_b {
            if let Some(at) = ring_contact(ring_a, ring_b).crossing {
                return Err(invalid(format!(
                    "Self-intersection[{} {}] between polygons {i} and {j}",
                    at.x, at.y
                )));
            }
        }
    }
    // Without crossings, overlap leaves part of one shell inside the other part.
    let overlap = any_sample_at(b.exterior(), a, CoordPos::Inside)
        || any_sample_at(a.exterior(), b, CoordPos::Inside);
    if overlap {
        return Err(invalid(format!("Nested shells: polygons {i} and {j} overlap")));
    }
    Ok(())
}

fn unwrap_feature(value: &Value) -> Result<&Value> {
    match value.get("type").and_then(Value::as_str) {
        Some("Feature") => value
            .get("geometry")
            .filter(|g| !g.is_null())
            .ok_or_else(|| GeometryError::InvalidInput("Feature has no geometry".to_string())),
        Some("FeatureCollection") => {
            let first = value
                .get("features")
                .and_then(Value::as_array)
                .and_then(|features| features.first())
                .ok_or_else(|| {
                    GeometryError::InvalidInput("FeatureCollection contains no features".to_string())
                })?;
            unwrap_feature(first)
        }
        Some(_) => Ok(value),
        None => Err(GeometryError::InvalidInput(
            "GeoJSON object has no \"type\" member".to_string(),
        )),
    }
}

fn require_coordinates(coordinates: Option<&Value>) -> Result<&Value> {
    coordinates.ok_or_else(|| GeometryError::InvalidGeometry("missing \"coordinates\"".to_string()))
}

fn as_array<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| GeometryError::InvalidGeometry(format!("{what} must be an array")))
}

fn parse_polygon(value: &Value) -> Result<Polygon<f64>> {
    let rings = as_array(value, "Polygon coordinates")?;
    let mut rings = rings.iter().map(parse_ring);
    let exterior = match rings.next() {
        Some(ring) => ring?,
        None => LineString::new(vec![]),
    };
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn parse_ring(value: &Value) -> Result<LineString<f64>> {
    let positions = as_array(value, "linear ring")?;
    let coords = positions.iter().map(parse_position).collect::<Result<Vec<_>>>()?;
    Ok(LineString::new(coords))
}

fn parse_position(value: &Value) -> Result<Coord<f64>> {
    let ordinates = as_array(value, "position")?;
    if ordinates.len() < 2 {
        return Err(GeometryError::InvalidGeometry(format!(
            "position must have at least 2 ordinates, got {}",
            ordinates.len()
        )));
    }
    let x = ordinates[0].as_f64();
    let y = ordinates[1].as_f64();
    match (x, y) {
        (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Ok(Coord { x, y }),
        _ => Err(GeometryError::InvalidGeometry(format!("non-numeric position {value}"))),
    }
}

fn validate_ring(ring: &LineString<f64>, label: &str) -> Result<()> {
    let coords = &ring.0;
    if coords.len() < MIN_RING_POSITIONS {
        return Err(GeometryError::InvalidGeometry(format!(
            "{label} has {} positions, at least {MIN_RING_POSITIONS} required",
            coords.len()
        )));
    }
    if coords.first() != coords.last() {
        return Err(GeometryError::InvalidGeometry(format!("{label} is not closed")));
    }
    if let Some(at) = self_intersection(ring) {
        return Err(GeometryError::InvalidGeometry(format!(
            "Self-intersection[{} {}] in {label}",
            at.x, at.y
        )));
    }
    if Polygon::new(ring.clone(), vec![]).unsigned_area() == 0.0 {
        return Err(GeometryError::InvalidGeometry(format!("{label} has zero area")));
    }
    Ok(())
}

/// First point where two ring edges meet illegally, if any.
///
/// Adjacent edges may share their common vertex only; all other pairs must
/// be disjoint.
fn self_intersection(ring: &LineString<f64>) -> Option<Coord<f64>> {
    let edges: Vec<Line<f64>> = ring.lines().filter(|l| l.start != l.end).collect();
    let n = edges.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(edges[i], edges[j]) {
                None => {}
                Some(LineIntersection::Collinear { intersection }) => return Some(intersection.start),
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    if !adjacent {
                        return Some(intersection);
                    }
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square() -> Value {
        json!({
            "type": "Polygon",
            "coordinates": [[
                [2600000.0, 1200000.0],
                [2601000.0, 1200000.0],
                [2601000.0, 1201000.0],
                [2600000.0, 1201000.0],
                [2600000.0, 1200000.0]
            ]]
        })
    }

    #[test]
    fn test_bare_polygon() {
        let geometry = parse_geojson_geometry(&square()).unwrap();
        assert_eq!(geometry.type_name(), "Polygon");
        assert_eq!(geometry.extent(), Some([2600000.0, 1200000.0, 2601000.0, 1201000.0]));
    }

    #[test]
    fn test_feature_and_collection() {
        let feature = json!({"type": "Feature", "properties": {}, "geometry": square()});
        assert!(parse_geojson_geometry(&feature).is_ok());

        let collection = json!({"type": "FeatureCollection", "features": [feature]});
        assert!(parse_geojson_geometry(&collection).is_ok());
    }

    #[test]
    fn test_empty_collection_is_invalid_input() {
        let collection = json!({"type": "FeatureCollection", "features": []});
        assert!(matches!(
            parse_geojson_geometry(&collection),
            Err(GeometryError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_unsupported_type() {
        let point = json!({"type": "Point", "coordinates": [2600000.0, 1200000.0]});
        let err = parse_geojson_geometry(&point).unwrap_err();
        assert!(err.to_string().contains("Unsupported geometry type: Point"));
    }

    #[test]
    fn test_bowtie_rejected() {
        let bowtie = json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [1.0, 1.0], [1.0, 0.0], [0.0, 1.0], [0.0, 0.0]]]
        });
        let err = parse_geojson_geometry(&bowtie).unwrap_err();
        assert!(err.to_string().contains("Self-intersection"), "{err}");
    }

    #[test]
    fn test_unclosed_ring_rejected() {
        let open = json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]]
        });
        let err = parse_geojson_geometry(&open).unwrap_err();
        assert!(err.to_string().contains("not closed"));
    }

    #[test]
    fn test_degenerate_ring_rejected() {
        let flat = json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [0.0, 0.0]]]
        });
        assert!(parse_geojson_geometry(&flat).is_err());

        let short = json!({"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [0.0, 0.0]]]});
        assert!(parse_geojson_geometry(&short).is_err());
    }

    #[test]
    fn test_empty_coordinates() {
        let empty = json!({"type": "Polygon", "coordinates": []});
        let err = parse_geojson_geometry(&empty).unwrap_err();
        assert_eq!(err, GeometryError::InvalidGeometry("Geometry is empty".to_string()));

        let empty_multi = json!({"type": "MultiPolygon", "coordinates": []});
        assert!(parse_geojson_geometry(&empty_multi).is_err());
    }

    #[test]
    fn test_non_numeric_position() {
        let bad = json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], ["a", 0.0], [1.0, 1.0], [0.0, 0.0]]]
        });
        assert!(parse_geojson_geometry(&bad).is_err());
    }

    #[test]
    fn test_polygon_with_hole() {
        let holed = json!({
            "type": "MultiPolygon",
            "coordinates": [[
                [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]],
                [[2.0, 2.0], [4.0, 2.0], [4.0, 4.0], [2.0, 4.0], [2.0, 2.0]]
            ]]
        });
        let geometry = parse_geojson_geometry(&holed).unwrap();
        assert_eq!(geometry.polygons()[0].interiors().len(), 1);
    }

    fn square_ring(x0: f64, y0: f64, x1: f64, y1: f64) -> Value {
        json!([[x0, y0], [x1, y0], [x1, y1], [x0, y1], [x0, y0]])
    }

    fn invalid_message(value: &Value) -> String {
        match parse_geojson_geometry(value) {
            Err(GeometryError::InvalidGeometry(message)) => message,
            other => panic!("expected InvalidGeometry, got {other:?}"),
        }
    }

    #[test]
    fn test_hole_outside_shell_rejected() {
        let polygon = json!({
            "type": "Polygon",
            "coordinates": [square_ring(7.4, 46.9, 7.5, 47.0), square_ring(8.0, 46.0, 8.1, 46.1)]
        });
        assert!(invalid_message(&polygon).contains("Hole lies outside shell"));
    }

    #[test]
    fn test_hole_crossing_shell_rejected() {
        let polygon = json!({
            "type": "Polygon",
            "coordinates": [square_ring(0.0, 0.0, 10.0, 10.0), square_ring(8.0, 2.0, 12.0, 4.0)]
        });
        assert!(invalid_message(&polygon).contains("Self-intersection"));
    }

    #[test]
    fn test_hole_touching_shell_once_accepted() {
        let polygon = json!({
            "type": "Polygon",
            "coordinates": [
                square_ring(0.0, 0.0, 10.0, 10.0),
                [[0.0, 0.0], [2.0, 1.0], [1.0, 2.0], [0.0, 0.0]]
            ]
        });
        assert!(parse_geojson_geometry(&polygon).is_ok());
    }

    #[test]
    fn test_hole_touching_shell_twice_rejected() {
        let polygon = json!({
            "type": "Polygon",
            "coordinates": [
                square_ring(0.0, 0.0, 10.0, 10.0),
                [[0.0, 5.0], [5.0, 2.0], [10.0, 5.0], [5.0, 8.0], [0.0, 5.0]]
            ]
        });
        assert!(invalid_message(&polygon).contains("Interior is disconnected"));
    }

    #[test]
    fn test_nested_holes_rejected() {
        let polygon = json!({
            "type": "Polygon",
            "coordinates": [
                square_ring(0.0, 0.0, 10.0, 10.0),
                square_ring(2.0, 2.0, 8.0, 8.0),
                square_ring(4.0, 4.0, 5.0, 5.0)
            ]
        });
        assert!(invalid_message(&polygon).contains("Nested holes"));
    }

    #[test]
    fn test_crossing_holes_rejected() {
        let polygon = json!({
            "type": "Polygon",
            "coordinates": [
                square_ring(0.0, 0.0, 10.0, 10.0),
                square_ring(2.0, 2.0, 5.0, 5.0),
                square_ring(4.0, 4.0, 7.0, 7.0)
            ]
        });
        assert!(invalid_message(&polygon).contains("Self-intersection"));
    }

    #[test]
    fn test_overlapping_parts_rejected() {
        let crossing = json!({
            "type": "MultiPolygon",
            "coordinates": [[square_ring(0.0, 0.0, 10.0, 10.0)], [square_ring(5.0, 5.0, 15.0, 15.0)]]
        });
        assert!(invalid_message(&crossing).contains("polygons 0 and 1"));

        let nested = json!({
            "type": "MultiPolygon",
            "coordinates": [[square_ring(0.0, 0.0, 10.0, 10.0)], [square_ring(2.0, 2.0, 4.0, 4.0)]]
        });
        assert!(invalid_message(&nested).contains("Nested shells"));

        let inscribed = json!({
            "type": "MultiPolygon",
            "coordinates": [
                [square_ring(0.0, 0.0, 10.0, 10.0)],
                [[[5.0, 0.0], [10.0, 5.0], [5.0, 10.0], [0.0, 5.0], [5.0, 0.0]]]
            ]
        });
        assert!(invalid_message(&inscribed).contains("Nested shells"));
    }

    #[test]
    fn test_parts_sharing_edge_rejected() {
        let adjacent = json!({
            "type": "MultiPolygon",
            "coordinates": [[square_ring(0.0, 0.0, 1.0, 1.0)], [square_ring(1.0, 0.0, 2.0, 1.0)]]
        });
        assert!(invalid_message(&adjacent).contains("Self-intersection"));
    }

    #[test]
    fn test_parts_touching_at_corner_accepted() {
        let corner = json!({
            "type": "MultiPolygon",
            "coordinates": [[square_ring(0.0, 0.0, 1.0, 1.0)], [square_ring(1.0, 1.0, 2.0, 2.0)]]
        });
        assert!(parse_geojson_geometry(&corner).is_ok());
    }

    #[test]
    fn test_part_inside_hole_accepted() {
        let island = json!({
            "type": "MultiPolygon",
            "coordinates": [
                [square_ring(0.0, 0.0, 10.0, 10.0), square_ring(2.0, 2.0, 8.0, 8.0)],
                [square_ring(4.0, 4.0, 6.0, 6.0)]
            ]
        });
        assert_eq!(parse_geojson_geometry(&island).unwrap().polygons().len(), 2);
    }
}
