//! WGS84 ⇄ CH1903+/LV95 transformation.
//!
//! Implements the rigorous swisstopo formulas:
//!
//! 1. WGS84 geodetic → geocentric (ECEF) on the WGS84 ellipsoid
//! 2. Three-parameter datum shift to CH1903+
//! 3. Geocentric → geodetic on the Bessel 1841 ellipsoid
//! 4. Swiss oblique conformal cylindrical projection, centred on the old
//!    observatory in Bern with false origin (2 600 000, 1 200 000)
//!
//! Geometry is reprojected without heights, so points are treated as lying on
//! the ellipsoid. That keeps horizontal error at the centimetre level for
//! Swiss terrain.

use geo::{Coord, MapCoords};
use keyline_model::{BoundingBox, CoordinateSystem};
use std::f64::consts::FRAC_PI_4;

use crate::Result;

/// WGS84 semi-major axis (m).
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 first eccentricity squared.
const WGS84_E2: f64 = 0.006_694_379_990_14;

/// Bessel 1841 semi-major axis (m).
const BESSEL_A: f64 = 6_377_397.155;
/// Bessel 1841 first eccentricity squared.
const BESSEL_E2: f64 = 0.006_674_372_230_614;

/// Geocentric translation CH1903+ → WGS84 (m).
const DATUM_SHIFT: [f64; 3] = [674.374, 15.056, 405.346];

/// LV95 false easting / northing (m).
const FALSE_EASTING: f64 = 2_600_000.0;
const FALSE_NORTHING: f64 = 1_200_000.0;

/// Iteration cap for the latitude fixed-point loops.
const MAX_ITERATIONS: usize = 30;
const CONVERGENCE: f64 = 1e-13;

/// Pre-computed WGS84 ⇄ LV95 transformation.
///
/// Construct once at start-up and hand it to whatever needs to reproject;
/// every method is a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct SwissTransform {
    /// Bessel first eccentricity.
    e: f64,
    /// Latitude of the projection centre (radians, Bessel).
    phi0: f64,
    /// Longitude of the projection centre (radians, Bessel).
    lambda0: f64,
    /// Radius of the projection sphere.
    r: f64,
    /// Ellipsoid → sphere scaling exponent.
    alpha: f64,
    /// Spherical latitude of the projection centre.
    b0: f64,
    /// Integration constant of the ellipsoid → sphere mapping.
    k: f64,
}

impl Default for SwissTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl SwissTransform {
    /// Compute the projection constants.
    pub fn new() -> Self {
        let e = BESSEL_E2.sqrt();
        let phi0 = dms_to_radians(46.0, 57.0, 8.66);
        let lambda0 = dms_to_radians(7.0, 26.0, 22.50);

        let sin_phi0 = phi0.sin();
        let r = BESSEL_A * (1.0 - BESSEL_E2).sqrt() / (1.0 - BESSEL_E2 * sin_phi0 * sin_phi0);
        let alpha = (1.0 + BESSEL_E2 / (1.0 - BESSEL_E2) * phi0.cos().powi(4)).sqrt();
        let b0 = (sin_phi0 / alpha).asin();
        let k = (FRAC_PI_4 + b0 / 2.0).tan().ln() - alpha * (FRAC_PI_4 + phi0 / 2.0).tan().ln()
            + alpha * e / 2.0 * ((1.0 + e * sin_phi0) / (1.0 - e * sin_phi0)).ln();

        Self {
            e,
            phi0,
            lambda0,
            r,
            alpha,
            b0,
            k,
        }
    }

    /// WGS84 (longitude, latitude in degrees) → LV95 (easting, northing).
    ///
    /// The point is placed on the ellipsoid. At Swiss altitudes this shifts
    /// the result by up to a few centimetres; use
    /// [`wgs84_to_lv95_at_height`](Self::wgs84_to_lv95_at_height) when the
    /// ellipsoidal height is known.
    pub fn wgs84_to_lv95(&self, lon: f64, lat: f64) -> (f64, f64) {
        self.wgs84_to_lv95_at_height(lon, lat, 0.0)
    }

    /// As [`wgs84_to_lv95`](Self::wgs84_to_lv95) for a point `height` metres
    /// above the WGS84 ellipsoid.
    pub fn wgs84_to_lv95_at_height(&self, lon: f64, lat: f64, height: f64) -> (f64, f64) {
        let ecef = geodetic_to_ecef(lat.to_radians(), lon.to_radians(), height, WGS84_A, WGS84_E2);
        let shifted = [
            ecef[0] - DATUM_SHIFT[0],
            ecef[1] - DATUM_SHIFT[1],
            ecef[2] - DATUM_SHIFT[2],
        ];
        let (phi, lambda) = ecef_to_geodetic(shifted, BESSEL_A, BESSEL_E2);
        self.project(phi, lambda)
    }

    /// LV95 (easting, northing) → WGS84 (longitude, latitude in degrees).
    pub fn lv95_to_wgs84(&self, easting: f64, northing: f64) -> (f64, f64) {
        let (phi, lambda) = self.unproject(easting, northing);
        let ecef = geodetic_to_ecef(phi, lambda, 0.0, BESSEL_A, BESSEL_E2);
        let shifted = [
            ecef[0] + DATUM_SHIFT[0],
            ecef[1] + DATUM_SHIFT[1],
            ecef[2] + DATUM_SHIFT[2],
        ];
        let (lat, lon) = ecef_to_geodetic(shifted, WGS84_A, WGS84_E2);
        (lon.to_degrees(), lat.to_degrees())
    }

    /// Transform one coordinate between supported systems.
    ///
    /// Identity when `from == to`.
    pub fn transform_coord(&self, coord: Coord<f64>, from: CoordinateSystem, to: CoordinateSystem) -> Coord<f64> {
        match (from, to) {
            (CoordinateSystem::Lv95, CoordinateSystem::Lv95)
            | (CoordinateSystem::Wgs84, CoordinateSystem::Wgs84) => coord,
            (CoordinateSystem::Wgs84, CoordinateSystem::Lv95) => {
                let (x, y) = self.wgs84_to_lv95(coord.x, coord.y);
                Coord { x, y }
            }
            (CoordinateSystem::Lv95, CoordinateSystem::Wgs84) => {
                let (x, y) = self.lv95_to_wgs84(coord.x, coord.y);
                Coord { x, y }
            }
        }
    }

    /// Reproject any `geo` geometry between supported systems.
    pub fn reproject<G>(&self, geometry: &G, from: CoordinateSystem, to: CoordinateSystem) -> G
    where
        G: MapCoords<f64, f64, Output = G> + Clone,
    {
        if from == to {
            return geometry.clone();
        }
        geometry.map_coords(|c| self.transform_coord(c, from, to))
    }

    /// Reproject a bounding box by transforming its four corners.
    pub fn reproject_bbox(&self, bbox: &BoundingBox, to: CoordinateSystem) -> Result<BoundingBox> {
        if bbox.crs() == to {
            return Ok(*bbox);
        }
        let corners: Vec<Coord<f64>> = bbox.ring()[..4]
            .iter()
            .map(|[x, y]| self.transform_coord(Coord { x: *x, y: *y }, bbox.crs(), to))
            .collect();
        let xmin = corners.iter().map(|c| c.x).fold(f64::INFINITY, f64::min);
        let ymin = corners.iter().map(|c| c.y).fold(f64::INFINITY, f64::min);
        let xmax = corners.iter().map(|c| c.x).fold(f64::NEG_INFINITY, f64::max);
        let ymax = corners.iter().map(|c| c.y).fold(f64::NEG_INFINITY, f64::max);
        Ok(BoundingBox::new(xmin, ymin, xmax, ymax, to)?)
    }

    /// Bessel geodetic (radians) → LV95 projected coordinates.
    fn project(&self, phi: f64, lambda: f64) -> (f64, f64) {
        let e = self.e;
        let sin_phi = phi.sin();

        // Ellipsoid → sphere (Gauss conformal mapping)
        let s = self.alpha * (FRAC_PI_4 + phi / 2.0).tan().ln()
            - self.alpha * e / 2.0 * ((1.0 + e * sin_phi) / (1.0 - e * sin_phi)).ln()
            + self.k;
        let b = 2.0 * (s.exp().atan() - FRAC_PI_4);
        let l = self.alpha * (lambda - self.lambda0);

        // Equatorial → pseudo-equatorial (oblique) system
        let l_bar = (l.sin() / (self.b0.sin() * b.tan() + self.b0.cos() * l.cos())).atan();
        let b_bar = (self.b0.cos() * b.sin() - self.b0.sin() * b.cos() * l.cos()).asin();

        // Sphere → plane (Mercator)
        let y = self.r * l_bar;
        let x = self.r / 2.0 * ((1.0 + b_bar.sin()) / (1.0 - b_bar.sin())).ln();

        (y + FALSE_EASTING, x + FALSE_NORTHING)
    }

    /// LV95 projected coordinates → Bessel geodetic (radians).
    fn unproject(&self, easting: f64, northing: f64) -> (f64, f64) {
        let y = easting - FALSE_EASTING;
        let x = northing - FALSE_NORTHING;

        let l_bar = y / self.r;
        let b_bar = 2.0 * ((x / self.r).exp().atan() - FRAC_PI_4);

        let b = (self.b0.cos() * b_bar.sin() + self.b0.sin() * b_bar.cos() * l_bar.cos()).asin();
        let l = (l_bar.sin() / (self.b0.cos() * l_bar.cos() - self.b0.sin() * b_bar.tan())).atan();

        let lambda = self.lambda0 + l / self.alpha;

        // Sphere → ellipsoid latitude by fixed-point iteration
        let e = self.e;
        let base = ((FRAC_PI_4 + b / 2.0).tan().ln() - self.k) / self.alpha;
        let mut phi = b;
        for _ in 0..MAX_ITERATIONS {
            let s = base + e * (FRAC_PI_4 + (e * phi.sin()).asin() / 2.0).tan().ln();
            let next = 2.0 * s.exp().atan() - std::f64::consts::FRAC_PI_2;
            let done = (next - phi).abs() < CONVERGENCE;
            phi = next;
            if done {
                break;
            }
        }

        (phi, lambda)
    }

    /// Latitude of the projection centre in degrees (Bessel).
    pub fn origin_latitude(&self) -> f64 {
        self.phi0.to_degrees()
    }

    /// Longitude of the projection centre in degrees (Bessel).
    pub fn origin_longitude(&self) -> f64 {
        self.lambda0.to_degrees()
    }
}

fn dms_to_radians(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    (degrees + minutes / 60.0 + seconds / 3600.0).to_radians()
}

/// Geodetic (radians, ellipsoidal height in metres) → geocentric cartesian.
fn geodetic_to_ecef(phi: f64, lambda: f64, h: f64, a: f64, e2: f64) -> [f64; 3] {
    let sin_phi = phi.sin();
    let n = a / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    [
        (n + h) * phi.cos() * lambda.cos(),
        (n + h) * phi.cos() * lambda.sin(),
        (n * (1.0 - e2) + h) * sin_phi,
    ]
}

/// Geocentric cartesian → geodetic (latitude, longitude in radians).
fn ecef_to_geodetic(xyz: [f64; 3], a: f64, e2: f64) -> (f64, f64) {
    let [x, y, z] = xyz;
    let lambda = y.atan2(x);
    let p = (x * x + y * y).sqrt();

    let mut phi = z.atan2(p * (1.0 - e2));
    for _ in 0..MAX_ITERATIONS {
        let sin_phi = phi.sin();
        let n = a / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let h = p / phi.cos() - n;
        let next = z.atan2(p * (1.0 - e2 * n / (n + h)));
        let done = (next - phi).abs() < CONVERGENCE;
        phi = next;
        if done {
            break;
        }
    }
    (phi, lambda)
}
