//! Axis-aligned bounding boxes.

use crate::{CoordinateSystem, ModelError, Result};

/// Axis-aligned bounding box in a specific coordinate system.
///
/// Invariant: `xmin < xmax` and `ymin < ymax` (which also rules out NaN).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
    crs: CoordinateSystem,
}

impl BoundingBox {
    /// Create a bounding box, validating its extents.
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64, crs: CoordinateSystem) -> Result<Self> {
        if !(xmin < xmax) {
            return Err(ModelError::InvalidBoundingBox(format!(
                "xmin ({xmin}) must be less than xmax ({xmax})"
            )));
        }
        if !(ymin < ymax) {
            return Err(ModelError::InvalidBoundingBox(format!(
                "ymin ({ymin}) must be less than ymax ({ymax})"
            )));
        }
        Ok(Self {
            xmin,
            ymin,
            xmax,
            ymax,
            crs,
        })
    }

    /// Create from an `(xmin, ymin, xmax, ymax)` array.
    pub fn from_array(extent: [f64; 4], crs: CoordinateSystem) -> Result<Self> {
        Self::new(extent[0], extent[1], extent[2], extent[3], crs)
    }

    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    pub fn ymin(&self) -> f64 {
        self.ymin
    }

    pub fn xmax(&self) -> f64 {
        self.xmax
    }

    pub fn ymax(&self) -> f64 {
        self.ymax
    }

    pub fn crs(&self) -> CoordinateSystem {
        self.crs
    }

    /// `[xmin, ymin, xmax, ymax]`.
    pub fn as_array(&self) -> [f64; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }

    /// Area in square CRS units. Only meaningful for projected systems.
    pub fn area(&self) -> f64 {
        (self.xmax - self.xmin) * (self.ymax - self.ymin)
    }

    /// Whether two boxes share any point (touching edges count).
    ///
    /// Boxes in different coordinate systems never intersect.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.crs == other.crs
            && !(self.xmax < other.xmin
                || self.xmin > other.xmax
                || self.ymax < other.ymin
                || self.ymin > other.ymax)
    }

    /// Closed exterior ring `[ll, lr, ur, ul, ll]`.
    pub fn ring(&self) -> [[f64; 2]; 5] {
        [
            [self.xmin, self.ymin],
            [self.xmax, self.ymin],
            [self.xmax, self.ymax],
            [self.xmin, self.ymax],
            [self.xmin, self.ymin],
        ]
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {}) [{}]",
            self.xmin, self.ymin, self.xmax, self.ymax, self.crs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area() {
        let bbox = BoundingBox::new(
            2_600_000.0,
            1_200_000.0,
            2_601_000.0,
            1_201_000.0,
            CoordinateSystem::Lv95,
        )
        .unwrap();
        assert_eq!(bbox.area(), 1_000_000.0);
        assert_eq!(bbox.as_array(), [2_600_000.0, 1_200_000.0, 2_601_000.0, 1_201_000.0]);
    }

    #[test]
    fn test_inverted_extents_rejected() {
        assert!(BoundingBox::new(1.0, 0.0, 0.0, 1.0, CoordinateSystem::Lv95).is_err());
        assert!(BoundingBox::new(0.0, 1.0, 1.0, 1.0, CoordinateSystem::Lv95).is_err());
        assert!(BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0, CoordinateSystem::Lv95).is_err());
    }

    #[test]
    fn test_intersects() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0, CoordinateSystem::Lv95).unwrap();
        let b = BoundingBox::new(10.0, 10.0, 20.0, 20.0, CoordinateSystem::Lv95).unwrap();
        let c = BoundingBox::new(11.0, 0.0, 20.0, 5.0, CoordinateSystem::Lv95).unwrap();
        let d = BoundingBox::new(0.0, 0.0, 10.0, 10.0, CoordinateSystem::Wgs84).unwrap();
        assert!(a.intersects(&b)); // Corner touch
        assert!(!a.intersects(&c));
        assert!(!a.intersects(&d)); // Different systems
    }

    #[test]
    fn test_ring_closed() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0, CoordinateSystem::Lv95).unwrap();
        let ring = bbox.ring();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], ring[4]);
    }
}
