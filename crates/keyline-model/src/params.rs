//! Contour-generation parameters.

use crate::{ModelError, Resolution, Result};
use serde::{Deserialize, Serialize};

/// Parameters for contour generation.
///
/// Validated at construction: `interval > 0`, `simplify_tolerance >= 0`,
/// non-empty `attribute_name`. Every field affects output content, so every
/// field takes part in the parameters fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParameters")]
pub struct ProcessingParameters {
    interval: f64,
    attribute_name: String,
    simplify_tolerance: f64,
    resolution: Resolution,
}

#[derive(Deserialize)]
struct RawParameters {
    interval: f64,
    attribute_name: String,
    simplify_tolerance: f64,
    resolution: Resolution,
}

impl TryFrom<RawParameters> for ProcessingParameters {
    type Error = ModelError;

    fn try_from(raw: RawParameters) -> Result<Self> {
        Self::new(
            raw.interval,
            raw.attribute_name,
            raw.simplify_tolerance,
            raw.resolution,
        )
    }
}

impl ProcessingParameters {
    /// Attribute carrying the contour elevation unless configured otherwise.
    pub const DEFAULT_ATTRIBUTE: &'static str = "elevation";

    /// Create validated parameters.
    pub fn new(
        interval: f64,
        attribute_name: impl Into<String>,
        simplify_tolerance: f64,
        resolution: Resolution,
    ) -> Result<Self> {
        if !(interval > 0.0) || !interval.is_finite() {
            return Err(ModelError::InvalidParameter(format!(
                "contour interval must be positive, got {interval}"
            )));
        }
        if !(simplify_tolerance >= 0.0) || !simplify_tolerance.is_finite() {
            return Err(ModelError::InvalidParameter(format!(
                "simplify tolerance must be non-negative, got {simplify_tolerance}"
            )));
        }
        let attribute_name = attribute_name.into();
        if attribute_name.trim().is_empty() {
            return Err(ModelError::InvalidParameter(
                "attribute name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            interval,
            attribute_name,
            simplify_tolerance,
            resolution,
        })
    }

    /// Contour interval in metres.
    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Name of the elevation property on output features.
    pub fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    /// Douglas-Peucker tolerance in CRS units. `0.0` disables simplification.
    pub fn simplify_tolerance(&self) -> f64 {
        self.simplify_tolerance
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
}

impl Default for ProcessingParameters {
    fn default() -> Self {
        Self {
            interval: 1.0,
            attribute_name: Self::DEFAULT_ATTRIBUTE.to_string(),
            simplify_tolerance: 0.0,
            resolution: Resolution::Standard,
        }
    }
}
