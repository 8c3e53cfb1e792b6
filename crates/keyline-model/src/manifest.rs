//! Provenance manifest.

use crate::{round_decimal, ProcessingParameters, RasterStats};
use serde::{Deserialize, Serialize};

/// Attribution required by the swissALTI3D terms of use.
pub const ATTRIBUTION: &str = "Source: Federal Office of Topography swisstopo";

/// Record of exactly how one set of outputs was produced.
///
/// Serialised with sorted keys as `manifest.json` in the output directory.
/// Its presence is the durable signal that a run completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceManifest {
    pub aoi_hash: String,
    pub parameters: ProcessingParameters,
    pub tiles_used: Vec<String>,
    pub dem_stats: RasterStats,
    pub contour_count: usize,
    /// Wall time in seconds, rounded to milliseconds.
    pub elapsed_seconds: f64,
    pub attribution: String,
}

impl ProvenanceManifest {
    pub fn new(
        aoi_hash: impl Into<String>,
        parameters: ProcessingParameters,
        tiles_used: Vec<String>,
        dem_stats: RasterStats,
        contour_count: usize,
        elapsed_seconds: f64,
    ) -> Self {
        Self {
            aoi_hash: aoi_hash.into(),
            parameters,
            tiles_used,
            dem_stats,
            contour_count,
            elapsed_seconds: round_decimal(elapsed_seconds, 3),
            attribution: ATTRIBUTION.to_string(),
        }
    }

    /// Pretty JSON with lexicographically sorted keys at every level.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        // Going through `Value` sorts struct fields as well as map keys.
        let value = serde_json::to_value(self)?;
        serde_json::to_string_pretty(&value)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProvenanceManifest {
        ProvenanceManifest::new(
            "0123456789abcdef",
            ProcessingParameters::default(),
            vec!["tile-a".to_string(), "tile-b".to_string()],
            RasterStats {
                min: 500.0,
                max: 620.5,
                mean: 560.25,
                std: 12.5,
                nodata: Some(-9999.0),
                width: 500,
                height: 500,
                crs: "EPSG:2056".to_string(),
            },
            42,
            1.234_567,
        )
    }

    #[test]
    fn test_elapsed_rounded() {
        assert_eq!(sample().elapsed_seconds, 1.235);
    }

    #[test]
    fn test_top_level_keys_sorted() {
        let text = sample().to_json_pretty().unwrap();
        let order = [
            "\"aoi_hash\"",
            "\"attribution\"",
            "\"contour_count\"",
            "\"dem_stats\"",
            "\"elapsed_seconds\"",
            "\"parameters\"",
            "\"tiles_used\"",
        ];
        let positions: Vec<usize> = order.iter().map(|k| text.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{text}");
        assert!(text.contains(ATTRIBUTION));
    }

    #[test]
    fn test_json_roundtrip() {
        let manifest = sample();
        let parsed = ProvenanceManifest::from_json(&manifest.to_json_pretty().unwrap()).unwrap();
        assert_eq!(parsed, manifest);
    }
}
