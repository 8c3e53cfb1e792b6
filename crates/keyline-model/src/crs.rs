//! Supported coordinate systems and resolution tiers.

use crate::{ModelError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// Supported coordinate reference systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateSystem {
    /// Swiss CH1903+ / LV95 (EPSG:2056). The canonical system.
    Lv95,
    /// WGS 84 geographic longitude/latitude (EPSG:4326).
    Wgs84,
}

impl CoordinateSystem {
    /// The system every AOI is normalised into.
    pub const CANONICAL: CoordinateSystem = CoordinateSystem::Lv95;

    /// Authority identifier, e.g. `EPSG:2056`.
    pub fn identifier(self) -> &'static str {
        match self {
            CoordinateSystem::Lv95 => "EPSG:2056",
            CoordinateSystem::Wgs84 => "EPSG:4326",
        }
    }

    /// Integer EPSG code.
    pub fn epsg_code(self) -> u32 {
        match self {
            CoordinateSystem::Lv95 => 2056,
            CoordinateSystem::Wgs84 => 4326,
        }
    }

    /// Look up a system by its EPSG code.
    pub fn from_epsg(code: u32) -> Result<Self> {
        match code {
            2056 => Ok(CoordinateSystem::Lv95),
            4326 => Ok(CoordinateSystem::Wgs84),
            other => Err(ModelError::UnsupportedCoordinateSystem(format!("EPSG:{other}"))),
        }
    }
}

impl std::fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for CoordinateSystem {
    type Err = ModelError;

    /// Accepts `lv95`, `wgs84` (any case) or an `EPSG:<code>` identifier.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "lv95" | "ch1903+" => Ok(CoordinateSystem::Lv95),
            "wgs84" => Ok(CoordinateSystem::Wgs84),
            _ => {
                let code = lower
                    .strip_prefix("epsg:")
                    .and_then(|c| c.parse::<u32>().ok())
                    .ok_or_else(|| ModelError::UnsupportedCoordinateSystem(s.to_string()))?;
                Self::from_epsg(code)
            }
        }
    }
}

/// swissALTI3D resolution tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Resolution {
    /// 2.0 m ground sample distance (~1 MB per tile).
    #[default]
    Standard,
    /// 0.5 m ground sample distance (~26 MB per tile).
    High,
}

impl Resolution {
    /// Ground sample distance in metres.
    pub fn gsd(self) -> f64 {
        match self {
            Resolution::Standard => 2.0,
            Resolution::High => 0.5,
        }
    }

    /// Tier for an exact ground sample distance.
    pub fn from_gsd(gsd: f64) -> Result<Self> {
        if gsd == 2.0 {
            Ok(Resolution::Standard)
        } else if gsd == 0.5 {
            Ok(Resolution::High)
        } else {
            Err(ModelError::UnsupportedResolution(format!("{gsd} m")))
        }
    }

    /// Tier name as used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Resolution::Standard => "standard",
            Resolution::High => "high",
        }
    }
}

impl FromStr for Resolution {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Resolution::Standard),
            "high" => Ok(Resolution::High),
            _ => Err(ModelError::UnsupportedResolution(s.to_string())),
        }
    }
}

// Serialised as its ground sample distance so manifests and fingerprints
// carry the physical value, not a tier name.
impl Serialize for Resolution {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.gsd())
    }
}

impl<'de> Deserialize<'de> for Resolution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let gsd = f64::deserialize(deserializer)?;
        Resolution::from_gsd(gsd).map_err(serde::de::Error::custom)
    }
}
