//! Deterministic cache keys.
//!
//! Both keys are truncated SHA-256 digests of canonical JSON: object keys
//! sorted, no whitespace. `serde_json` without `preserve_order` stores objects
//! in a `BTreeMap`, so plain serialisation of a [`Value`] is already sorted.

use keyline_model::{round_decimal, Aoi, ProcessingParameters};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Hex characters kept from the AOI digest.
pub const AOI_KEY_LEN: usize = 16;

/// Hex characters kept from the parameters digest.
pub const PARAMS_KEY_LEN: usize = 12;

/// Decimal places kept in coordinates before hashing (centimetres in LV95).
pub const COORDINATE_PRECISION: usize = 2;

/// Copy of `value` with every float beneath a `coordinates` key rounded.
///
/// Other members (and integers) are left untouched; nested objects are
/// visited so geometry collections are handled too.
pub fn round_coordinates(value: &Value, places: usize) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, member) in map {
                let rounded = if key == "coordinates" {
                    round_numbers(member, places)
                } else {
                    round_coordinates(member, places)
                };
                out.insert(key.clone(), rounded);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| round_coordinates(v, places)).collect()),
        other => other.clone(),
    }
}

fn round_numbers(value: &Value, places: usize) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(|v| round_numbers(v, places)).collect()),
        Value::Number(n) if n.is_f64() => n
            .as_f64()
            .and_then(|f| serde_json::Number::from_f64(round_decimal(f, places)))
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}

/// Compact JSON with sorted keys.
pub fn canonical_json(value: &Value) -> String {
    // Serialising a Value cannot fail.
    serde_json::to_string(value).unwrap_or_default()
}

fn digest_prefix(text: &str, len: usize) -> String {
    let digest = hex::encode(Sha256::digest(text.as_bytes()));
    digest[..len].to_string()
}

/// 16-hex-character key of a normalised AOI.
///
/// Computed over the LV95 geometry only; the source CRS does not take part,
/// so the same area supplied in WGS84 or LV95 maps to the same key whenever
/// the reprojected coordinates agree to the centimetre.
///
/// Coordinates are hashed as parsed floats, so `2600000` and `2600000.0` in
/// the input give the same key (both serialise as `2600000.0`). Keys are
/// therefore not interchangeable with hashes taken over the raw input text.
pub fn aoi_fingerprint(aoi: &Aoi) -> String {
    let rounded = round_coordinates(&aoi.geometry().to_geojson(), COORDINATE_PRECISION);
    digest_prefix(&canonical_json(&rounded), AOI_KEY_LEN)
}

/// 12-hex-character key of the processing parameters.
pub fn params_fingerprint(params: &ProcessingParameters) -> String {
    let value = serde_json::to_value(params).unwrap_or(Value::Null);
    digest_prefix(&canonical_json(&value), PARAMS_KEY_LEN)
}
