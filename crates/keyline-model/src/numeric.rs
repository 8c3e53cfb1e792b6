//! Decimal rounding shared by fingerprints and canonical output.

/// Round `value` to `places` decimal places.
///
/// The value is formatted with `places` fractional digits and parsed back.
/// The formatter works on the exact binary value and breaks exact ties to
/// the even digit, so `0.125` becomes `0.12` while `1.005` (stored just below
/// the tie) becomes `1.0`. This agrees with Python's `round`. Non-finite
/// values are returned unchanged.
pub fn round_decimal(value: f64, places: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let rounded = format!("{:.*}", places, value)
        .parse::<f64>()
        .unwrap_or(value);
    // Normalise negative zero so "-0.0" never leaks into serialised output.
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
