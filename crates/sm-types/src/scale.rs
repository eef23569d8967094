//! Unit scaling between user-declared units and service storage units.
//!
//! The remote service stores parameter values with a limited numeric
//! precision, so very small magnitudes (e.g. concentrations expressed in
//! meters instead of microns) would be truncated on its side. Parameters
//! whose defining bound is small enough are therefore rescaled by a power
//! of ten before they are sent, and rescaled back when values come home.
//!
//! The conversion is deliberately lossy at a bounded precision: service
//! units are rounded to 2 decimal places, user units to `exponent + 2`
//! decimal places. Round-trips are equivalent at that rounding precision,
//! not bit-for-bit.

/// Scale threshold used by the direct-endpoint integration: any defining
/// bound below 1 (order of magnitude <= -1) is rescaled.
pub const DIRECT_SCALE_FLOOR: i32 = -1;

/// Scale threshold used by the file-exchange integration: only bounds
/// below 1e-4 (order of magnitude <= -5) are rescaled.
pub const EXCHANGE_SCALE_FLOOR: i32 = -5;

/// Decimal places kept on values expressed in service units.
pub const SERVICE_UNIT_DECIMALS: u32 = 2;

/// Base-10 order of magnitude of a value: `floor(log10(|value|))`.
///
/// The value must be non-zero; `log10(0)` is undefined and callers are
/// expected to have rejected zero bounds during validation.
pub fn order_of_magnitude(value: f64) -> i32 {
    value.abs().log10().floor() as i32
}

/// Compute the scale exponent for a defining bound, if one applies.
///
/// Returns `Some(k)` with `k = |floor(log10(|bound|))|` when the order of
/// magnitude is at or below `scale_floor`, `None` otherwise.
pub fn scale_exponent(bound: f64, scale_floor: i32) -> Option<u32> {
    let exp = order_of_magnitude(bound);
    if exp <= scale_floor {
        Some(exp.unsigned_abs())
    } else {
        None
    }
}

/// Round a value to `digits` decimal places.
pub fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// Convert a user-unit value to service units: multiply by `10^exponent`
/// and round to [`SERVICE_UNIT_DECIMALS`] places.
pub fn to_service_units(value: f64, exponent: u32) -> f64 {
    round_to(value * 10f64.powi(exponent as i32), SERVICE_UNIT_DECIMALS)
}

/// Convert a service-unit value back to user units: divide by
/// `10^exponent` and round to `exponent + 2` places.
pub fn to_user_units(value: f64, exponent: u32) -> f64 {
    round_to(
        value / 10f64.powi(exponent as i32),
        exponent + SERVICE_UNIT_DECIMALS,
    )
}
