//! Master volume arithmetic.
//!
//! Out-of-range volume requests are clamped, never rejected: `VOL SET 150`
//! lands at 100 and `VOL -10` from 5 lands at 0.  The intermediate sum of a
//! relative adjustment is computed in `i64`, so no `i32` input can overflow.

use crate::protocol::commands::VOLUME_MAX;

/// Clamps any integer to the 0..=100 volume range.
///
/// ```rust
/// use songled_core::domain::clamp_volume;
///
/// assert_eq!(clamp_volume(150), 100);
/// assert_eq!(clamp_volume(-3), 0);
/// assert_eq!(clamp_volume(42), 42);
/// ```
pub fn clamp_volume(value: i64) -> u8 {
    // Lossless after the clamp.
    value.clamp(0, i64::from(VOLUME_MAX)) as u8
}

/// Applies a signed delta to `current` and clamps the result.
pub fn adjust_volume(current: u8, delta: i32) -> u8 {
    clamp_volume(i64::from(current) + i64::from(delta))
}

/// Converts a 0.0..=1.0 scalar (as exposed by audio APIs) to a percentage.
pub fn scalar_to_percent(scalar: f32) -> u8 {
    clamp_volume((f64::from(scalar) * 100.0).round() as i64)
}

/// Converts a percentage to the 0.0..=1.0 scalar form.
pub fn percent_to_scalar(percent: u8) -> f32 {
    f32::from(percent.min(VOLUME_MAX)) / 100.0
}
