//! Conversions between wire-level microsecond intervals and `Duration`

use std::time::Duration;

/// Convert a wire `interval_us` value into a delay.
///
/// The interop protocol carries intervals as signed 32-bit microseconds.
/// Negative values are treated as "no delay", like a zero or negative timer.
pub fn interval_from_micros(interval_us: i32) -> Duration {
    u64::try_from(interval_us)
        .map(Duration::from_micros)
        .unwrap_or(Duration::ZERO)
}

/// Microseconds in `delay`, saturating at `u64::MAX`.
///
/// Used for structured log fields.
pub fn as_micros_u64(delay: Duration) -> u64 {
    u64::try_from(delay.as_micros()).unwrap_or(u64::MAX)
}
