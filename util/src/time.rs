//! General time utility functions

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into fractional seconds, or `None` if the duration
/// cannot be represented as a number of nanoseconds.
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    match duration.num_nanoseconds() {
        Some(ns) => Some(ns as f64 / NANOS_PER_SECOND as f64),
        None => None,
    }
}
