//! Epoch timestamp conversion.
//!
//! The provider stamps trades in **milliseconds since Unix epoch**. Tickers
//! store calendar timestamps in UTC.

use chrono::{DateTime, Utc};

/// Convert epoch milliseconds to a UTC timestamp.
///
/// Returns `None` when `ms` is outside the range `chrono` can represent.
#[inline]
pub fn from_epoch_ms(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}
