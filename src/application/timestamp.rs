//! Messages timestamp decoding.
//!
//! `message.date` counts nanoseconds since 2001-01-01 00:00:00 UTC.

use chrono::{DateTime, NaiveDateTime, TimeDelta};

/// 2001-01-01T00:00:00Z as a Unix timestamp.
pub const APPLE_EPOCH_UNIX_SECS: i64 = 978_307_200;

/// Shown when a message has no usable date.
pub const UNKNOWN_TIME: &str = "Unknown Time";

/// Converts a raw store timestamp to a calendar time.
///
/// `None` for missing or zero values and for anything outside chrono's range.
#[must_use]
pub fn to_datetime(raw: Option<i64>) -> Option<NaiveDateTime> {
    let raw = raw.filter(|r| *r != 0)?;
    let epoch = DateTime::from_timestamp(APPLE_EPOCH_UNIX_SECS, 0)?.naive_utc();
    epoch.checked_add_signed(TimeDelta::nanoseconds(raw))
}

/// Formats a raw store timestamp as `YYYY-MM-DD HH:MM:SS`, or [`UNKNOWN_TIME`].
#[must_use]
pub fn decode(raw: Option<i64>) -> String {
    to_datetime(raw).map_or_else(
        || UNKNOWN_TIME.to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}
