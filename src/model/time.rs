//! Timestamp helpers.
//!
//! All stored timestamps are Unix epoch milliseconds.

use chrono::{NaiveDateTime, Utc};

/// Largest integer still read as seconds by [`parse_time_to_epoch_ms`].
const MAX_EPOCH_SECONDS: i64 = 9_999_999_999;

/// Current time in Unix milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parse a server-provided time into Unix milliseconds.
///
/// Accepts epoch seconds (up to ten digits), epoch milliseconds, or
/// `YYYY-MM-DD HH:MM:SS` in UTC. Anything unparseable, including an empty
/// string, yields 0.
#[must_use]
pub fn parse_time_to_epoch_ms(time: &str) -> i64 {
    let t = time.trim();
    if t.is_empty() {
        return 0;
    }

    if let Ok(n) = t.parse::<i64>() {
        return if (1..=MAX_EPOCH_SECONDS).contains(&n) {
            n * 1000
        } else {
            n
        };
    }

    NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(0)
}
