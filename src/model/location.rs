//! Location fixes and the daily history fetch ledger.

use crate::model::ids::BeaconId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Storage format for calendar days.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// One observed location fix for a beacon.
///
/// `(beacon_id, timestamp)` is the natural key: overlapping fetch windows
/// that return the same fix collapse into one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationReport {
    pub beacon_id: BeaconId,

    /// Observation timestamp (Unix milliseconds)
    pub timestamp: i64,

    pub latitude: f64,
    pub longitude: f64,

    /// Horizontal accuracy in meters
    pub horizontal_accuracy: f64,

    pub confidence: Option<i64>,

    /// Raw status byte reported alongside the fix
    pub status: Option<i64>,

    pub battery_level: Option<String>,

    /// When the report was published by the network (Unix milliseconds)
    pub published_at: Option<i64>,
}

impl LocationReport {
    /// Build a fix with only the required fields set.
    #[must_use]
    pub fn new(beacon_id: BeaconId, timestamp: i64, latitude: f64, longitude: f64) -> Self {
        Self {
            beacon_id,
            timestamp,
            latitude,
            longitude,
            horizontal_accuracy: 0.0,
            confidence: None,
            status: None,
            battery_level: None,
            published_at: None,
        }
    }
}

/// Ledger entry recording that a beacon's history for one day was fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyHistoryFetchRecord {
    pub beacon_id: BeaconId,
    pub day: NaiveDate,

    /// When the fetch happened (Unix milliseconds)
    pub fetched_at: i64,
}

/// Format a day for storage.
#[must_use]
pub fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

/// Parse a stored day.
///
/// # Errors
///
/// Returns the chrono parse error if the text is not `YYYY-MM-DD`.
pub fn parse_day(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s, DAY_FORMAT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_format() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(format_day(day), "2024-03-07");
        assert_eq!(parse_day("2024-03-07").unwrap(), day);
        assert!(parse_day("07/03/2024").is_err());
    }
}
