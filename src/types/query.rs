//! The request side of a wind speed lookup: where and when.

use crate::error::WindSpeedError;
use crate::types::lat_lon::LatLon;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Format accepted for timestamp strings, e.g. `2024-12-28 12:00`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A single wind speed request.
///
/// Build one with [`Query::parse`] from raw user input, or with [`Query::new`]
/// when the timestamp is already a [`NaiveDateTime`]. Timestamps are interpreted as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub location: LatLon,
    pub timestamp: NaiveDateTime,
}

impl Query {
    /// Creates a query, rejecting coordinates outside [-90, 90] / [-180, 180].
    pub fn new(location: LatLon, timestamp: NaiveDateTime) -> Result<Self, WindSpeedError> {
        if !location.is_valid() {
            return Err(WindSpeedError::InvalidCoordinate {
                lat: location.0,
                lon: location.1,
            });
        }
        Ok(Self {
            location,
            timestamp,
        })
    }

    /// Parses `timestamp` with [`TIMESTAMP_FORMAT`] and validates the coordinate.
    ///
    /// The timestamp is checked first, so a malformed timestamp is reported even
    /// when the coordinate is also invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use urma_wind::{LatLon, Query, WindSpeedError};
    ///
    /// let query = Query::parse(40.7128, -74.0060, "2024-12-28 12:00").unwrap();
    /// assert_eq!(query.location, LatLon(40.7128, -74.0060));
    ///
    /// let err = Query::parse(40.7128, -74.0060, "2024/12/28 12:00").unwrap_err();
    /// assert!(matches!(err, WindSpeedError::Parse { .. }));
    /// ```
    pub fn parse(lat: f64, lon: f64, timestamp: &str) -> Result<Self, WindSpeedError> {
        let timestamp = parse_timestamp(timestamp)?;
        Self::new(LatLon(lat, lon), timestamp)
    }
}

pub fn parse_timestamp(input: &str) -> Result<NaiveDateTime, WindSpeedError> {
    NaiveDateTime::parse_from_str(input, TIMESTAMP_FORMAT).map_err(|source| {
        WindSpeedError::Parse {
            input: input.to_string(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_timestamp() {
        let parsed = parse_timestamp("2024-12-28 12:00").unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 12, 28)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(parsed, expected);

        let with_minutes = parse_timestamp("2024-01-05 07:45").unwrap();
        assert_eq!(with_minutes.format("%H:%M").to_string(), "07:45");
    }

    #[test]
    fn test_malformed_timestamps_are_parse_errors() {
        for input in [
            "2024/12/28 12:00",
            "not-a-date",
            "",
            "2024-12-28",
            "2024-12-28T12:00",
            "2024-13-01 12:00",
            "2024-12-28 25:00",
        ] {
            let err = parse_timestamp(input).unwrap_err();
            match err {
                WindSpeedError::Parse { input: echoed, .. } => assert_eq!(echoed, input),
                other => panic!("expected parse error for {:?}, got {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_query_rejects_out_of_range_coordinates() {
        for (lat, lon) in [(90.5, 0.0), (-91.0, 0.0), (0.0, 180.1), (0.0, -200.0)] {
            let err = Query::parse(lat, lon, "2024-12-28 12:00").unwrap_err();
            assert!(
                matches!(err, WindSpeedError::InvalidCoordinate { .. }),
                "({}, {}) should be rejected",
                lat,
                lon
            );
        }
        assert!(Query::parse(90.0, -180.0, "2024-12-28 12:00").is_ok());
    }

    #[test]
    fn test_parse_error_wins_over_invalid_coordinate() {
        let err = Query::parse(120.0, 0.0, "garbage").unwrap_err();
        assert!(matches!(err, WindSpeedError::Parse { .. }));
    }
}
