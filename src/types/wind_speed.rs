//! Result types for a resolved wind speed and the policies used to obtain it.

use crate::grid::field::GridCell;
use crate::types::lat_lon::LatLon;
use crate::types::model::Model;
use crate::types::query::TIMESTAMP_FORMAT;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a point value is obtained from the gridded field.
///
/// The two policies are not equivalent and give different values for the same query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialPolicy {
    /// Take U and V from the single grid cell that minimizes `|Δlat| + |Δlon|`.
    /// Ties go to the first cell in row-major order.
    #[default]
    NearestCell,
    /// Combine U and V into speed at the four surrounding cells, then interpolate
    /// bilinearly in grid index space. Needs a projected grid.
    Bilinear,
}

impl fmt::Display for SpatialPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpatialPolicy::NearestCell => write!(f, "nearest"),
            SpatialPolicy::Bilinear => write!(f, "bilinear"),
        }
    }
}

/// A resolved near-surface wind speed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindSpeed {
    /// Wind speed magnitude in m/s, always `>= 0`.
    pub speed_m_s: f64,
    /// U component used, m/s. `None` for interpolated results.
    pub u: Option<f64>,
    /// V component used, m/s. `None` for interpolated results.
    pub v: Option<f64>,
    /// The grid cell the components were taken from (nearest-cell policy only).
    pub cell: Option<GridCell>,
    /// Great-circle distance between the query and `cell`, in km.
    pub cell_distance_km: Option<f64>,
    pub location: LatLon,
    pub requested_time: NaiveDateTime,
    /// Valid time of the analysis the value was read from.
    pub valid_time: NaiveDateTime,
    pub model: Model,
    pub policy: SpatialPolicy,
}

/// Combines U and V wind components into a scalar speed.
///
/// ```
/// assert_eq!(urma_wind::wind_speed(3.0, -4.0), 5.0);
/// ```
pub fn wind_speed(u: f64, v: f64) -> f64 {
    (u * u + v * v).sqrt()
}

/// Message shown after a successful lookup, echoing the request.
///
/// ```
/// let msg = urma_wind::format_success(40.7128, -74.006, "2024-12-28 12:00", 5.678);
/// assert_eq!(msg, "Wind speed at (40.7128, -74.006) on 2024-12-28 12:00: 5.68 m/s");
/// ```
pub fn format_success(lat: f64, lon: f64, timestamp: &str, speed_m_s: f64) -> String {
    format!(
        "Wind speed at ({}, {}) on {}: {:.2} m/s",
        lat, lon, timestamp, speed_m_s
    )
}

/// Message shown when a lookup fails.
///
/// Walks the whole `source()` chain so the underlying cause (an I/O or HTTP error)
/// is reported. Causes whose text already appears in the message are skipped.
pub fn format_failure(error: &dyn std::error::Error) -> String {
    let mut message = format!("Error fetching wind speed: {}", error);
    let mut cause = error.source();
    while let Some(inner) = cause {
        let text = inner.to_string();
        if !text.is_empty() && !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        cause = inner.source();
    }
    message
}

impl fmt::Display for WindSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_success(
            self.location.0,
            self.location.1,
            &self.requested_time.format(TIMESTAMP_FORMAT).to_string(),
            self.speed_m_s,
        ))
    }
}
