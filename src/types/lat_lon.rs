use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second (index 1).
/// Both values are in decimal degrees.
///
/// # Examples
///
/// ```
/// use urma_wind::LatLon;
///
/// let new_york = LatLon(40.7128, -74.0060);
/// assert_eq!(new_york.0, 40.7128); // Latitude
/// assert_eq!(new_york.1, -74.0060); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon(pub f64, pub f64);

impl LatLon {
    pub fn latitude(&self) -> f64 {
        self.0
    }

    pub fn longitude(&self) -> f64 {
        self.1
    }

    /// Returns `true` when both components are finite, the latitude lies in [-90, 90]
    /// and the longitude in [-180, 180].
    ///
    /// ```
    /// use urma_wind::LatLon;
    ///
    /// assert!(LatLon(40.7128, -74.0060).is_valid());
    /// assert!(!LatLon(91.0, 0.0).is_valid());
    /// assert!(!LatLon(0.0, f64::NAN).is_valid());
    /// ```
    pub fn is_valid(&self) -> bool {
        self.0.is_finite()
            && self.1.is_finite()
            && (-90.0..=90.0).contains(&self.0)
            && (-180.0..=180.0).contains(&self.1)
    }

    /// Sum of absolute latitude and longitude differences, in degrees.
    ///
    /// This is the proxy used for nearest-cell selection. It is not a geodesic distance.
    pub fn l1_degrees(&self, other: &LatLon) -> f64 {
        (self.0 - other.0).abs() + (self.1 - other.1).abs()
    }

    /// Great-circle distance in kilometers.
    pub fn distance_km(&self, other: &LatLon) -> f64 {
        haversine::distance(
            haversine::Location {
                latitude: self.0,
                longitude: self.1,
            },
            haversine::Location {
                latitude: other.0,
                longitude: other.1,
            },
            haversine::Units::Kilometers,
        )
    }
}

impl fmt::Display for LatLon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

/// Wraps a longitude in degrees into [-180, 180).
pub(crate) fn normalize_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}
