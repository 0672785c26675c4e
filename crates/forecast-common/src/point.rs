//! Geographic target points.

use serde::{Deserialize, Serialize};

use crate::{ForecastError, ForecastResult};

/// A geographic point in degrees.
///
/// Longitude is accepted in [-180, 180]; grids store longitude in [0, 360),
/// so comparisons go through [`GeoPoint::normalized_longitude`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Create a point, rejecting coordinates outside the accepted input ranges.
    pub fn checked(latitude: f64, longitude: f64) -> ForecastResult<Self> {
        let point = Self::new(latitude, longitude);
        point.validate()?;
        Ok(point)
    }

    pub fn validate(&self) -> ForecastResult<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ForecastError::InvalidConfig(format!(
                "latitude {} outside [-90, 90]",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ForecastError::InvalidConfig(format!(
                "longitude {} outside [-180, 180]",
                self.longitude
            )));
        }
        Ok(())
    }

    /// Longitude mapped into [0, 360).
    pub fn normalized_longitude(&self) -> f64 {
        normalize_longitude(self.longitude)
    }
}

/// Map any longitude in degrees into [0, 360).
pub fn normalize_longitude(longitude: f64) -> f64 {
    let wrapped = longitude.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360.0
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_western_longitude_wraps() {
        let point = GeoPoint::new(31.0069, -88.01);
        assert!((point.normalized_longitude() - 271.99).abs() < 1e-9);
    }

    #[test]
    fn test_antimeridian_is_single_value() {
        let east = GeoPoint::new(0.0, 180.0).normalized_longitude();
        let west = GeoPoint::new(0.0, -180.0).normalized_longitude();
        assert_eq!(east, 180.0);
        assert_eq!(east, west);
    }

    #[test]
    fn test_eastern_longitude_unchanged() {
        assert_eq!(normalize_longitude(12.5), 12.5);
        assert_eq!(normalize_longitude(0.0), 0.0);
    }

    #[test]
    fn test_tiny_negative_longitude_stays_in_range() {
        let lon = normalize_longitude(-1e-20);
        assert!((0.0..360.0).contains(&lon));
    }

    #[test]
    fn test_checked_rejects_out_of_range() {
        assert!(GeoPoint::checked(91.0, 0.0).is_err());
        assert!(GeoPoint::checked(0.0, -180.5).is_err());
        assert!(GeoPoint::checked(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::checked(45.0, -180.0).is_ok());
    }
}
