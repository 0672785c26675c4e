//! Extracted forecast records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One extracted value at one grid cell for one variable and valid time.
///
/// `latitude`/`longitude` are the matched grid cell's coordinates, not the
/// query point, so stored points always coincide with grid cell centers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub valid_time_utc: DateTime<Utc>,
    pub run_time_utc: DateTime<Utc>,
    pub latitude: f32,
    pub longitude: f32,
    pub variable: String,
    pub value: f32,
    pub source_uri: String,
}

impl ForecastRecord {
    /// The storage uniqueness key: (valid time, run time, lat, lon, variable).
    pub fn key(&self) -> (DateTime<Utc>, DateTime<Utc>, u32, u32, &str) {
        (
            self.valid_time_utc,
            self.run_time_utc,
            self.latitude.to_bits(),
            self.longitude.to_bits(),
            self.variable.as_str(),
        )
    }

    /// Forecast lead time in whole hours.
    pub fn lead_hours(&self) -> i64 {
        (self.valid_time_utc - self.run_time_utc).num_hours()
    }
}
