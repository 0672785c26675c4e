//! Model run identification and HRRR object naming.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// HRRR domain sector used in object keys.
pub const HRRR_SECTOR: &str = "conus";

/// HRRR surface product name used in object keys.
pub const HRRR_SURFACE_PRODUCT: &str = "wrfsfcf";

/// One model execution: a calendar date and the configured cycle hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunIdentifier {
    pub run_date: NaiveDate,
    pub run_hour: u32,
}

impl RunIdentifier {
    pub fn new(run_date: NaiveDate, run_hour: u32) -> Self {
        Self { run_date, run_hour }
    }

    /// Issuance time of the run in UTC.
    pub fn run_time(&self) -> DateTime<Utc> {
        let naive = self
            .run_date
            .and_hms_opt(self.run_hour % 24, 0, 0)
            .unwrap_or_default();
        Utc.from_utc_datetime(&naive)
    }

    /// The product for one forecast hour of this run.
    pub fn product(&self, forecast_hour: u32) -> HrrrProduct {
        HrrrProduct {
            run: *self,
            forecast_hour,
        }
    }

    /// Date component as used in object keys and cache directories (YYYYMMDD).
    pub fn date_stamp(&self) -> String {
        self.run_date.format("%Y%m%d").to_string()
    }
}

impl std::fmt::Display for RunIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:02}z", self.run_date, self.run_hour)
    }
}

/// One forecast hour file of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HrrrProduct {
    pub run: RunIdentifier,
    pub forecast_hour: u32,
}

impl HrrrProduct {
    /// File name without the date/sector prefix.
    /// Format: hrrr.t{HH}z.wrfsfcf{FF}.grib2
    pub fn file_name(&self) -> String {
        format!(
            "hrrr.t{:02}z.{}{:02}.grib2",
            self.run.run_hour, HRRR_SURFACE_PRODUCT, self.forecast_hour
        )
    }

    /// Remote object key.
    /// Format: hrrr.{YYYYMMDD}/conus/hrrr.t{HH}z.wrfsfcf{FF}.grib2
    pub fn object_key(&self) -> String {
        format!(
            "hrrr.{}/{}/{}",
            self.run.date_stamp(),
            HRRR_SECTOR,
            self.file_name()
        )
    }

    /// Key of the sidecar inventory for this object.
    pub fn index_key(&self) -> String {
        format!("{}.idx", self.object_key())
    }

    /// Local cache location relative to the cache root: {YYYYMMDD}/{file_name}
    pub fn cache_relative_path(&self) -> PathBuf {
        PathBuf::from(self.run.date_stamp()).join(self.file_name())
    }
}
