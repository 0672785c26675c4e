//! Common types shared across the HRRR forecast ingestion crates.

pub mod error;
pub mod point;
pub mod record;
pub mod run;

pub use error::{ForecastError, ForecastResult};
pub use point::GeoPoint;
pub use record::ForecastRecord;
pub use run::{HrrrProduct, RunIdentifier, HRRR_SECTOR};
