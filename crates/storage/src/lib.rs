//! Storage for the HRRR ingestion pipeline.
//!
//! Provides:
//! - The remote object store (S3 compatible) holding model output
//! - A local write-once cache of downloaded GRIB2 files
//! - The deduplicated forecast record store (SQLite)

pub mod forecast_store;
pub mod grib_cache;
pub mod object_store;

pub use self::object_store::{ObjectStorage, ObjectStorageConfig, RemoteStore};
pub use forecast_store::{ForecastStore, UpsertSummary};
pub use grib_cache::{CacheStats, GribFileCache};
