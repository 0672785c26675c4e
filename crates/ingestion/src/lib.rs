//! HRRR forecast ingestion library.
//!
//! Resolves the latest complete model run, materializes each forecast hour
//! through a local file cache, extracts catalog variables at target points
//! and stores the records idempotently.
//!
//! # Architecture
//!
//! - [`VariableCatalog`]: human-readable names to GRIB2 field filters
//! - [`RunResolver`]: completeness probing over the remote archive
//! - [`Extractor`]: nearest-cell extraction with an [`ExtractionObserver`]
//! - [`IngestionPipeline`]: bounded worker pool over forecast hours and a
//!   single batch upsert

pub mod config;
pub mod error;
pub mod extract;
pub mod inventory;
pub mod points;
pub mod resolver;
pub mod variables;
mod ingester;

// Re-exports
pub use config::IngestConfig;
pub use error::ExtractionError;
pub use extract::{nearest_cell, ExtractionObserver, Extractor, NearestCell, TracingObserver};
pub use ingester::{IngestRequest, IngestSummary, IngestionPipeline};
pub use inventory::{parse_idx, IdxEntry};
pub use points::{load_points, parse_points};
pub use resolver::{RunResolver, DEFAULT_LOOKBACK_DAYS};
pub use variables::{VariableCatalog, VariableSpec};
