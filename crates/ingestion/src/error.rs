//! Error types for point and variable extraction.

use grib2_parser::Grib2Error;
use thiserror::Error;

/// Failures scoped to one variable or one (variable, point) pair.
///
/// These never abort an ingestion run: the extractor logs them and moves on.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("No field for {variable} ({filter})")]
    FieldNotFound { variable: String, filter: String },

    #[error("Failed to read {variable}: {source}")]
    Grib {
        variable: String,
        #[source]
        source: Grib2Error,
    },

    #[error("Invalid point {0}")]
    InvalidPoint(String),

    #[error("Point {point} is {distance:.3} degrees from the nearest cell (limit {limit})")]
    OutOfDomain {
        point: String,
        distance: f64,
        limit: f64,
    },

    #[error("Missing value for {variable} at cell {index}")]
    MissingValue { variable: String, index: usize },
}

impl ExtractionError {
    /// Build the error for a failed field open, separating "no match" from
    /// a malformed file.
    pub fn from_grib(variable: &str, err: Grib2Error) -> Self {
        match err {
            Grib2Error::FieldNotFound(filter) => ExtractionError::FieldNotFound {
                variable: variable.to_string(),
                filter,
            },
            source => ExtractionError::Grib {
                variable: variable.to_string(),
                source,
            },
        }
    }

    /// Short stable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::UnknownVariable(_) => "unknown_variable",
            ExtractionError::FieldNotFound { .. } => "field_not_found",
            ExtractionError::Grib { .. } => "grib",
            ExtractionError::InvalidPoint(_) => "invalid_point",
            ExtractionError::OutOfDomain { .. } => "out_of_domain",
            ExtractionError::MissingValue { .. } => "missing_value",
        }
    }
}
