//! Run-level error taxonomy for forecast ingestion.

use thiserror::Error;

/// Result type alias using ForecastError.
pub type ForecastResult<T> = Result<T, ForecastError>;

/// Errors that abort a run, a forecast hour, or a storage batch.
///
/// Point and variable level failures during extraction are not represented
/// here; they are recovered where they happen.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// No complete run was found inside the lookback window.
    #[error("No complete run found: {0}")]
    NotFound(String),

    /// The remote archive has no object under the requested key.
    #[error("Object not found: {0}")]
    MissingObject(String),

    /// A remote existence check or download failed.
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// Schema creation or a batch write failed. Nothing from the batch is persisted.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl ForecastError {
    /// Short stable label, used as a metrics/log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::NotFound(_) => "not_found",
            ForecastError::MissingObject(_) => "missing_object",
            ForecastError::Transfer(_) => "transfer",
            ForecastError::Storage(_) => "storage",
            ForecastError::InvalidConfig(_) => "invalid_config",
            ForecastError::Io(_) => "io",
        }
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ForecastError::Transfer(_) | ForecastError::Io(_))
    }
}

impl From<std::io::Error> for ForecastError {
    fn from(err: std::io::Error) -> Self {
        ForecastError::Io(err.to_string())
    }
}
