//! Ingestion configuration.
//!
//! Loaded from environment variables (with defaults) or a YAML file.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use forecast_common::{ForecastError, ForecastResult};
use storage::ObjectStorageConfig;

/// Runtime configuration for one ingestion process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Remote bucket holding the HRRR archive
    pub bucket: String,
    /// Region of the bucket
    pub region: String,
    /// Endpoint override for S3-compatible mirrors
    pub endpoint: Option<String>,
    /// Cycle hour of the ingested run (UTC)
    pub run_hour: u32,
    /// Days to probe backwards when resolving the latest complete run
    pub lookback_days: u32,
    /// Forecast hours ingested when the request does not say otherwise
    pub default_num_hours: u32,
    /// Root of the local GRIB2 file cache
    pub cache_dir: PathBuf,
    /// Evict old run dates once the cache grows past this size
    pub cache_size_limit_bytes: Option<u64>,
    /// SQLite database file
    pub database_path: PathBuf,
    /// Forecast hours processed concurrently
    pub parallel_hours: usize,
    /// Download retries per forecast hour
    pub max_retries: u32,
    /// First retry delay (doubles each retry)
    pub initial_retry_delay_ms: u64,
    /// Reject points farther than this from the nearest cell (degrees)
    pub max_cell_distance_degrees: Option<f64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bucket: "noaa-hrrr-bdp-pds".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            run_hour: 6,
            lookback_days: 10,
            default_num_hours: 48,
            cache_dir: default_cache_dir(),
            cache_size_limit_bytes: None,
            database_path: PathBuf::from("data.db"),
            parallel_hours: 4,
            max_retries: 3,
            initial_retry_delay_ms: 2000,
            max_cell_distance_degrees: None,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("hrrr-ingest"))
        .unwrap_or_else(|| PathBuf::from("cache"))
}

impl IngestConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> ForecastResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ForecastResult<Self> {
        let defaults = Self::default();

        let config = Self {
            bucket: lookup("HRRR_BUCKET").unwrap_or(defaults.bucket),
            region: lookup("HRRR_REGION").unwrap_or(defaults.region),
            endpoint: lookup("HRRR_ENDPOINT").or(defaults.endpoint),
            run_hour: parse_var(&lookup, "HRRR_RUN_HOUR")?.unwrap_or(defaults.run_hour),
            lookback_days: parse_var(&lookup, "HRRR_LOOKBACK_DAYS")?
                .unwrap_or(defaults.lookback_days),
            default_num_hours: parse_var(&lookup, "HRRR_NUM_HOURS")?
                .unwrap_or(defaults.default_num_hours),
            cache_dir: lookup("HRRR_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            cache_size_limit_bytes: parse_var(&lookup, "HRRR_CACHE_SIZE_LIMIT")?
                .or(defaults.cache_size_limit_bytes),
            database_path: lookup("HRRR_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            parallel_hours: parse_var(&lookup, "HRRR_PARALLEL_HOURS")?
                .unwrap_or(defaults.parallel_hours),
            max_retries: parse_var(&lookup, "HRRR_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            initial_retry_delay_ms: parse_var(&lookup, "HRRR_RETRY_DELAY_MS")?
                .unwrap_or(defaults.initial_retry_delay_ms),
            max_cell_distance_degrees: parse_var(&lookup, "HRRR_MAX_CELL_DISTANCE")?
                .or(defaults.max_cell_distance_degrees),
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file. Missing keys take defaults.
    pub fn from_yaml(path: impl AsRef<Path>) -> ForecastResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            ForecastError::InvalidConfig(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ForecastResult<()> {
        if self.run_hour >= 24 {
            return Err(ForecastError::InvalidConfig(format!(
                "run_hour must be below 24, got {}",
                self.run_hour
            )));
        }
        if self.lookback_days == 0 {
            return Err(ForecastError::InvalidConfig(
                "lookback_days must be at least 1".to_string(),
            ));
        }
        if self.parallel_hours == 0 {
            return Err(ForecastError::InvalidConfig(
                "parallel_hours must be at least 1".to_string(),
            ));
        }
        if self.default_num_hours == 0 {
            return Err(ForecastError::InvalidConfig(
                "default_num_hours must be at least 1".to_string(),
            ));
        }
        if let Some(limit) = self.max_cell_distance_degrees {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(ForecastError::InvalidConfig(format!(
                    "max_cell_distance_degrees must be positive, got {}",
                    limit
                )));
            }
        }
        Ok(())
    }

    /// Object store connection for the configured bucket.
    pub fn storage_config(&self) -> ObjectStorageConfig {
        ObjectStorageConfig {
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            allow_http: self
                .endpoint
                .as_deref()
                .is_some_and(|e| e.starts_with("http://")),
            ..ObjectStorageConfig::default()
        }
    }

    pub fn initial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.initial_retry_delay_ms)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> ForecastResult<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ForecastError::InvalidConfig(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = IngestConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bucket, "noaa-hrrr-bdp-pds");
        assert_eq!(config.run_hour, 6);
        assert_eq!(config.lookback_days, 10);
        assert_eq!(config.default_num_hours, 48);
        assert_eq!(config.database_path, PathBuf::from("data.db"));
        assert!(config.cache_size_limit_bytes.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = IngestConfig::from_lookup(lookup(&[
            ("HRRR_RUN_HOUR", "12"),
            ("HRRR_PARALLEL_HOURS", "8"),
            ("HRRR_CACHE_DIR", "/tmp/hrrr"),
            ("HRRR_CACHE_SIZE_LIMIT", "1000000"),
        ]))
        .unwrap();
        assert_eq!(config.run_hour, 12);
        assert_eq!(config.parallel_hours, 8);
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/hrrr"));
        assert_eq!(config.cache_size_limit_bytes, Some(1_000_000));
    }

    #[test]
    fn test_unparseable_value_is_rejected() {
        let result = IngestConfig::from_lookup(lookup(&[("HRRR_MAX_RETRIES", "lots")]));
        assert!(matches!(result, Err(ForecastError::InvalidConfig(msg)) if msg.contains("HRRR_MAX_RETRIES")));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = IngestConfig::default();
        config.run_hour = 24;
        assert!(config.validate().is_err());

        let mut config = IngestConfig::default();
        config.parallel_hours = 0;
        assert!(config.validate().is_err());

        let mut config = IngestConfig::default();
        config.lookback_days = 0;
        assert!(config.validate().is_err());

        let mut config = IngestConfig::default();
        config.max_cell_distance_degrees = Some(-1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_yaml_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingest.yaml");
        std::fs::write(&path, "run_hour: 18\nmax_retries: 1\nendpoint: http://localhost:9000\n")
            .unwrap();

        let config = IngestConfig::from_yaml(&path).unwrap();
        assert_eq!(config.run_hour, 18);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.lookback_days, 10);

        let storage = config.storage_config();
        assert!(storage.allow_http);
        assert!(storage.skip_signature);
    }
}
