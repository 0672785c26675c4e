//! Ingestion pipeline: resolve a run, fetch and extract each forecast hour,
//! then persist every record in one batch.

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use forecast_common::{
    ForecastError, ForecastRecord, ForecastResult, GeoPoint, HrrrProduct, RunIdentifier,
};
use grib2_parser::{Grib2GridReader, GridReader};
use storage::{ForecastStore, GribFileCache, ObjectStorage, RemoteStore};

use crate::config::IngestConfig;
use crate::extract::Extractor;
use crate::resolver::RunResolver;
use crate::variables::VariableCatalog;

/// Upper bound for the doubling retry delay.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(120);

/// What to ingest.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Explicit run date; resolved from the archive when absent
    pub run_date: Option<NaiveDate>,
    /// Forecast hours `0..num_hours`
    pub num_hours: u32,
    pub variables: Vec<String>,
    pub points: Vec<GeoPoint>,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSummary {
    pub run: RunIdentifier,
    /// Forecast hours whose file was fetched and extracted
    pub hours_processed: Vec<u32>,
    /// Forecast hours skipped after exhausting transfer retries
    pub failed_hours: Vec<u32>,
    pub records_extracted: usize,
    /// Records new to the store; the rest were already present
    pub records_inserted: u64,
}

/// Main ingestion pipeline.
pub struct IngestionPipeline {
    config: IngestConfig,
    remote: Arc<dyn RemoteStore>,
    cache: Arc<GribFileCache>,
    extractor: Arc<Extractor>,
    resolver: RunResolver,
    store: ForecastStore,
}

impl IngestionPipeline {
    /// Connect to the configured bucket and open the configured database.
    pub async fn new(config: &IngestConfig, catalog: Arc<VariableCatalog>) -> ForecastResult<Self> {
        let remote: Arc<dyn RemoteStore> = Arc::new(ObjectStorage::new(&config.storage_config())?);
        let store = ForecastStore::open(&config.database_path).await?;
        let reader: Arc<dyn GridReader> = Arc::new(Grib2GridReader::hrrr());

        Self::from_parts(config, remote, store, catalog, reader)
    }

    /// Assemble a pipeline from already-built collaborators.
    ///
    /// The config is validated here, so a pipeline never runs with
    /// settings `from_env` or `from_yaml` would have rejected.
    pub fn from_parts(
        config: &IngestConfig,
        remote: Arc<dyn RemoteStore>,
        store: ForecastStore,
        catalog: Arc<VariableCatalog>,
        reader: Arc<dyn GridReader>,
    ) -> ForecastResult<Self> {
        config.validate()?;

        let cache = Arc::new(
            GribFileCache::new(&config.cache_dir, remote.clone())
                .with_size_limit(config.cache_size_limit_bytes),
        );
        let extractor = Arc::new(
            Extractor::new(catalog, reader).with_max_distance(config.max_cell_distance_degrees),
        );
        let resolver = RunResolver::new(remote.clone(), config.run_hour)
            .with_lookback_days(config.lookback_days);

        Ok(Self {
            config: config.clone(),
            remote,
            cache,
            extractor,
            resolver,
            store,
        })
    }

    pub fn store(&self) -> &ForecastStore {
        &self.store
    }

    pub fn cache(&self) -> &GribFileCache {
        &self.cache
    }

    /// Ingest every forecast hour of one run.
    ///
    /// Resolution and storage failures are fatal. A forecast hour whose
    /// download keeps failing is reported in `failed_hours` and the other
    /// hours still go through.
    #[instrument(skip(self, request), fields(num_hours = request.num_hours, points = request.points.len()))]
    pub async fn run(&self, request: IngestRequest) -> ForecastResult<IngestSummary> {
        if request.num_hours == 0 {
            return Err(ForecastError::InvalidConfig(
                "num_hours must be at least 1".to_string(),
            ));
        }

        self.store.ensure_schema().await?;

        let run = match request.run_date {
            Some(date) => RunIdentifier::new(date, self.config.run_hour),
            None => {
                self.resolver
                    .resolve_latest_complete_run(request.num_hours - 1)
                    .await?
            }
        };

        info!(
            run = %run,
            variables = request.variables.len(),
            "Starting ingestion"
        );

        let points = Arc::new(request.points);
        let variables = Arc::new(request.variables);

        let tasks = (0..request.num_hours).map(|forecast_hour| {
            let points = points.clone();
            let variables = variables.clone();
            async move {
                let result = self
                    .process_hour(run.product(forecast_hour), points, variables)
                    .await;
                (forecast_hour, result)
            }
        });

        let mut results: Vec<_> = stream::iter(tasks)
            .buffer_unordered(self.config.parallel_hours)
            .collect()
            .await;
        results.sort_by_key(|(forecast_hour, _)| *forecast_hour);

        let mut records: Vec<ForecastRecord> = Vec::new();
        let mut hours_processed = Vec::new();
        let mut failed_hours = Vec::new();

        for (forecast_hour, result) in results {
            match result {
                Ok(hour_records) => {
                    hours_processed.push(forecast_hour);
                    records.extend(hour_records);
                }
                Err(e) => {
                    error!(
                        forecast_hour,
                        kind = e.kind(),
                        error = %e,
                        "Forecast hour failed"
                    );
                    metrics::counter!("forecast_hours_failed_total").increment(1);
                    failed_hours.push(forecast_hour);
                }
            }
        }

        let upsert = self.store.upsert(&records).await?;

        let summary = IngestSummary {
            run,
            hours_processed,
            failed_hours,
            records_extracted: records.len(),
            records_inserted: upsert.inserted,
        };

        info!(
            run = %summary.run,
            hours = summary.hours_processed.len(),
            failed = summary.failed_hours.len(),
            extracted = summary.records_extracted,
            inserted = summary.records_inserted,
            "Ingestion complete"
        );

        Ok(summary)
    }

    /// Fetch one forecast hour and extract its records.
    #[instrument(skip(self, points, variables), fields(product = %product.object_key()))]
    async fn process_hour(
        &self,
        product: HrrrProduct,
        points: Arc<Vec<GeoPoint>>,
        variables: Arc<Vec<String>>,
    ) -> ForecastResult<Vec<ForecastRecord>> {
        let path = self.fetch_with_retry(&product).await?;

        let source_uri = self.remote.uri(&product.object_key());
        let extractor = self.extractor.clone();

        tokio::task::spawn_blocking(move || {
            extractor.extract(&path, &source_uri, &points, &variables)
        })
        .await
        .map_err(|e| ForecastError::Io(format!("Extraction task failed: {}", e)))
    }

    /// Cache lookup with exponential backoff on retryable failures.
    async fn fetch_with_retry(&self, product: &HrrrProduct) -> ForecastResult<PathBuf> {
        let mut retry_count = 0;
        let mut delay = self.config.initial_retry_delay();

        loop {
            match self.cache.get_local_path(product).await {
                Ok(path) => return Ok(path),
                Err(e) if e.is_retryable() && retry_count < self.config.max_retries => {
                    retry_count += 1;
                    warn!(
                        error = %e,
                        retry = retry_count,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Download failed, retrying"
                    );

                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, MAX_RETRY_DELAY);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
