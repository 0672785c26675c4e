//! Deduplicated forecast record store on SQLite.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::path::Path;
use tracing::{debug, info, instrument};

use forecast_common::{ForecastError, ForecastRecord, ForecastResult};

/// Rows per staging INSERT statement (7 binds each).
const STAGING_CHUNK: usize = 128;

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS hrrr_forecasts (
        valid_time_utc TEXT NOT NULL,
        run_time_utc TEXT NOT NULL,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        variable TEXT NOT NULL,
        value REAL,
        source_uri TEXT NOT NULL,
        UNIQUE (valid_time_utc, run_time_utc, latitude, longitude, variable)
    )
"#;

const CREATE_STAGING_SQL: &str = r#"
    CREATE TEMP TABLE IF NOT EXISTS staging_forecasts (
        valid_time_utc TEXT NOT NULL,
        run_time_utc TEXT NOT NULL,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        variable TEXT NOT NULL,
        value REAL,
        source_uri TEXT NOT NULL
    )
"#;

/// Outcome of one batch upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    /// Records in the batch
    pub submitted: u64,
    /// Records that were new; the rest already existed
    pub inserted: u64,
}

impl UpsertSummary {
    pub fn skipped(&self) -> u64 {
        self.submitted - self.inserted
    }
}

type RecordRow = (
    DateTime<Utc>,
    DateTime<Utc>,
    f64,
    f64,
    String,
    Option<f64>,
    String,
);

/// Forecast time series keyed by (valid time, run time, latitude, longitude, variable).
pub struct ForecastStore {
    pool: SqlitePool,
}

impl ForecastStore {
    /// Open or create the database at the given path.
    pub async fn open(path: &Path) -> ForecastResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| ForecastError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;

        info!(path = %path.display(), "Opened forecast database");
        Ok(Self { pool })
    }

    /// Open an in-memory database (for testing).
    pub async fn open_memory() -> ForecastResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);

        // One connection: every pooled connection would get its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| ForecastError::Storage(format!("Failed to open memory database: {}", e)))?;

        Ok(Self { pool })
    }

    /// Create the table and its uniqueness constraint if absent.
    pub async fn ensure_schema(&self) -> ForecastResult<()> {
        sqlx::query(CREATE_TABLE_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| ForecastError::Storage(format!("Schema creation failed: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_hrrr_forecasts_variable \
             ON hrrr_forecasts(variable, valid_time_utc)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ForecastError::Storage(format!("Index creation failed: {}", e)))?;

        Ok(())
    }

    /// Insert a batch, skipping records whose key already exists.
    ///
    /// Runs in one transaction: either every new record is committed or none is.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn upsert(&self, records: &[ForecastRecord]) -> ForecastResult<UpsertSummary> {
        if records.is_empty() {
            return Ok(UpsertSummary::default());
        }

        let storage_err = |e: sqlx::Error| ForecastError::Storage(format!("Upsert failed: {}", e));

        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        sqlx::query(CREATE_STAGING_SQL)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        sqlx::query("DELETE FROM staging_forecasts")
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        for chunk in records.chunks(STAGING_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO staging_forecasts \
                 (valid_time_utc, run_time_utc, latitude, longitude, variable, value, source_uri) ",
            );
            builder.push_values(chunk, |mut row, record| {
                row.push_bind(record.valid_time_utc)
                    .push_bind(record.run_time_utc)
                    .push_bind(record.latitude)
                    .push_bind(record.longitude)
                    .push_bind(record.variable.clone())
                    .push_bind(record.value)
                    .push_bind(record.source_uri.clone());
            });
            builder.build().execute(&mut *tx).await.map_err(storage_err)?;
        }

        // `WHERE true` disambiguates the upsert clause from a join constraint
        let result = sqlx::query(
            "INSERT INTO hrrr_forecasts \
             (valid_time_utc, run_time_utc, latitude, longitude, variable, value, source_uri) \
             SELECT valid_time_utc, run_time_utc, latitude, longitude, variable, value, source_uri \
             FROM staging_forecasts WHERE true \
             ON CONFLICT (valid_time_utc, run_time_utc, latitude, longitude, variable) DO NOTHING",
        )
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        sqlx::query("DELETE FROM staging_forecasts")
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;

        let summary = UpsertSummary {
            submitted: records.len() as u64,
            inserted: result.rows_affected(),
        };
        debug!(
            submitted = summary.submitted,
            inserted = summary.inserted,
            "Upserted forecast records"
        );
        metrics::counter!("forecast_records_inserted_total").increment(summary.inserted);

        Ok(summary)
    }

    /// Total number of stored records.
    pub async fn count(&self) -> ForecastResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM hrrr_forecasts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ForecastError::Storage(format!("Count failed: {}", e)))?;
        Ok(count as u64)
    }

    /// Stored records of one variable ordered by valid time and position.
    pub async fn records_for_variable(&self, variable: &str) -> ForecastResult<Vec<ForecastRecord>> {
        let rows: Vec<RecordRow> = sqlx::query_as(
            "SELECT valid_time_utc, run_time_utc, latitude, longitude, variable, value, source_uri \
             FROM hrrr_forecasts WHERE variable = ? \
             ORDER BY valid_time_utc, latitude, longitude",
        )
        .bind(variable)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ForecastError::Storage(format!("Query failed: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(
                |(valid_time_utc, run_time_utc, latitude, longitude, variable, value, source_uri)| {
                    ForecastRecord {
                        valid_time_utc,
                        run_time_utc,
                        latitude: latitude as f32,
                        longitude: longitude as f32,
                        variable,
                        value: value.map(|v| v as f32).unwrap_or(f32::NAN),
                        source_uri,
                    }
                },
            )
            .collect())
    }
}
