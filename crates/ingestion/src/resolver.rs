//! Latest complete run resolution.
//!
//! The archive has no "list runs" call, so completeness is probed: a run is
//! complete up to hour H when the object for hour H exists.

use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use forecast_common::{ForecastError, ForecastResult, RunIdentifier};
use storage::RemoteStore;

pub const DEFAULT_LOOKBACK_DAYS: u32 = 10;

/// Finds the newest run whose last forecast hour is present remotely.
pub struct RunResolver {
    remote: Arc<dyn RemoteStore>,
    run_hour: u32,
    lookback_days: u32,
}

impl RunResolver {
    pub fn new(remote: Arc<dyn RemoteStore>, run_hour: u32) -> Self {
        Self {
            remote,
            run_hour,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }

    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    /// Resolve starting from the current UTC date.
    pub async fn resolve_latest_complete_run(
        &self,
        max_forecast_hour: u32,
    ) -> ForecastResult<RunIdentifier> {
        self.resolve_from(Utc::now().date_naive(), max_forecast_hour)
            .await
    }

    /// Probe `today`, then each previous day, returning the first run whose
    /// `max_forecast_hour` object exists.
    ///
    /// A missing object means "incomplete, keep looking". Any other failure
    /// of the existence check aborts resolution.
    #[instrument(skip(self), fields(run_hour = self.run_hour, lookback_days = self.lookback_days))]
    pub async fn resolve_from(
        &self,
        today: NaiveDate,
        max_forecast_hour: u32,
    ) -> ForecastResult<RunIdentifier> {
        for days_back in 0..self.lookback_days {
            let run_date = today - Duration::days(days_back as i64);
            let run = RunIdentifier::new(run_date, self.run_hour);
            let key = run.product(max_forecast_hour).object_key();

            if self.remote.head(&key).await? {
                info!(run = %run, max_forecast_hour, "Found latest complete run");
                return Ok(run);
            }
            debug!(run_date = %run_date, key = %key, "Run incomplete or unavailable");
        }

        Err(ForecastError::NotFound(format!(
            "no {:02}z run complete to hour {} in the {} days up to {}",
            self.run_hour, max_forecast_hour, self.lookback_days, today
        )))
    }
}
