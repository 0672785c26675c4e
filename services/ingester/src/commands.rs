//! Subcommand handlers.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use forecast_common::RunIdentifier;
use ingestion::{
    load_points, parse_idx, IngestConfig, IngestRequest, IngestionPipeline, RunResolver,
    VariableCatalog,
};
use storage::{ObjectStorage, RemoteStore};

pub async fn ingest(
    config: &IngestConfig,
    catalog: Arc<VariableCatalog>,
    points_file: &Path,
    run_date: Option<NaiveDate>,
    variables: Vec<String>,
    num_hours: u32,
) -> Result<()> {
    let points = load_points(points_file)?;
    if points.is_empty() {
        bail!("{} contains no points", points_file.display());
    }

    let variables = if variables.is_empty() {
        catalog.names()
    } else {
        for name in variables.iter().filter(|name| !catalog.contains(name)) {
            warn!(variable = %name, "Variable not in catalog, it will be skipped");
        }
        variables
    };

    let pipeline = IngestionPipeline::new(config, catalog).await?;
    let summary = pipeline
        .run(IngestRequest {
            run_date,
            num_hours,
            variables,
            points,
        })
        .await?;

    println!(
        "run {}: {} hours ingested, {} records extracted, {} new",
        summary.run,
        summary.hours_processed.len(),
        summary.records_extracted,
        summary.records_inserted
    );
    if !summary.failed_hours.is_empty() {
        println!("failed forecast hours: {:?}", summary.failed_hours);
    }

    Ok(())
}

pub async fn resolve(config: &IngestConfig, num_hours: u32) -> Result<()> {
    if num_hours == 0 {
        bail!("--num-hours must be at least 1");
    }

    let remote: Arc<dyn RemoteStore> = Arc::new(ObjectStorage::new(&config.storage_config())?);
    let run = RunResolver::new(remote, config.run_hour)
        .with_lookback_days(config.lookback_days)
        .resolve_latest_complete_run(num_hours - 1)
        .await?;

    println!("{}", run.run_date);
    Ok(())
}

pub async fn inventory(
    config: &IngestConfig,
    catalog: &VariableCatalog,
    run_date: Option<NaiveDate>,
    forecast_hour: u32,
) -> Result<()> {
    let remote: Arc<dyn RemoteStore> = Arc::new(ObjectStorage::new(&config.storage_config())?);

    let run = match run_date {
        Some(date) => RunIdentifier::new(date, config.run_hour),
        None => {
            RunResolver::new(remote.clone(), config.run_hour)
                .with_lookback_days(config.lookback_days)
                .resolve_latest_complete_run(forecast_hour)
                .await?
        }
    };

    let key = run.product(forecast_hour).index_key();
    info!(key = %key, "Fetching inventory");

    let body = remote.get(&key).await?;
    let text = std::str::from_utf8(&body).context("Inventory is not UTF-8")?;
    let entries = parse_idx(text)?;

    for entry in &entries {
        let description = entry.description();
        let variable = catalog
            .by_idx_description(&description)
            .map(|spec| spec.name.as_str())
            .unwrap_or("-");
        println!(
            "{:>4} {:<26} {:<40} {:<24} {}",
            entry.message,
            entry.byte_range(),
            description,
            entry.forecast,
            variable
        );
    }

    Ok(())
}
