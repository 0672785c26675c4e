//! HRRR forecast ingester.
//!
//! Pulls HRRR surface forecasts from the public archive, extracts values at
//! target points and stores them in a deduplicated SQLite time series.

mod commands;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ingestion::{IngestConfig, VariableCatalog};

#[derive(Parser, Debug)]
#[command(name = "ingester")]
#[command(about = "HRRR forecast point ingester")]
struct Args {
    /// YAML configuration file (defaults to environment variables)
    #[arg(short, long, env = "INGESTER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// YAML variable catalog (defaults to the built-in HRRR surface catalog)
    #[arg(long, env = "INGESTER_CATALOG", global = true)]
    catalog: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Serve Prometheus metrics on this address
    #[arg(long, env = "METRICS_ADDR", global = true)]
    metrics_addr: Option<SocketAddr>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest every forecast hour of a run for the points in a file
    Ingest {
        /// Points file, one "latitude,longitude" per line
        points_file: PathBuf,

        /// Run date (YYYY-MM-DD); the latest complete run when omitted
        #[arg(long)]
        run_date: Option<NaiveDate>,

        /// Comma-separated variable names (default: the whole catalog)
        #[arg(long, value_delimiter = ',')]
        variables: Vec<String>,

        /// Number of forecast hours, starting at hour 0
        #[arg(long)]
        num_hours: Option<u32>,
    },

    /// Print the latest run that is complete up to the last forecast hour
    Resolve {
        #[arg(long)]
        num_hours: Option<u32>,
    },

    /// Print the .idx inventory of one forecast hour
    Inventory {
        /// Run date (YYYY-MM-DD); the latest complete run when omitted
        #[arg(long)]
        run_date: Option<NaiveDate>,

        #[arg(long, default_value_t = 0)]
        forecast_hour: u32,
    },
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&args.log_level))
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if let Some(addr) = args.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(addr = %addr, "Prometheus metrics exporter listening");
    }

    let config = match &args.config {
        Some(path) => IngestConfig::from_yaml(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => IngestConfig::from_env()?,
    };

    let catalog = match &args.catalog {
        Some(path) => VariableCatalog::from_yaml(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => VariableCatalog::hrrr_surface(),
    };

    info!(
        bucket = %config.bucket,
        run_hour = config.run_hour,
        cache_dir = %config.cache_dir.display(),
        database = %config.database_path.display(),
        variables = catalog.len(),
        "Loaded configuration"
    );

    let catalog = Arc::new(catalog);

    match args.command {
        Command::Ingest {
            points_file,
            run_date,
            variables,
            num_hours,
        } => {
            commands::ingest(
                &config,
                catalog,
                &points_file,
                run_date,
                variables,
                num_hours.unwrap_or(config.default_num_hours),
            )
            .await
        }
        Command::Resolve { num_hours } => {
            commands::resolve(&config, num_hours.unwrap_or(config.default_num_hours)).await
        }
        Command::Inventory {
            run_date,
            forecast_hour,
        } => commands::inventory(&config, &catalog, run_date, forecast_hour).await,
    }
}
