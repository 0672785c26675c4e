//! Point extraction from gridded forecast files.
//!
//! Each target point resolves to the grid cell with the smallest squared
//! (latitude, longitude) degree distance, after the point's longitude is
//! mapped into [0, 360). Records carry the cell's own coordinates.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use forecast_common::{ForecastRecord, GeoPoint};
use grib2_parser::{FieldFilter, GridCoordinates, GridField, GridReader};
use tracing::{debug, info, warn};

use crate::error::ExtractionError;
use crate::variables::VariableCatalog;

/// Instrumentation hooks around extraction.
pub trait ExtractionObserver: Send + Sync {
    fn on_file_start(&self, _path: &Path, _variables: usize) {}

    fn on_variable(&self, _variable: &str, _records: usize, _elapsed: Duration) {}

    /// A variable or (variable, point) pair was skipped.
    fn on_error(&self, _error: &ExtractionError) {}

    fn on_file_complete(&self, _path: &Path, _records: usize, _elapsed: Duration) {}
}

/// Logs extraction progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ExtractionObserver for TracingObserver {
    fn on_file_start(&self, path: &Path, variables: usize) {
        debug!(path = %path.display(), variables, "Extracting file");
    }

    fn on_variable(&self, variable: &str, records: usize, elapsed: Duration) {
        debug!(
            variable = %variable,
            records,
            elapsed_ms = elapsed.as_millis() as u64,
            "Extracted variable"
        );
    }

    fn on_error(&self, error: &ExtractionError) {
        match error {
            ExtractionError::UnknownVariable(_) | ExtractionError::FieldNotFound { .. } => {
                warn!(kind = error.kind(), error = %error, "Skipping variable")
            }
            _ => warn!(kind = error.kind(), error = %error, "Extraction failed"),
        }
    }

    fn on_file_complete(&self, path: &Path, records: usize, elapsed: Duration) {
        info!(
            path = %path.display(),
            records,
            elapsed_ms = elapsed.as_millis() as u64,
            "Extraction complete"
        );
    }
}

/// Grid cell selected for a target point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestCell {
    /// Index in the grid's flattened scan order
    pub index: usize,
    pub latitude: f64,
    pub longitude: f64,
    /// Squared degree distance to the target
    pub distance_sq: f64,
}

/// Brute-force nearest cell. Ties resolve to the first cell in scan order.
///
/// `longitude` must already be in the grid's [0, 360) convention.
pub fn nearest_cell(
    coordinates: &GridCoordinates,
    latitude: f64,
    longitude: f64,
) -> Option<NearestCell> {
    let mut best: Option<NearestCell> = None;

    for (index, (&lat, &lon)) in coordinates
        .latitudes
        .iter()
        .zip(coordinates.longitudes.iter())
        .enumerate()
    {
        let d_lat = lat - latitude;
        let d_lon = lon - longitude;
        let distance_sq = d_lat * d_lat + d_lon * d_lon;

        // NaN distances compare false and are never selected
        if best.map_or(!distance_sq.is_nan(), |b| distance_sq < b.distance_sq) {
            best = Some(NearestCell {
                index,
                latitude: lat,
                longitude: lon,
                distance_sq,
            });
        }
    }

    best
}

/// Extracts catalog variables at target points from local grid files.
pub struct Extractor {
    catalog: Arc<VariableCatalog>,
    reader: Arc<dyn GridReader>,
    observer: Arc<dyn ExtractionObserver>,
    max_distance: Option<f64>,
}

impl Extractor {
    pub fn new(catalog: Arc<VariableCatalog>, reader: Arc<dyn GridReader>) -> Self {
        Self {
            catalog,
            reader,
            observer: Arc::new(TracingObserver),
            max_distance: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExtractionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Reject points whose nearest cell is farther than `degrees`.
    pub fn with_max_distance(mut self, degrees: Option<f64>) -> Self {
        self.max_distance = degrees;
        self
    }

    /// Extract every requested variable at every point.
    ///
    /// Unknown variables, missing fields, unreadable fields and bad points
    /// are reported to the observer and skipped; whatever could be extracted
    /// is returned.
    pub fn extract(
        &self,
        path: &Path,
        source_uri: &str,
        points: &[GeoPoint],
        variables: &[String],
    ) -> Vec<ForecastRecord> {
        let started = Instant::now();
        self.observer.on_file_start(path, variables.len());

        let mut names = Vec::with_capacity(variables.len());
        let mut filters: Vec<FieldFilter> = Vec::with_capacity(variables.len());
        for variable in variables {
            match self.catalog.get(variable) {
                Some(spec) => {
                    names.push(spec.name.as_str());
                    filters.push(spec.filter.clone());
                }
                None => self
                    .observer
                    .on_error(&ExtractionError::UnknownVariable(variable.clone())),
            }
        }

        let mut records = Vec::new();
        let mut resolved: Vec<(Arc<GridCoordinates>, Vec<Option<NearestCell>>)> = Vec::new();

        if !filters.is_empty() {
            let fields = self.reader.open_fields(path, &filters);
            for (name, field) in names.into_iter().zip(fields) {
                let variable_started = Instant::now();
                let field = match field {
                    Ok(field) => field,
                    Err(e) => {
                        self.observer.on_error(&ExtractionError::from_grib(name, e));
                        continue;
                    }
                };

                let cells = self.cells_for(&mut resolved, &field.coordinates, points);
                let before = records.len();
                self.emit(name, &field, cells, source_uri, &mut records);
                self.observer.on_variable(
                    name,
                    records.len() - before,
                    variable_started.elapsed(),
                );
            }
        }

        metrics::counter!("forecast_records_extracted_total").increment(records.len() as u64);
        self.observer
            .on_file_complete(path, records.len(), started.elapsed());
        records
    }

    /// Nearest cells for every point on one grid. Fields sharing a grid
    /// reuse the same resolution.
    fn cells_for<'a>(
        &self,
        resolved: &'a mut Vec<(Arc<GridCoordinates>, Vec<Option<NearestCell>>)>,
        coordinates: &Arc<GridCoordinates>,
        points: &[GeoPoint],
    ) -> &'a [Option<NearestCell>] {
        let position = match resolved
            .iter()
            .position(|(coords, _)| Arc::ptr_eq(coords, coordinates))
        {
            Some(position) => position,
            None => {
                let cells = points
                    .iter()
                    .map(|point| self.resolve_point(coordinates, point))
                    .collect();
                resolved.push((coordinates.clone(), cells));
                resolved.len() - 1
            }
        };
        &resolved[position].1
    }

    fn resolve_point(&self, coordinates: &GridCoordinates, point: &GeoPoint) -> Option<NearestCell> {
        if let Err(e) = point.validate() {
            self.observer
                .on_error(&ExtractionError::InvalidPoint(format!("{}: {}", point, e)));
            return None;
        }

        let Some(cell) = nearest_cell(coordinates, point.latitude, point.normalized_longitude())
        else {
            self.observer.on_error(&ExtractionError::OutOfDomain {
                point: point.to_string(),
                distance: f64::INFINITY,
                limit: self.max_distance.unwrap_or(f64::INFINITY),
            });
            return None;
        };

        if let Some(limit) = self.max_distance {
            let distance = cell.distance_sq.sqrt();
            if distance > limit {
                self.observer.on_error(&ExtractionError::OutOfDomain {
                    point: point.to_string(),
                    distance,
                    limit,
                });
                return None;
            }
        }

        Some(cell)
    }

    fn emit(
        &self,
        variable: &str,
        field: &GridField,
        cells: &[Option<NearestCell>],
        source_uri: &str,
        records: &mut Vec<ForecastRecord>,
    ) {
        for cell in cells {
            let Some(cell) = cell else {
                continue;
            };

            let value = match field.value_at(cell.index) {
                Some(value) if !value.is_nan() => value,
                _ => {
                    self.observer.on_error(&ExtractionError::MissingValue {
                        variable: variable.to_string(),
                        index: cell.index,
                    });
                    continue;
                }
            };

            records.push(ForecastRecord {
                valid_time_utc: field.valid_time,
                run_time_utc: field.reference_time,
                latitude: cell.latitude as f32,
                longitude: cell.longitude as f32,
                variable: variable.to_string(),
                value,
                source_uri: source_uri.to_string(),
            });
        }
    }
}
