//! Extractor behaviour against synthetic GRIB2 files.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use forecast_common::GeoPoint;
use grib2_parser::Grib2GridReader;
use ingestion::{ExtractionError, ExtractionObserver, Extractor, VariableCatalog};
use test_utils::{assert_approx_eq, write_fixture, Grib2Builder, MOBILE_AL, SYDNEY};

const SOURCE: &str = "s3://noaa-hrrr-bdp-pds/hrrr.20250101/conus/hrrr.t06z.wrfsfcf00.grib2";

/// Observer collecting error kinds and per-variable counts.
#[derive(Default)]
struct RecordingObserver {
    errors: Mutex<Vec<&'static str>>,
    variables: Mutex<Vec<(String, usize)>>,
    completed: Mutex<Option<usize>>,
}

impl ExtractionObserver for RecordingObserver {
    fn on_variable(&self, variable: &str, records: usize, _elapsed: Duration) {
        self.variables
            .lock()
            .unwrap()
            .push((variable.to_string(), records));
    }

    fn on_error(&self, error: &ExtractionError) {
        self.errors.lock().unwrap().push(error.kind());
    }

    fn on_file_complete(&self, _path: &Path, records: usize, _elapsed: Duration) {
        *self.completed.lock().unwrap() = Some(records);
    }
}

fn extractor(observer: Arc<RecordingObserver>) -> Extractor {
    Extractor::new(
        Arc::new(VariableCatalog::hrrr_surface()),
        Arc::new(Grib2GridReader::hrrr()),
    )
    .with_observer(observer)
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn mobile() -> GeoPoint {
    GeoPoint::new(MOBILE_AL.0, MOBILE_AL.1)
}

#[test]
fn test_record_uses_grid_cell_coordinates() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "f00.grib2", &Grib2Builder::new().build());
    let observer = Arc::new(RecordingObserver::default());

    let records = extractor(observer).extract(&path, SOURCE, &[mobile()], &names(&["surface_pressure"]));

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.variable, "surface_pressure");
    assert_eq!(record.latitude, 31.0);
    assert_eq!(record.longitude, 272.0);
    assert_approx_eq!(record.value, 101_325.0, 1.0);
    assert_eq!(record.source_uri, SOURCE);
    assert_eq!(record.run_time_utc.to_rfc3339(), "2025-01-01T06:00:00+00:00");
    assert_eq!(record.lead_hours(), 0);
}

#[test]
fn test_unknown_and_missing_variables_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let file = Grib2Builder::build_file(&[Grib2Builder::new(), Grib2Builder::temperature_2m()]);
    let path = write_fixture(dir.path(), "f00.grib2", &file);
    let observer = Arc::new(RecordingObserver::default());

    let records = extractor(observer.clone()).extract(
        &path,
        SOURCE,
        &[mobile()],
        &names(&["surface_pressure", "snow_depth", "dewpoint_2m", "temperature_2m"]),
    );

    let variables: Vec<_> = records.iter().map(|r| r.variable.as_str()).collect();
    assert_eq!(variables, vec!["surface_pressure", "temperature_2m"]);
    assert_eq!(
        *observer.errors.lock().unwrap(),
        vec!["unknown_variable", "field_not_found"]
    );
    assert_eq!(*observer.completed.lock().unwrap(), Some(2));
}

#[test]
fn test_wind_at_80m_selected_by_level() {
    let dir = tempfile::tempdir().unwrap();
    let file = Grib2Builder::build_file(&[
        Grib2Builder::new()
            .with_parameter(0, 2, 2)
            .with_level(103, 10)
            .with_constant_value(1.0),
        Grib2Builder::wind_80m(true),
        Grib2Builder::wind_80m(false).with_constant_value(-3.0),
    ]);
    let path = write_fixture(dir.path(), "f00.grib2", &file);
    let observer = Arc::new(RecordingObserver::default());

    let records = extractor(observer).extract(
        &path,
        SOURCE,
        &[mobile()],
        &names(&["u_component_wind_10m", "u_component_wind_80m", "v_component_wind_80m"]),
    );

    assert_eq!(records.len(), 3);
    assert_approx_eq!(records[0].value, 1.0, 1e-3);
    assert_approx_eq!(records[1].value, 5.0, 1e-3);
    assert_approx_eq!(records[2].value, -3.0, 1e-3);
}

#[test]
fn test_missing_value_at_nearest_cell_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut data = vec![100_000.0f32; 25];
    // Row 2 (31.0N), column 2 (272.0E)
    data[12] = f32::NAN;
    let path = write_fixture(
        dir.path(),
        "f00.grib2",
        &Grib2Builder::new().with_data(data).build(),
    );
    let observer = Arc::new(RecordingObserver::default());

    let records = extractor(observer.clone()).extract(
        &path,
        SOURCE,
        &[mobile(), GeoPoint::new(32.0, -89.0)],
        &names(&["surface_pressure"]),
    );

    assert_eq!(records.len(), 1);
    assert_eq!((records[0].latitude, records[0].longitude), (32.0, 271.0));
    assert_eq!(*observer.errors.lock().unwrap(), vec!["missing_value"]);
}

#[test]
fn test_bad_point_does_not_abort_others() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "f00.grib2", &Grib2Builder::new().build());
    let observer = Arc::new(RecordingObserver::default());

    let records = extractor(observer.clone()).extract(
        &path,
        SOURCE,
        &[GeoPoint::new(95.0, 0.0), mobile()],
        &names(&["surface_pressure", "surface_roughness"]),
    );

    assert_eq!(records.len(), 1);
    // Each grid resolves its points once
    assert_eq!(
        *observer.errors.lock().unwrap(),
        vec!["invalid_point", "field_not_found"]
    );
}

#[test]
fn test_distance_limit_rejects_far_points() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "f00.grib2", &Grib2Builder::new().build());
    let points = [GeoPoint::new(SYDNEY.0, SYDNEY.1), mobile()];
    let variables = names(&["surface_pressure"]);

    let unlimited = extractor(Arc::new(RecordingObserver::default()));
    assert_eq!(unlimited.extract(&path, SOURCE, &points, &variables).len(), 2);

    let observer = Arc::new(RecordingObserver::default());
    let limited = extractor(observer.clone()).with_max_distance(Some(1.0));
    let records = limited.extract(&path, SOURCE, &points, &variables);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].latitude, 31.0);
    assert_eq!(*observer.errors.lock().unwrap(), vec!["out_of_domain"]);
}

#[test]
fn test_antimeridian_points_share_a_cell() {
    let dir = tempfile::tempdir().unwrap();
    let builder = Grib2Builder::new()
        .with_latlon_grid(5, 3, 1.0, 179.0, 0.5)
        .with_gradient(0.0, 14.0);
    let path = write_fixture(dir.path(), "f00.grib2", &builder.build());
    let observer = Arc::new(RecordingObserver::default());

    let records = extractor(observer).extract(
        &path,
        SOURCE,
        &[GeoPoint::new(0.0, 180.0), GeoPoint::new(0.0, -180.0)],
        &names(&["surface_pressure"]),
    );

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].longitude, 180.0);
    assert_eq!(records[0].latitude, 0.0);
    assert_eq!(records[0].key(), records[1].key());
    assert_eq!(records[0].value, records[1].value);
}

#[test]
fn test_unreadable_file_yields_no_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path(), "f00.grib2", b"not a grib file");
    let observer = Arc::new(RecordingObserver::default());

    let records = extractor(observer.clone()).extract(
        &path,
        SOURCE,
        &[mobile()],
        &names(&["surface_pressure", "temperature_2m"]),
    );

    assert!(records.is_empty());
    assert_eq!(*observer.errors.lock().unwrap(), vec!["grib", "grib"]);
}

#[test]
fn test_lambert_grid_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(
        dir.path(),
        "f00.grib2",
        &Grib2Builder::new().with_hrrr_lambert_grid(8, 6).build(),
    );
    let observer = Arc::new(RecordingObserver::default());

    let records = extractor(observer).extract(
        &path,
        SOURCE,
        &[GeoPoint::new(21.2, -122.7)],
        &names(&["surface_pressure"]),
    );

    assert_eq!(records.len(), 1);
    assert!((0.0..360.0).contains(&records[0].longitude));
    assert_approx_eq!(records[0].latitude, 21.14, 0.1);
}
