//! Common fixtures for ingestion tests.

use std::path::{Path, PathBuf};

/// Run date used by the synthetic fixtures (2025-01-01, 06z run).
pub const FIXTURE_RUN_DATE: &str = "2025-01-01";

/// A point near Mobile, Alabama, inside the default synthetic grid.
pub const MOBILE_AL: (f64, f64) = (31.0069, -88.0103);

/// A point far outside CONUS.
pub const SYDNEY: (f64, f64) = (-33.8688, 151.2093);

/// Write a points file (one `lat,lon` pair per line).
pub fn write_points_file(dir: &Path, name: &str, points: &[(f64, f64)]) -> PathBuf {
    let body: String = points
        .iter()
        .map(|(lat, lon)| format!("{},{}\n", lat, lon))
        .collect();
    let path = dir.join(name);
    std::fs::write(&path, body).expect("Failed to write points file");
    path
}

/// Write bytes to `dir/name`, creating parent directories.
pub fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create fixture directory");
    }
    std::fs::write(&path, bytes).expect("Failed to write fixture");
    path
}
