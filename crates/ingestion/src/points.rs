//! Target point files.
//!
//! One `latitude,longitude` pair per line. Commas, semicolons, tabs or
//! whitespace separate the two values. Blank lines and `#` comments are
//! skipped, and a non-numeric first line is read as a header.

use std::path::Path;

use forecast_common::{ForecastError, ForecastResult, GeoPoint};
use tracing::info;

pub fn load_points(path: impl AsRef<Path>) -> ForecastResult<Vec<GeoPoint>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let points = parse_points(&content).map_err(|e| match e {
        ForecastError::InvalidConfig(msg) => {
            ForecastError::InvalidConfig(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })?;

    info!(path = %path.display(), points = points.len(), "Loaded target points");
    Ok(points)
}

pub fn parse_points(content: &str) -> ForecastResult<Vec<GeoPoint>> {
    let mut points = Vec::new();
    let mut seen_data = false;

    for (line_no, raw) in content.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|f| !f.is_empty())
            .collect();

        let parsed = match fields.as_slice() {
            [lat, lon] => lat.parse::<f64>().ok().zip(lon.parse::<f64>().ok()),
            _ => None,
        };

        let Some((latitude, longitude)) = parsed else {
            if !seen_data && points.is_empty() {
                // Header line
                seen_data = true;
                continue;
            }
            return Err(ForecastError::InvalidConfig(format!(
                "line {}: expected \"latitude,longitude\", got {:?}",
                line_no + 1,
                raw
            )));
        };
        seen_data = true;

        let point = GeoPoint::checked(latitude, longitude).map_err(|e| {
            ForecastError::InvalidConfig(format!("line {}: {}", line_no + 1, e))
        })?;
        points.push(point);
    }

    Ok(points)
}
