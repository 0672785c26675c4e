//! Tests against a real HRRR surface file, skipped when the sample is absent.
//!
//! Fetch one with:
//! `aws s3 cp --no-sign-request s3://noaa-hrrr-bdp-pds/hrrr.20250101/conus/hrrr.t06z.wrfsfcf00.grib2 crates/grib2-parser/testdata/hrrr_sample.grib2`

use grib2_parser::{FieldFilter, Grib2GridReader, GridReader};
use test_utils::require_test_file;

#[test]
fn test_hrrr_surface_variables_present() {
    let path = require_test_file!("hrrr_sample.grib2");
    let reader = Grib2GridReader::hrrr();

    let filters = [
        FieldFilter::short_name("sp"),
        FieldFilter::short_name("2t"),
        FieldFilter::short_name("2d"),
        FieldFilter::short_name("2r"),
        FieldFilter::short_name("10u"),
        FieldFilter::short_name("10v"),
        FieldFilter::short_name("u").at_level("heightAboveGround", 80.0),
        FieldFilter::short_name("v").at_level("heightAboveGround", 80.0),
    ];

    for (filter, field) in filters.iter().zip(reader.open_fields(&path, &filters)) {
        let field = field.unwrap_or_else(|e| panic!("{} should be present: {}", filter, e));
        assert_eq!(field.shape(), (1799, 1059));
        assert!(field.values.iter().any(|v| v.is_finite()));
    }
}

#[test]
fn test_hrrr_grid_covers_conus() {
    let path = require_test_file!("hrrr_sample.grib2");
    let field = Grib2GridReader::hrrr()
        .open_field(&path, &FieldFilter::short_name("2t"))
        .unwrap();

    let coords = &field.coordinates;
    let (lat0, lon0) = coords.get(0).unwrap();
    assert!((lat0 - 21.138).abs() < 0.01);
    assert!((lon0 - 237.28).abs() < 0.01);

    // 2 m temperature is a plausible Kelvin value everywhere
    assert!(field
        .values
        .iter()
        .filter(|v| v.is_finite())
        .all(|v| (180.0..340.0).contains(v)));
}
