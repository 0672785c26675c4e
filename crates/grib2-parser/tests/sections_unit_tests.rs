//! Unit tests for GRIB2 sign-magnitude integer decoding.

use grib2_parser::sections::{decode_grib2_signed, decode_grib2_signed_i16};

#[test]
fn test_decode_grib2_signed_positive() {
    assert_eq!(decode_grib2_signed(&[0x00, 0x00, 0x00, 0x00]), 0);
    assert_eq!(decode_grib2_signed(&[0x00, 0x00, 0x00, 0x01]), 1);
    assert_eq!(decode_grib2_signed(&[0x00, 0x00, 0x03, 0xE8]), 1000);
    assert_eq!(decode_grib2_signed(&90_000_000_u32.to_be_bytes()), 90_000_000);
}

#[test]
fn test_decode_grib2_signed_negative() {
    // MSB set means negative; the remaining bits are the magnitude
    assert_eq!(decode_grib2_signed(&[0x80, 0x00, 0x00, 0x01]), -1);
    assert_eq!(decode_grib2_signed(&[0x80, 0x00, 0x03, 0xE8]), -1000);
    assert_eq!(
        decode_grib2_signed(&(90_000_000_u32 | 0x8000_0000).to_be_bytes()),
        -90_000_000
    );
}

#[test]
fn test_decode_grib2_signed_extremes() {
    assert_eq!(decode_grib2_signed(&[0x7F, 0xFF, 0xFF, 0xFF]), 2_147_483_647);
    assert_eq!(decode_grib2_signed(&[0xFF, 0xFF, 0xFF, 0xFF]), -2_147_483_647);
    // Negative zero
    assert_eq!(decode_grib2_signed(&[0x80, 0x00, 0x00, 0x00]), 0);
}

#[test]
fn test_decode_grib2_signed_wrong_length() {
    assert_eq!(decode_grib2_signed(&[0x00, 0x00, 0x00]), 0);
    assert_eq!(decode_grib2_signed(&[0x00]), 0);
    assert_eq!(decode_grib2_signed(&[]), 0);
    assert_eq!(decode_grib2_signed(&[0x00, 0x00, 0x00, 0x00, 0x01]), 0);
}

#[test]
fn test_decode_grib2_signed_small_values() {
    for i in 1..100 {
        assert_eq!(decode_grib2_signed(&(i as u32).to_be_bytes()), i);
        assert_eq!(
            decode_grib2_signed(&((i as u32) | 0x8000_0000).to_be_bytes()),
            -i
        );
    }
}

#[test]
fn test_sign_magnitude_vs_twos_complement() {
    // Two's complement -1 is a large negative magnitude in sign-magnitude
    assert_eq!(decode_grib2_signed(&[0xFF, 0xFF, 0xFF, 0xFF]), -2_147_483_647);
    assert_eq!(decode_grib2_signed(&[0x80, 0x00, 0x00, 0x01]), -1);
}

#[test]
fn test_hrrr_corner_coordinates() {
    // HRRR first grid point: 21.138123N, 237.280472E
    assert_eq!(decode_grib2_signed(&21_138_123_u32.to_be_bytes()), 21_138_123);
    assert_eq!(decode_grib2_signed(&237_280_472_u32.to_be_bytes()), 237_280_472);

    // Western longitudes may also be written as negative values
    let lon = (122_719_528_u32 | 0x8000_0000).to_be_bytes();
    assert_eq!(decode_grib2_signed(&lon), -122_719_528);
}

#[test]
fn test_decode_scale_factors() {
    assert_eq!(decode_grib2_signed_i16(&[0x00, 0x02]), 2);
    assert_eq!(decode_grib2_signed_i16(&[0x80, 0x02]), -2);
    assert_eq!(decode_grib2_signed_i16(&[0x80, 0x00]), 0);
    assert_eq!(decode_grib2_signed_i16(&[0x02]), 0);
}
