//! GRIB2 data unpacking algorithms.
//!
//! Simple packing (template 5.0) is decoded here. Other packings
//! (complex, spatial differencing, PNG) are handed to the `grib` crate.

use crate::Grib2Error;

/// Unpack simple packed GRIB2 data into a full grid.
///
/// value = (R + X * 2^E) * 10^(-D)
///
/// Points masked out by the bitmap are not stored in the data section,
/// so they consume no bits and are returned as `NaN`.
pub fn unpack_simple(
    packed_data: &[u8],
    num_points: usize,
    bits_per_value: u8,
    reference_value: f32,
    binary_scale_factor: i16,
    decimal_scale_factor: i16,
    bitmap: Option<&[u8]>,
) -> Result<Vec<f32>, Grib2Error> {
    let binary_scale = 2.0_f64.powi(binary_scale_factor as i32);
    let decimal_scale = 10.0_f64.powi(-(decimal_scale_factor as i32));
    let reference = reference_value as f64;

    let mut values = Vec::with_capacity(num_points);
    let mut bit_position = 0;
    let bits_per_value = bits_per_value as usize;

    for i in 0..num_points {
        if let Some(bm) = bitmap {
            if !bitmap_bit(bm, i) {
                values.push(f32::NAN);
                continue;
            }
        }

        let packed_value = if bits_per_value == 0 {
            0
        } else {
            extract_bits(packed_data, bit_position, bits_per_value).map_err(|e| {
                Grib2Error::UnpackingError(format!("Failed to extract bits at point {}: {}", i, e))
            })?
        };
        bit_position += bits_per_value;

        let value = (reference + packed_value as f64 * binary_scale) * decimal_scale;
        values.push(value as f32);
    }

    Ok(values)
}

/// Spread densely decoded values over the grid using the bitmap.
///
/// Used for packings decoded outside this module that return only the
/// present values.
pub fn apply_bitmap(present: &[f32], num_points: usize, bitmap: &[u8]) -> Result<Vec<f32>, Grib2Error> {
    let mut source = present.iter();
    let mut values = Vec::with_capacity(num_points);
    for i in 0..num_points {
        if bitmap_bit(bitmap, i) {
            let value = source.next().ok_or_else(|| {
                Grib2Error::UnpackingError("Bitmap marks more points than were decoded".to_string())
            })?;
            values.push(*value);
        } else {
            values.push(f32::NAN);
        }
    }
    Ok(values)
}

/// Bitmap: 1 bit per data point, 1 = value present, 0 = missing
fn bitmap_bit(bitmap: &[u8], index: usize) -> bool {
    let byte_idx = index / 8;
    let bit_idx = 7 - (index % 8);
    byte_idx < bitmap.len() && (bitmap[byte_idx] >> bit_idx) & 1 == 1
}

/// Extract bits from a byte array, MSB first.
fn extract_bits(data: &[u8], start_bit: usize, num_bits: usize) -> Result<u32, String> {
    if num_bits > 32 || num_bits == 0 {
        return Err(format!("Invalid number of bits: {}", num_bits));
    }

    let mut result = 0u32;

    for i in 0..num_bits {
        let absolute_bit = start_bit + i;
        let byte_idx = absolute_bit / 8;
        let bit_idx = 7 - (absolute_bit % 8);

        if byte_idx >= data.len() {
            return Err("Not enough data to extract bits".to_string());
        }

        let bit = (data[byte_idx] >> bit_idx) & 1;
        result = (result << 1) | (bit as u32);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bits() {
        let data = vec![0b10110101];

        assert_eq!(extract_bits(&data, 0, 2).unwrap(), 0b10);
        assert_eq!(extract_bits(&data, 2, 2).unwrap(), 0b11);
        assert_eq!(extract_bits(&data, 0, 8).unwrap(), 0b10110101);
        assert!(extract_bits(&data, 4, 8).is_err());
    }

    #[test]
    fn test_simple_unpacking() {
        let packed = vec![100, 200];
        let vals = unpack_simple(&packed, 2, 8, 0.0, 0, 0, None).unwrap();

        assert_eq!(vals.len(), 2);
        assert!((vals[0] - 100.0).abs() < 1e-4);
        assert!((vals[1] - 200.0).abs() < 1e-4);
    }

    #[test]
    fn test_scale_factors() {
        // (1000 + 3 * 2^1) * 10^-1 = 100.6
        let vals = unpack_simple(&[3], 1, 8, 1000.0, 1, 1, None).unwrap();
        assert!((vals[0] - 100.6).abs() < 1e-4);
    }

    #[test]
    fn test_zero_bits_is_constant_field() {
        let vals = unpack_simple(&[], 4, 0, 285.5, 0, 0, None).unwrap();
        assert_eq!(vals, vec![285.5; 4]);
    }

    #[test]
    fn test_bitmap_missing_points_consume_no_bits() {
        // Points 0 and 2 present, 1 missing; only two values are packed
        let bitmap = [0b1010_0000];
        let vals = unpack_simple(&[10, 20], 3, 8, 0.0, 0, 0, Some(&bitmap)).unwrap();

        assert_eq!(vals[0], 10.0);
        assert!(vals[1].is_nan());
        assert_eq!(vals[2], 20.0);
    }

    #[test]
    fn test_apply_bitmap() {
        let bitmap = [0b0110_0000];
        let vals = apply_bitmap(&[1.0, 2.0], 4, &bitmap).unwrap();

        assert!(vals[0].is_nan());
        assert_eq!(vals[1], 1.0);
        assert_eq!(vals[2], 2.0);
        assert!(vals[3].is_nan());

        assert!(apply_bitmap(&[1.0], 4, &bitmap).is_err());
    }
}
