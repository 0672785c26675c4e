//! GRIB2 section parsing.
//!
//! Each GRIB2 message consists of numbered sections: indicator (0),
//! identification (1), optional local use (2), grid definition (3),
//! product definition (4), data representation (5), bitmap (6),
//! data (7) and the end marker (8). Offsets in this module are 0-based
//! byte positions from the start of the section.

use crate::Grib2Error;
use bytes::Bytes;
use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Section 0: Indicator Section (16 bytes)
#[derive(Debug, Clone)]
pub struct Indicator {
    pub magic: [u8; 4],
    pub discipline: u8,
    pub edition: u8,
    pub message_length: u64,
}

/// Section 1: Identification Section
#[derive(Debug, Clone)]
pub struct Identification {
    pub center: u16,
    pub sub_center: u16,
    pub significance_of_reference_time: u8,
    pub reference_time: DateTime<Utc>,
    pub production_status: u8,
    pub data_type: u8,
}

/// Section 3: Grid Definition Section
#[derive(Debug, Clone)]
pub struct GridDefinition {
    pub template: u16,
    pub num_data_points: u32,
    pub shape_of_earth: u8,
    pub layout: GridLayout,
    /// Raw section bytes, identical for every message on the same grid.
    pub raw: Bytes,
}

/// Template-specific grid geometry. Angles are in degrees, distances in meters.
#[derive(Debug, Clone, PartialEq)]
pub enum GridLayout {
    /// Template 3.0: regular latitude/longitude
    LatLon {
        ni: u32,
        nj: u32,
        first_latitude: f64,
        first_longitude: f64,
        last_latitude: f64,
        last_longitude: f64,
        i_increment: f64,
        j_increment: f64,
        scanning_mode: u8,
    },
    /// Template 3.30: Lambert conformal (the HRRR CONUS grid)
    LambertConformal {
        nx: u32,
        ny: u32,
        first_latitude: f64,
        first_longitude: f64,
        lad: f64,
        lov: f64,
        dx: f64,
        dy: f64,
        latin1: f64,
        latin2: f64,
        projection_centre: u8,
        scanning_mode: u8,
    },
    Unsupported,
}

impl GridDefinition {
    /// Grid dimensions as (columns, rows).
    pub fn dimensions(&self) -> (usize, usize) {
        match self.layout {
            GridLayout::LatLon { ni, nj, .. } => (ni as usize, nj as usize),
            GridLayout::LambertConformal { nx, ny, .. } => (nx as usize, ny as usize),
            GridLayout::Unsupported => (self.num_data_points as usize, 1),
        }
    }
}

/// Section 4: Product Definition Section
#[derive(Debug, Clone)]
pub struct ProductDefinition {
    pub template: u16,
    pub parameter_category: u8,
    pub parameter_number: u8,
    /// Code table 4.4 unit of the forecast time
    pub time_unit: u8,
    pub forecast_time: u32,
    pub level_type: u8,
    pub level_scale_factor: u8,
    pub level_scaled_value: u32,
}

impl ProductDefinition {
    /// First fixed surface value with the scale factor applied.
    ///
    /// Isobaric levels are reported in hPa, matching ecCodes `level`.
    pub fn level_value(&self) -> f64 {
        if self.level_scaled_value == u32::MAX {
            return 0.0;
        }
        let scale = if self.level_scale_factor == u8::MAX {
            0
        } else {
            // Scale factor is a sign-magnitude byte
            let magnitude = (self.level_scale_factor & 0x7F) as i32;
            if self.level_scale_factor & 0x80 != 0 {
                -magnitude
            } else {
                magnitude
            }
        };
        let value = self.level_scaled_value as f64 / 10f64.powi(scale);
        if self.level_type == 100 {
            value / 100.0
        } else {
            value
        }
    }

    /// Offset from the reference time to the valid time.
    pub fn forecast_offset(&self) -> Result<Duration, Grib2Error> {
        let amount = self.forecast_time as i64;
        let offset = match self.time_unit {
            0 => Duration::minutes(amount),
            1 => Duration::hours(amount),
            2 => Duration::days(amount),
            10 => Duration::hours(3 * amount),
            11 => Duration::hours(6 * amount),
            12 => Duration::hours(12 * amount),
            13 => Duration::seconds(amount),
            unit => {
                return Err(Grib2Error::UnsupportedTemplate {
                    section: 4,
                    template: unit as u16,
                })
            }
        };
        Ok(offset)
    }
}

/// Section 5: Data Representation Section
#[derive(Debug, Clone)]
pub struct DataRepresentation {
    pub num_data_points: u32,
    pub template: u16,
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
}

/// Section 6: Bitmap Section
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub indicator: u8,
    pub data: Bytes,
}

/// Section 7: Data Section
#[derive(Debug, Clone)]
pub struct DataSection {
    pub data: Bytes,
}

// ===== Parsing Functions =====

/// Parse Section 0 (Indicator) from start of message
pub fn parse_indicator(data: &[u8]) -> Result<Indicator, Grib2Error> {
    if data.len() < 16 {
        return Err(Grib2Error::InvalidFormat(
            "Not enough data for indicator section".to_string(),
        ));
    }

    if &data[0..4] != b"GRIB" {
        return Err(Grib2Error::InvalidFormat(
            "Invalid GRIB magic bytes".to_string(),
        ));
    }

    // Octets 5-6 reserved, 7 discipline, 8 edition, 9-16 total length
    let discipline = data[6];
    let edition = data[7];
    if edition != 2 {
        return Err(Grib2Error::InvalidFormat(format!(
            "Expected GRIB edition 2, got {}",
            edition
        )));
    }

    let mut length_bytes = [0u8; 8];
    length_bytes.copy_from_slice(&data[8..16]);

    Ok(Indicator {
        magic: [data[0], data[1], data[2], data[3]],
        discipline,
        edition,
        message_length: u64::from_be_bytes(length_bytes),
    })
}

/// Parse Section 1 (Identification)
pub fn parse_identification(data: &[u8]) -> Result<Identification, Grib2Error> {
    let sec = section_slice(data, 1, 21)?;

    let year = read_u16(sec, 12);
    let month = sec[14];
    let day = sec[15];
    let hour = sec[16];
    let minute = sec[17];
    let second = sec[18];

    let reference_time = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|date| date.and_hms_opt(hour as u32, minute as u32, second as u32))
        .ok_or_else(|| Grib2Error::InvalidSection {
            section: 1,
            reason: format!(
                "Invalid date: {}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ),
        })?;

    Ok(Identification {
        center: read_u16(sec, 5),
        sub_center: read_u16(sec, 7),
        significance_of_reference_time: sec[11],
        reference_time: DateTime::<Utc>::from_naive_utc_and_offset(reference_time, Utc),
        production_status: sec[19],
        data_type: sec[20],
    })
}

/// Parse Section 3 (Grid Definition)
pub fn parse_grid_definition(data: &[u8]) -> Result<GridDefinition, Grib2Error> {
    let sec = section_slice(data, 3, 14)?;

    let num_data_points = read_u32(sec, 6);
    let template = read_u16(sec, 12);
    let gd = &sec[14..];
    let shape_of_earth = gd.first().copied().unwrap_or(255);

    let layout = match template {
        0 => {
            if gd.len() < 58 {
                return Err(Grib2Error::InvalidSection {
                    section: 3,
                    reason: format!("Template 3.0 needs 58 bytes, got {}", gd.len()),
                });
            }
            GridLayout::LatLon {
                ni: read_u32(gd, 16),
                nj: read_u32(gd, 20),
                first_latitude: micro_degrees(&gd[32..36]),
                first_longitude: micro_degrees(&gd[36..40]),
                last_latitude: micro_degrees(&gd[41..45]),
                last_longitude: micro_degrees(&gd[45..49]),
                i_increment: read_u32(gd, 49) as f64 * 1e-6,
                j_increment: read_u32(gd, 53) as f64 * 1e-6,
                scanning_mode: gd[57],
            }
        }
        30 => {
            if gd.len() < 59 {
                return Err(Grib2Error::InvalidSection {
                    section: 3,
                    reason: format!("Template 3.30 needs 59 bytes, got {}", gd.len()),
                });
            }
            GridLayout::LambertConformal {
                nx: read_u32(gd, 16),
                ny: read_u32(gd, 20),
                first_latitude: micro_degrees(&gd[24..28]),
                first_longitude: micro_degrees(&gd[28..32]),
                lad: micro_degrees(&gd[33..37]),
                lov: micro_degrees(&gd[37..41]),
                // Grid lengths are stored in millimeters
                dx: read_u32(gd, 41) as f64 * 1e-3,
                dy: read_u32(gd, 45) as f64 * 1e-3,
                projection_centre: gd[49],
                scanning_mode: gd[50],
                latin1: micro_degrees(&gd[51..55]),
                latin2: micro_degrees(&gd[55..59]),
            }
        }
        _ => GridLayout::Unsupported,
    };

    Ok(GridDefinition {
        template,
        num_data_points,
        shape_of_earth,
        layout,
        raw: Bytes::copy_from_slice(sec),
    })
}

/// Parse Section 4 (Product Definition)
pub fn parse_product_definition(data: &[u8]) -> Result<ProductDefinition, Grib2Error> {
    let sec = section_slice(data, 4, 28)?;

    Ok(ProductDefinition {
        template: read_u16(sec, 7),
        parameter_category: sec[9],
        parameter_number: sec[10],
        time_unit: sec[17],
        forecast_time: read_u32(sec, 18),
        level_type: sec[22],
        level_scale_factor: sec[23],
        level_scaled_value: read_u32(sec, 24),
    })
}

/// Parse Section 5 (Data Representation)
pub fn parse_data_representation(data: &[u8]) -> Result<DataRepresentation, Grib2Error> {
    let sec = section_slice(data, 5, 11)?;

    let num_data_points = read_u32(sec, 5);
    let template = read_u16(sec, 9);

    // Templates 5.0, 5.2, 5.3, 5.40 and 5.41 share the leading R, E, D, bits layout
    let (reference_value, binary_scale_factor, decimal_scale_factor, bits_per_value) =
        if sec.len() >= 20 {
            (
                f32::from_be_bytes([sec[11], sec[12], sec[13], sec[14]]),
                decode_grib2_signed_i16(&sec[15..17]),
                decode_grib2_signed_i16(&sec[17..19]),
                sec[19],
            )
        } else {
            (0.0, 0, 0, 0)
        };

    Ok(DataRepresentation {
        num_data_points,
        template,
        reference_value,
        binary_scale_factor,
        decimal_scale_factor,
        bits_per_value,
    })
}

/// Parse Section 6 (Bitmap). Returns `None` when the message has no bitmap.
pub fn parse_bitmap(data: &[u8]) -> Result<Option<Bitmap>, Grib2Error> {
    let sec = section_slice(data, 6, 6)?;

    match sec[5] {
        255 => Ok(None),
        0 => Ok(Some(Bitmap {
            indicator: 0,
            data: Bytes::copy_from_slice(&sec[6..]),
        })),
        indicator => Err(Grib2Error::InvalidSection {
            section: 6,
            reason: format!("Unsupported bitmap indicator {}", indicator),
        }),
    }
}

/// Parse Section 7 (Data)
pub fn parse_data_section(data: &[u8]) -> Result<DataSection, Grib2Error> {
    let sec = section_slice(data, 7, 5)?;
    Ok(DataSection {
        data: Bytes::copy_from_slice(&sec[5..]),
    })
}

// ===== Helper Functions =====

/// Decode a 4-byte GRIB2 sign-magnitude integer.
///
/// The most significant bit is the sign; the remaining 31 bits are the
/// magnitude. Inputs of any other length decode to 0.
pub fn decode_grib2_signed(bytes: &[u8]) -> i32 {
    if bytes.len() != 4 {
        return 0;
    }
    let raw = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let magnitude = (raw & 0x7FFF_FFFF) as i32;
    if raw & 0x8000_0000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Decode a 2-byte GRIB2 sign-magnitude integer (scale factors).
pub fn decode_grib2_signed_i16(bytes: &[u8]) -> i16 {
    if bytes.len() != 2 {
        return 0;
    }
    let raw = u16::from_be_bytes([bytes[0], bytes[1]]);
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

fn micro_degrees(bytes: &[u8]) -> f64 {
    decode_grib2_signed(bytes) as f64 * 1e-6
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Locate a section and return its bytes, checking a minimum length.
fn section_slice(data: &[u8], section_num: u8, min_len: usize) -> Result<&[u8], Grib2Error> {
    let offset = find_section(data, section_num)?;
    let length = read_u32(data, offset) as usize;
    let sec = &data[offset..offset + length];
    if sec.len() < min_len {
        return Err(Grib2Error::InvalidSection {
            section: section_num,
            reason: format!("Section too short: {} < {} bytes", sec.len(), min_len),
        });
    }
    Ok(sec)
}

/// Find the first occurrence of a section within a message.
fn find_section(data: &[u8], section_num: u8) -> Result<usize, Grib2Error> {
    let mut offset = 16; // After Section 0

    loop {
        if offset + 4 <= data.len() && &data[offset..offset + 4] == b"7777" {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Reached end of message without finding section".to_string(),
            });
        }

        if offset + 5 > data.len() {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Section not found".to_string(),
            });
        }

        let section_length = read_u32(data, offset) as usize;
        if section_length < 5 || offset + section_length > data.len() {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Invalid section length".to_string(),
            });
        }

        if data[offset + 4] == section_num {
            return Ok(offset);
        }

        offset += section_length;
    }
}
