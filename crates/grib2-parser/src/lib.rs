//! GRIB2 parser implementation (WMO FM 92 GRIB Edition 2).
//!
//! Reads the HRRR surface product: message framing, section parsing,
//! grid coordinates and field selection by ecCodes-style keys.

pub mod field;
pub mod grid;
pub mod sections;
pub mod tables;
pub mod unpacking;

pub use field::{FieldFilter, Grib2GridReader, GridField, GridReader};
pub use grid::{GridCoordinates, LambertConformal};
pub use tables::ShortNameTable;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use sections::{
    Bitmap, DataRepresentation, DataSection, GridDefinition, Identification, Indicator,
    ProductDefinition,
};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Grib2Error {
    #[error("Invalid GRIB2 format: {0}")]
    InvalidFormat(String),

    #[error("Invalid section {section}: {reason}")]
    InvalidSection { section: u8, reason: String },

    #[error("Unpacking failed: {0}")]
    UnpackingError(String),

    #[error("Unsupported template {template} in section {section}")]
    UnsupportedTemplate { section: u8, template: u16 },

    #[error("No message matches {0}")]
    FieldNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single parsed GRIB2 message.
#[derive(Debug, Clone)]
pub struct Grib2Message {
    /// Byte offset of the message within its file
    pub offset: usize,
    pub indicator: Indicator,
    pub identification: Identification,
    pub grid_definition: GridDefinition,
    pub product_definition: ProductDefinition,
    pub data_representation: DataRepresentation,
    pub bitmap: Option<Bitmap>,
    pub data_section: DataSection,
    /// The complete encoded message
    pub raw: Bytes,
}

impl Grib2Message {
    /// Parse one complete message (from "GRIB" through "7777").
    pub fn parse(offset: usize, raw: Bytes) -> Result<Self, Grib2Error> {
        let indicator = sections::parse_indicator(&raw)?;
        Ok(Self {
            offset,
            identification: sections::parse_identification(&raw)?,
            grid_definition: sections::parse_grid_definition(&raw)?,
            product_definition: sections::parse_product_definition(&raw)?,
            data_representation: sections::parse_data_representation(&raw)?,
            bitmap: sections::parse_bitmap(&raw)?,
            data_section: sections::parse_data_section(&raw)?,
            indicator,
            raw,
        })
    }

    /// (discipline, category, number)
    pub fn parameter_codes(&self) -> (u8, u8, u8) {
        (
            self.indicator.discipline,
            self.product_definition.parameter_category,
            self.product_definition.parameter_number,
        )
    }

    pub fn reference_time(&self) -> DateTime<Utc> {
        self.identification.reference_time
    }

    /// Reference time plus the forecast time of the product definition.
    pub fn valid_time(&self) -> Result<DateTime<Utc>, Grib2Error> {
        Ok(self.identification.reference_time + self.product_definition.forecast_offset()?)
    }

    /// Decode the field values in data-section order. Missing points are `NaN`.
    pub fn unpack_data(&self) -> Result<Vec<f32>, Grib2Error> {
        let drs = &self.data_representation;
        let num_points = self.grid_definition.num_data_points as usize;
        let bitmap = self.bitmap.as_ref().map(|b| b.data.as_ref());

        if drs.template == 0 {
            return unpacking::unpack_simple(
                &self.data_section.data,
                num_points,
                drs.bits_per_value,
                drs.reference_value,
                drs.binary_scale_factor,
                drs.decimal_scale_factor,
                bitmap,
            );
        }

        let decoded = self.decode_with_grib_crate()?;
        if decoded.len() == num_points {
            return Ok(decoded);
        }
        match bitmap {
            Some(bm) => unpacking::apply_bitmap(&decoded, num_points, bm),
            None => Err(Grib2Error::UnpackingError(format!(
                "Decoded {} values for a grid of {} points",
                decoded.len(),
                num_points
            ))),
        }
    }

    /// Complex, spatially differenced and PNG packings.
    fn decode_with_grib_crate(&self) -> Result<Vec<f32>, Grib2Error> {
        let grib_file = grib::from_reader(Cursor::new(self.raw.as_ref()))
            .map_err(|e| Grib2Error::UnpackingError(format!("grib decoder: {}", e)))?;

        let (_, submsg) = grib_file.iter().next().ok_or_else(|| {
            Grib2Error::UnpackingError("grib decoder found no submessage".to_string())
        })?;

        let decoder = grib::Grib2SubmessageDecoder::from(submsg)
            .map_err(|e| Grib2Error::UnpackingError(format!("grib decoder: {}", e)))?;
        let values = decoder
            .dispatch()
            .map_err(|e| Grib2Error::UnpackingError(format!("grib decoder: {}", e)))?;

        Ok(values.collect())
    }
}

/// Sequential reader over the messages of a GRIB2 file.
pub struct Grib2Reader {
    data: Bytes,
    offset: usize,
}

impl Grib2Reader {
    pub fn new(data: Bytes) -> Self {
        Self { data, offset: 0 }
    }

    /// Parse the next message, skipping any bytes before its "GRIB" marker.
    pub fn next_message(&mut self) -> Result<Option<Grib2Message>, Grib2Error> {
        let start = match find_marker(&self.data[self.offset.min(self.data.len())..]) {
            Some(pos) => self.offset + pos,
            None => {
                self.offset = self.data.len();
                return Ok(None);
            }
        };

        let indicator = sections::parse_indicator(&self.data[start..])?;
        let length = usize::try_from(indicator.message_length).map_err(|_| {
            Grib2Error::InvalidFormat(format!(
                "Message length {} exceeds address space",
                indicator.message_length
            ))
        })?;
        if length < 20 {
            return Err(Grib2Error::InvalidFormat(format!(
                "Message at offset {} declares impossible length {}",
                start, length
            )));
        }
        let end = start
            .checked_add(length)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                Grib2Error::InvalidFormat(format!(
                    "Truncated message at offset {}: declared {} bytes, {} available",
                    start,
                    length,
                    self.data.len() - start
                ))
            })?;

        if &self.data[end - 4..end] != b"7777" {
            return Err(Grib2Error::InvalidFormat(format!(
                "Message at offset {} does not end with 7777",
                start
            )));
        }

        self.offset = end;
        Grib2Message::parse(start, self.data.slice(start..end)).map(Some)
    }

    /// Parse every remaining message.
    pub fn messages(&mut self) -> Result<Vec<Grib2Message>, Grib2Error> {
        let mut messages = Vec::new();
        while let Some(message) = self.next_message()? {
            messages.push(message);
        }
        Ok(messages)
    }
}

fn find_marker(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"GRIB")
}
