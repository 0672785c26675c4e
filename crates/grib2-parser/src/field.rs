//! Field selection: open one georeferenced 2-D field from a GRIB2 file.

use crate::grid::GridCoordinates;
use crate::tables::{type_of_level, ShortNameTable};
use crate::{Grib2Error, Grib2Message, Grib2Reader};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Key/value filter selecting one field, using ecCodes key names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    #[serde(rename = "shortName")]
    pub short_name: String,
    #[serde(
        rename = "typeOfLevel",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub type_of_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<f64>,
}

impl FieldFilter {
    pub fn short_name(short_name: impl Into<String>) -> Self {
        Self {
            short_name: short_name.into(),
            type_of_level: None,
            level: None,
        }
    }

    pub fn at_level(mut self, type_of_level: impl Into<String>, level: f64) -> Self {
        self.type_of_level = Some(type_of_level.into());
        self.level = Some(level);
        self
    }

    /// Whether a message with these keys satisfies every key in the filter.
    pub fn matches(&self, short_name: &str, type_of_level: &str, level: f64) -> bool {
        self.short_name == short_name
            && self
                .type_of_level
                .as_deref()
                .map_or(true, |t| t == type_of_level)
            && self.level.map_or(true, |l| (l - level).abs() < 1e-6)
    }
}

impl fmt::Display for FieldFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shortName={}", self.short_name)?;
        if let Some(type_of_level) = &self.type_of_level {
            write!(f, ", typeOfLevel={}", type_of_level)?;
        }
        if let Some(level) = self.level {
            write!(f, ", level={}", level)?;
        }
        Ok(())
    }
}

/// One decoded field with its grid coordinates.
#[derive(Debug, Clone)]
pub struct GridField {
    pub short_name: String,
    pub type_of_level: String,
    pub level: f64,
    pub reference_time: DateTime<Utc>,
    pub valid_time: DateTime<Utc>,
    pub coordinates: Arc<GridCoordinates>,
    /// Values in data-section order; missing points are `NaN`
    pub values: Vec<f32>,
}

impl GridField {
    /// Grid dimensions as (columns, rows)
    pub fn shape(&self) -> (usize, usize) {
        (self.coordinates.nx, self.coordinates.ny)
    }

    pub fn value_at(&self, k: usize) -> Option<f32> {
        self.values.get(k).copied()
    }
}

/// Source of decoded fields.
pub trait GridReader: Send + Sync {
    /// Open the single field of `path` matching `filter`.
    fn open_field(&self, path: &Path, filter: &FieldFilter) -> Result<GridField, Grib2Error>;

    /// Open several fields from one file. Results are in filter order.
    fn open_fields(
        &self,
        path: &Path,
        filters: &[FieldFilter],
    ) -> Vec<Result<GridField, Grib2Error>> {
        filters
            .iter()
            .map(|filter| self.open_field(path, filter))
            .collect()
    }
}

/// Reads fields from GRIB2 files on the local filesystem.
///
/// Grid coordinates are computed once per distinct grid definition and
/// shared between fields.
pub struct Grib2GridReader {
    names: Arc<ShortNameTable>,
    coordinates: Mutex<HashMap<Bytes, Arc<GridCoordinates>>>,
}

impl Grib2GridReader {
    pub fn new(names: Arc<ShortNameTable>) -> Self {
        Self {
            names,
            coordinates: Mutex::new(HashMap::new()),
        }
    }

    /// Reader using the HRRR short-name table.
    pub fn hrrr() -> Self {
        Self::new(Arc::new(ShortNameTable::hrrr()))
    }

    fn read_messages(path: &Path) -> Result<Vec<Grib2Message>, Grib2Error> {
        let data = std::fs::read(path)?;
        let messages = Grib2Reader::new(Bytes::from(data)).messages()?;
        if messages.is_empty() {
            return Err(Grib2Error::InvalidFormat(format!(
                "{} contains no GRIB2 messages",
                path.display()
            )));
        }
        debug!(path = %path.display(), messages = messages.len(), "Read GRIB2 file");
        Ok(messages)
    }

    fn select(
        &self,
        path: &Path,
        messages: &[Grib2Message],
        filter: &FieldFilter,
    ) -> Result<GridField, Grib2Error> {
        let mut matching = messages.iter().filter_map(|message| {
            let (discipline, category, number) = message.parameter_codes();
            let level_type = message.product_definition.level_type;
            let level = message.product_definition.level_value();
            let short_name = self
                .names
                .short_name(discipline, category, number, level_type, level);
            let type_of_level = type_of_level(level_type);
            filter
                .matches(&short_name, type_of_level, level)
                .then(|| (message, short_name, type_of_level, level))
        });

        let (message, short_name, type_of_level, level) = matching
            .next()
            .ok_or_else(|| Grib2Error::FieldNotFound(filter.to_string()))?;

        let extra = matching.count();
        if extra > 0 {
            warn!(
                path = %path.display(),
                filter = %filter,
                extra,
                "Filter matches several messages, using the first"
            );
        }

        let coordinates = self.coordinates_for(message)?;
        let values = message.unpack_data()?;
        if values.len() != coordinates.len() {
            return Err(Grib2Error::UnpackingError(format!(
                "Field has {} values but grid has {} points",
                values.len(),
                coordinates.len()
            )));
        }

        Ok(GridField {
            short_name,
            type_of_level: type_of_level.to_string(),
            level,
            reference_time: message.reference_time(),
            valid_time: message.valid_time()?,
            coordinates,
            values,
        })
    }

    fn coordinates_for(&self, message: &Grib2Message) -> Result<Arc<GridCoordinates>, Grib2Error> {
        let key = message.grid_definition.raw.clone();
        {
            let memo = self.coordinates.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(coords) = memo.get(&key) {
                return Ok(coords.clone());
            }
        }

        let coords = Arc::new(GridCoordinates::from_definition(&message.grid_definition)?);
        let mut memo = self.coordinates.lock().unwrap_or_else(|e| e.into_inner());
        Ok(memo.entry(key).or_insert(coords).clone())
    }
}

impl GridReader for Grib2GridReader {
    fn open_field(&self, path: &Path, filter: &FieldFilter) -> Result<GridField, Grib2Error> {
        let messages = Self::read_messages(path)?;
        self.select(path, &messages, filter)
    }

    fn open_fields(
        &self,
        path: &Path,
        filters: &[FieldFilter],
    ) -> Vec<Result<GridField, Grib2Error>> {
        match Self::read_messages(path) {
            Ok(messages) => filters
                .iter()
                .map(|filter| self.select(path, &messages, filter))
                .collect(),
            Err(e) => {
                let reason = e.to_string();
                filters
                    .iter()
                    .map(|_| Err(Grib2Error::InvalidFormat(reason.clone())))
                    .collect()
            }
        }
    }
}
