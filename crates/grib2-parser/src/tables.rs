//! GRIB2 parameter and level lookup tables.
//!
//! Translates numeric GRIB2 codes into the ecCodes-style `shortName` and
//! `typeOfLevel` keys that variable filters match against.

use std::collections::HashMap;

/// Lookup key for parameter: (discipline, category, number)
pub type ParamKey = (u8, u8, u8);

/// A short name that only applies at a specific level.
#[derive(Debug, Clone)]
struct LevelQualifiedName {
    level_type: u8,
    /// `None` matches any level value of the given type
    level: Option<f64>,
    name: String,
}

/// Parameter short-name table.
#[derive(Debug, Clone, Default)]
pub struct ShortNameTable {
    parameters: HashMap<ParamKey, String>,
    qualified: HashMap<ParamKey, Vec<LevelQualifiedName>>,
}

impl ShortNameTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table covering the HRRR surface product fields.
    pub fn hrrr() -> Self {
        let mut table = Self::new();

        // Meteorological products (discipline 0)
        table.add_parameter(0, 0, 0, "t");
        table.add_parameter(0, 0, 6, "dpt");
        table.add_parameter(0, 1, 0, "q");
        table.add_parameter(0, 1, 1, "r");
        table.add_parameter(0, 1, 8, "tp");
        table.add_parameter(0, 2, 2, "u");
        table.add_parameter(0, 2, 3, "v");
        table.add_parameter(0, 2, 22, "gust");
        table.add_parameter(0, 3, 0, "pres");
        table.add_parameter(0, 3, 1, "prmsl");
        table.add_parameter(0, 3, 5, "gh");
        table.add_parameter(0, 4, 7, "dswrf");
        table.add_parameter(0, 4, 200, "vbdsf");
        table.add_parameter(0, 4, 201, "vddsf");
        table.add_parameter(0, 6, 1, "tcc");
        table.add_parameter(0, 7, 6, "cape");
        table.add_parameter(0, 7, 7, "cin");
        table.add_parameter(0, 16, 196, "refc");
        table.add_parameter(0, 19, 0, "vis");

        // Land surface products (discipline 2)
        table.add_parameter(2, 0, 1, "fsr");

        table.add_level_name(0, 0, 0, 103, Some(2.0), "2t");
        table.add_level_name(0, 0, 6, 103, Some(2.0), "2d");
        table.add_level_name(0, 1, 1, 103, Some(2.0), "2r");
        table.add_level_name(0, 1, 0, 103, Some(2.0), "2sh");
        table.add_level_name(0, 2, 2, 103, Some(10.0), "10u");
        table.add_level_name(0, 2, 3, 103, Some(10.0), "10v");
        table.add_level_name(0, 3, 0, 1, None, "sp");

        table
    }

    /// Add a parameter mapping used at any level.
    pub fn add_parameter(&mut self, discipline: u8, category: u8, number: u8, name: &str) {
        self.parameters
            .insert((discipline, category, number), name.to_string());
    }

    /// Add a name that takes precedence at one level type (and optionally one level value).
    pub fn add_level_name(
        &mut self,
        discipline: u8,
        category: u8,
        number: u8,
        level_type: u8,
        level: Option<f64>,
        name: &str,
    ) {
        self.qualified
            .entry((discipline, category, number))
            .or_default()
            .push(LevelQualifiedName {
                level_type,
                level,
                name: name.to_string(),
            });
    }

    /// Look up the short name of a field.
    ///
    /// Returns "P{discipline}_{category}_{number}" if the parameter is unknown.
    pub fn short_name(
        &self,
        discipline: u8,
        category: u8,
        number: u8,
        level_type: u8,
        level: f64,
    ) -> String {
        let key = (discipline, category, number);

        if let Some(entries) = self.qualified.get(&key) {
            let qualified = entries.iter().find(|entry| {
                entry.level_type == level_type
                    && entry.level.map_or(true, |l| (l - level).abs() < 1e-6)
            });
            if let Some(entry) = qualified {
                return entry.name.clone();
            }
        }

        self.parameters
            .get(&key)
            .cloned()
            .unwrap_or_else(|| format!("P{}_{}_{}", discipline, category, number))
    }

    /// Get the number of parameters in the table
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.qualified.is_empty()
    }
}

/// ecCodes `typeOfLevel` name for a code table 4.5 surface type.
pub fn type_of_level(level_type: u8) -> &'static str {
    match level_type {
        1 => "surface",
        10 => "atmosphere",
        100 => "isobaricInhPa",
        101 => "meanSea",
        102 => "heightAboveSea",
        103 => "heightAboveGround",
        104 => "sigma",
        105 => "hybrid",
        106 => "depthBelowLand",
        200 => "atmosphereSingleLayer",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_parameter_lookup() {
        let tables = ShortNameTable::hrrr();

        assert_eq!(tables.short_name(0, 0, 0, 100, 500.0), "t");
        assert_eq!(tables.short_name(0, 2, 2, 103, 80.0), "u");
        assert_eq!(tables.short_name(0, 2, 3, 103, 80.0), "v");
        assert_eq!(tables.short_name(0, 3, 1, 101, 0.0), "prmsl");
        assert_eq!(tables.short_name(2, 0, 1, 1, 0.0), "fsr");
    }

    #[test]
    fn test_level_qualified_names() {
        let tables = ShortNameTable::hrrr();

        assert_eq!(tables.short_name(0, 0, 0, 103, 2.0), "2t");
        assert_eq!(tables.short_name(0, 0, 6, 103, 2.0), "2d");
        assert_eq!(tables.short_name(0, 1, 1, 103, 2.0), "2r");
        assert_eq!(tables.short_name(0, 2, 2, 103, 10.0), "10u");
        assert_eq!(tables.short_name(0, 2, 3, 103, 10.0), "10v");
        assert_eq!(tables.short_name(0, 3, 0, 1, 0.0), "sp");
        // Pressure on a different surface keeps the generic name
        assert_eq!(tables.short_name(0, 3, 0, 103, 2.0), "pres");
    }

    #[test]
    fn test_parameter_not_found() {
        let tables = ShortNameTable::hrrr();

        assert_eq!(tables.short_name(99, 99, 99, 1, 0.0), "P99_99_99");
        assert_eq!(tables.short_name(0, 0, 99, 1, 0.0), "P0_0_99");
    }

    #[test]
    fn test_empty_table() {
        let tables = ShortNameTable::new();

        assert!(tables.is_empty());
        assert_eq!(tables.parameter_count(), 0);
        assert_eq!(tables.short_name(0, 0, 0, 103, 2.0), "P0_0_0");
    }

    #[test]
    fn test_type_of_level_names() {
        assert_eq!(type_of_level(1), "surface");
        assert_eq!(type_of_level(103), "heightAboveGround");
        assert_eq!(type_of_level(100), "isobaricInhPa");
        assert_eq!(type_of_level(42), "unknown");
    }
}
