//! Variable catalog: human-readable names mapped to GRIB2 field filters.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use forecast_common::{ForecastError, ForecastResult};
use grib2_parser::FieldFilter;

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Name stored in the `variable` column
    pub name: String,
    pub filter: FieldFilter,
    /// `VAR:LEVEL` description as it appears in `.idx` inventories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idx: Option<String>,
}

impl VariableSpec {
    pub fn new(name: &str, filter: FieldFilter, idx: &str) -> Self {
        Self {
            name: name.to_string(),
            filter,
            idx: Some(idx.to_string()),
        }
    }
}

/// Immutable name → filter mapping. Names are unique and keep their
/// insertion order.
#[derive(Debug, Clone)]
pub struct VariableCatalog {
    specs: Vec<VariableSpec>,
    by_name: HashMap<String, usize>,
}

impl VariableCatalog {
    /// Build a catalog, rejecting duplicate names and empty filters.
    pub fn new(specs: Vec<VariableSpec>) -> ForecastResult<Self> {
        let mut by_name = HashMap::with_capacity(specs.len());
        for (index, spec) in specs.iter().enumerate() {
            if spec.name.trim().is_empty() {
                return Err(ForecastError::InvalidConfig(format!(
                    "Catalog entry {} has an empty name",
                    index
                )));
            }
            if spec.filter.short_name.trim().is_empty() {
                return Err(ForecastError::InvalidConfig(format!(
                    "Variable {} has an empty shortName",
                    spec.name
                )));
            }
            if by_name.insert(spec.name.clone(), index).is_some() {
                return Err(ForecastError::InvalidConfig(format!(
                    "Variable {} is defined more than once",
                    spec.name
                )));
            }
        }
        Ok(Self { specs, by_name })
    }

    /// The HRRR surface product variables.
    pub fn hrrr_surface() -> Self {
        let specs = vec![
            VariableSpec::new("surface_pressure", FieldFilter::short_name("sp"), "PRES:surface"),
            VariableSpec::new("surface_roughness", FieldFilter::short_name("fsr"), "SFCR:surface"),
            VariableSpec::new(
                "visible_beam_downward_solar_flux",
                FieldFilter::short_name("vbdsf"),
                "VBDSF:surface",
            ),
            VariableSpec::new(
                "visible_diffuse_downward_solar_flux",
                FieldFilter::short_name("vddsf"),
                "VDDSF:surface",
            ),
            VariableSpec::new("temperature_2m", FieldFilter::short_name("2t"), "TMP:2 m above ground"),
            VariableSpec::new("dewpoint_2m", FieldFilter::short_name("2d"), "DPT:2 m above ground"),
            VariableSpec::new(
                "relative_humidity_2m",
                FieldFilter::short_name("2r"),
                "RH:2 m above ground",
            ),
            VariableSpec::new(
                "u_component_wind_10m",
                FieldFilter::short_name("10u"),
                "UGRD:10 m above ground",
            ),
            VariableSpec::new(
                "v_component_wind_10m",
                FieldFilter::short_name("10v"),
                "VGRD:10 m above ground",
            ),
            VariableSpec::new(
                "u_component_wind_80m",
                FieldFilter::short_name("u").at_level("heightAboveGround", 80.0),
                "UGRD:80 m above ground",
            ),
            VariableSpec::new(
                "v_component_wind_80m",
                FieldFilter::short_name("v").at_level("heightAboveGround", 80.0),
                "VGRD:80 m above ground",
            ),
        ];

        let by_name = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| (spec.name.clone(), index))
            .collect();
        Self { specs, by_name }
    }

    /// Load a catalog from a YAML list of entries:
    ///
    /// ```yaml
    /// - name: temperature_2m
    ///   filter: { shortName: 2t }
    ///   idx: "TMP:2 m above ground"
    /// ```
    pub fn from_yaml(path: impl AsRef<Path>) -> ForecastResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let specs: Vec<VariableSpec> = serde_yaml::from_str(&content).map_err(|e| {
            ForecastError::InvalidConfig(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Self::new(specs)
    }

    pub fn get(&self, name: &str) -> Option<&VariableSpec> {
        self.by_name.get(name).map(|&index| &self.specs[index])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Variable names in catalog order.
    pub fn names(&self) -> Vec<String> {
        self.specs.iter().map(|spec| spec.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableSpec> {
        self.specs.iter()
    }

    /// Entry whose inventory description matches `VAR:LEVEL`.
    pub fn by_idx_description(&self, description: &str) -> Option<&VariableSpec> {
        self.specs
            .iter()
            .find(|spec| spec.idx.as_deref() == Some(description))
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl Default for VariableCatalog {
    fn default() -> Self {
        Self::hrrr_surface()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let catalog = VariableCatalog::hrrr_surface();
        assert_eq!(catalog.len(), 11);
        assert_eq!(catalog.names()[0], "surface_pressure");
        assert_eq!(catalog.names()[10], "v_component_wind_80m");

        let wind = catalog.get("u_component_wind_80m").unwrap();
        assert_eq!(wind.filter.short_name, "u");
        assert_eq!(wind.filter.type_of_level.as_deref(), Some("heightAboveGround"));
        assert_eq!(wind.filter.level, Some(80.0));

        assert!(catalog.get("snow_depth").is_none());
    }

    #[test]
    fn test_builtin_catalog_passes_validation() {
        let specs: Vec<_> = VariableCatalog::hrrr_surface().iter().cloned().collect();
        assert!(VariableCatalog::new(specs).is_ok());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let specs = vec![
            VariableSpec::new("t", FieldFilter::short_name("2t"), "TMP:2 m above ground"),
            VariableSpec::new("t", FieldFilter::short_name("2d"), "DPT:2 m above ground"),
        ];
        assert!(matches!(
            VariableCatalog::new(specs),
            Err(ForecastError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_empty_short_name_rejected() {
        let specs = vec![VariableSpec::new("t", FieldFilter::short_name(""), "")];
        assert!(VariableCatalog::new(specs).is_err());
    }

    #[test]
    fn test_idx_lookup() {
        let catalog = VariableCatalog::hrrr_surface();
        let spec = catalog.by_idx_description("UGRD:80 m above ground").unwrap();
        assert_eq!(spec.name, "u_component_wind_80m");
        assert!(catalog.by_idx_description("UGRD:250 mb").is_none());
    }

    #[test]
    fn test_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        std::fs::write(
            &path,
            r#"
- name: gust
  filter:
    shortName: gust
- name: u_250
  filter: { shortName: u, typeOfLevel: isobaricInhPa, level: 250 }
"#,
        )
        .unwrap();

        let catalog = VariableCatalog::from_yaml(&path).unwrap();
        assert_eq!(catalog.names(), vec!["gust", "u_250"]);
        assert_eq!(catalog.get("u_250").unwrap().filter.level, Some(250.0));
        assert!(catalog.get("gust").unwrap().idx.is_none());
    }
}
