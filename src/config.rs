use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::place::RecordLayout;

/// Which percentage of an overlap record is carried into dated weights.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeightKind {
    Area,
    #[default]
    Population,
}

impl WeightKind {
    pub fn to_str(&self) -> &'static str {
        match self {
            WeightKind::Area => "area",
            WeightKind::Population => "population",
        }
    }
}

/// Settings shared by the construction and date-assignment passes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WeightConfig {
    /// Intersections at or below this area are treated as drawing noise.
    pub cut_off: f64,
    pub gid_column: usize,
    pub name_columns: Vec<usize>,
    /// Column of the sub-unit attribute table holding the population weight.
    pub weight_column: Option<usize>,
    /// File name or label of the revision every other revision is weighted against.
    pub base_revision: String,
    /// Appended to 4-digit revision years so they compare against yyyymmdd change dates.
    pub date_suffix: String,
    pub weight_kind: WeightKind,
    /// Revision years that coincide with a real census.
    pub raw_years: Option<Vec<i64>>,
    /// Change-log columns whose header contains this marker hold change dates.
    pub change_marker: String,
    /// Change-log cells equal to this marker are empty.
    pub blank_marker: String,
}

impl Default for WeightConfig {
    fn default() -> Self {
        WeightConfig {
            cut_off: 100.0,
            gid_column: 0,
            name_columns: vec![1],
            weight_column: None,
            base_revision: String::new(),
            date_suffix: "0101".into(),
            weight_kind: WeightKind::default(),
            raw_years: None,
            change_marker: "Changes".into(),
            blank_marker: "-".into(),
        }
    }
}

impl WeightConfig {
    /// Reads a config from a JSON file; missing keys fall back to the defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("[config] Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("[config] Invalid JSON in config file: {}", path.display()))
    }

    /// Attribute layout for boundary revision files.
    pub fn boundary_layout(&self) -> RecordLayout {
        RecordLayout::new(self.gid_column, self.name_columns.clone())
    }

    /// Attribute layout for the sub-unit file, which also carries the weight column.
    pub fn sub_unit_layout(&self) -> RecordLayout {
        RecordLayout::new(self.gid_column, self.name_columns.clone())
            .with_weight_column(self.weight_column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config: WeightConfig = serde_json::from_str(r#"{"base_revision": "1951.shp", "weight_kind": "area"}"#).unwrap();
        assert_eq!(config.base_revision, "1951.shp");
        assert_eq!(config.weight_kind, WeightKind::Area);
        assert_eq!(config.cut_off, 100.0);
        assert_eq!(config.name_columns, vec![1]);
        assert_eq!(config.date_suffix, "0101");
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"cut_off": 0.5, "weight_column": 2}"#).unwrap();

        let config = WeightConfig::from_json_file(&path).unwrap();
        assert_eq!(config.cut_off, 0.5);
        assert_eq!(config.sub_unit_layout().weight_column(), Some(2));
    }
}
