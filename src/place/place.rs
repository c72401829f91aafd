use std::{fmt, sync::Arc};

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Separator between the gid and the name in a place key.
pub(crate) const KEY_SEPARATOR: &str = "__";

/// Separator between name parts composed from several attribute columns.
pub(crate) const NAME_SEPARATOR: &str = "_";

/// Stable key for a place across tables: `"{gid}__{name}"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaceKey(String);

impl PlaceKey {
    pub fn new(gid: &str, name: &str) -> Self {
        Self(format!("{gid}{KEY_SEPARATOR}{name}"))
    }

    /// The gid part of the key; the whole key if it has no separator.
    pub fn gid(&self) -> &str {
        self.0.split_once(KEY_SEPARATOR).map_or(&self.0, |(gid, _)| gid)
    }

    /// The name part of the key; empty if it has no separator.
    pub fn name(&self) -> &str {
        self.0.split_once(KEY_SEPARATOR).map_or("", |(_, name)| name)
    }

    #[inline] pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for PlaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlaceKey {
    fn from(key: &str) -> Self { Self(key.to_string()) }
}

impl From<String> for PlaceKey {
    fn from(key: String) -> Self { Self(key) }
}

/// Which attribute columns (base-zero) hold the gid, the name parts and the weight.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordLayout {
    gid_column: usize,
    name_columns: Vec<usize>,
    weight_column: Option<usize>,
}

impl RecordLayout {
    pub fn new(gid_column: usize, name_columns: Vec<usize>) -> Self {
        Self { gid_column, name_columns, weight_column: None }
    }

    pub fn with_weight_column(mut self, weight_column: Option<usize>) -> Self {
        self.weight_column = weight_column;
        self
    }

    #[inline] pub fn weight_column(&self) -> Option<usize> { self.weight_column }

    /// Build a place from its geometry and attribute values in column order.
    pub(crate) fn place(&self, geometry: MultiPolygon<f64>, values: &[String]) -> anyhow::Result<Place> {
        let column = |idx: usize| values.get(idx)
            .map(String::as_str)
            .ok_or(ConfigError::MissingColumn { column: idx, available: values.len() });

        let gid = column(self.gid_column)?;
        let name = self.name_columns.iter()
            .map(|&idx| column(idx))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(NAME_SEPARATOR);

        let weight_value = match self.weight_column {
            Some(idx) => {
                let raw = column(idx)?;
                let value = raw.parse::<f64>()
                    .map_err(|e| anyhow::anyhow!("invalid weight {raw:?} for place {gid}: {e}"))?;
                anyhow::ensure!(value >= 0.0, "negative weight {value} for place {gid}");
                Some(value)
            }
            None => None,
        };

        Ok(Place::new(gid, &name, geometry).with_weight(weight_value))
    }
}

/// One geographic unit at one point in time.
#[derive(Debug, Clone)]
pub struct Place {
    pub gid: Arc<str>,
    pub name: Arc<str>,
    pub geometry: MultiPolygon<f64>,
    pub weight_value: Option<f64>, // Population (or similar) carried by sub-unit files
}

impl Place {
    pub fn new(gid: &str, name: &str, geometry: MultiPolygon<f64>) -> Self {
        Self { gid: Arc::from(gid), name: Arc::from(name), geometry, weight_value: None }
    }

    pub fn with_weight(mut self, weight_value: Option<f64>) -> Self {
        self.weight_value = weight_value;
        self
    }

    pub fn key(&self) -> PlaceKey { PlaceKey::new(&self.gid, &self.name) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn key_splits_on_first_separator() {
        let key = PlaceKey::new("12", "OTLEY__UD");
        assert_eq!(key.as_str(), "12__OTLEY__UD");
        assert_eq!(key.gid(), "12");
        assert_eq!(key.name(), "OTLEY__UD");
        assert_eq!(PlaceKey::from("bare").gid(), "bare");
    }

    #[test]
    fn name_is_composed_from_columns() {
        let layout = RecordLayout::new(0, vec![1, 2]);
        let place = layout.place(MultiPolygon(vec![]), &values(&["7", "OTLEY", "UD"])).unwrap();
        assert_eq!(place.key().as_str(), "7__OTLEY_UD");
        assert_eq!(place.weight_value, None);
    }

    #[test]
    fn empty_name_parts_are_skipped() {
        let layout = RecordLayout::new(0, vec![1, 2]);
        let place = layout.place(MultiPolygon(vec![]), &values(&["7", "OTLEY", ""])).unwrap();
        assert_eq!(place.name.as_ref(), "OTLEY");
    }

    #[test]
    fn weight_column_is_parsed() {
        let layout = RecordLayout::new(0, vec![1]).with_weight_column(Some(2));
        let place = layout.place(MultiPolygon(vec![]), &values(&["3", "Ward", "1250.5"])).unwrap();
        assert_eq!(place.weight_value, Some(1250.5));
    }

    #[test]
    fn out_of_range_column_is_an_error() {
        let layout = RecordLayout::new(0, vec![4]);
        let err = layout.place(MultiPolygon(vec![]), &values(&["3", "Ward"])).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::MissingColumn { column: 4, available: 2 }),
        );
    }

    #[test]
    fn bad_weight_is_an_error() {
        let layout = RecordLayout::new(0, vec![1]).with_weight_column(Some(2));
        assert!(layout.place(MultiPolygon(vec![]), &values(&["3", "Ward", "n/a"])).is_err());
        assert!(layout.place(MultiPolygon(vec![]), &values(&["3", "Ward", "-4"])).is_err());
    }
}
