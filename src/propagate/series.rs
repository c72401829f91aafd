use std::{collections::{BTreeMap, BTreeSet}, fmt, path::Path};

use ahash::AHashMap;
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{common, place::PlaceKey};

/// Sentinel for values that cannot be weighted.
pub const NA: &str = "NA";

/// One observation of an attribute: a number, or a text sentinel such as `"NA"`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
}

impl AttributeValue {
    pub fn na() -> Self { Self::Text(NA.to_string()) }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    /// Scale by `weight` percent. Text passes through untouched.
    pub fn weighted(&self, weight: f64) -> Self {
        match self {
            Self::Number(value) => Self::Number(value * weight / 100.0),
            Self::Text(_) => self.clone(),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self { Self::Number(value) }
}

impl From<&str> for AttributeValue {
    fn from(text: &str) -> Self { Self::Text(text.to_string()) }
}

/// Attribute name -> date -> value.
pub type PlaceSeries = BTreeMap<String, BTreeMap<i64, AttributeValue>>;

/// Dated attribute data keyed by `"{gid}__{name}"`, searchable by gid alone.
#[derive(Debug, Clone, Default)]
pub struct ExternalSeries {
    places: BTreeMap<PlaceKey, PlaceSeries>,
    by_gid: AHashMap<String, PlaceKey>,
    attributes: BTreeSet<String>,
}

impl ExternalSeries {
    pub fn new(places: BTreeMap<PlaceKey, PlaceSeries>) -> Self {
        let mut by_gid = AHashMap::with_capacity(places.len());
        for key in places.keys() {
            if let Some(previous) = by_gid.insert(key.gid().to_string(), key.clone()) {
                log::warn!("gid {} is shared by {previous} and {key}; using {key}", key.gid());
            }
        }
        let attributes = places.values().flat_map(|series| series.keys().cloned()).collect();
        Self { places, by_gid, attributes }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let places = common::read_json(path)?;
        Ok(Self::new(places))
    }

    pub fn write(&self, path: &Path) -> Result<()> { common::write_json_atomic(&self.places, path) }

    #[inline] pub fn len(&self) -> usize { self.places.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.places.is_empty() }

    /// Series stored under exactly `key`.
    #[inline] pub fn get(&self, key: &PlaceKey) -> Option<&PlaceSeries> { self.places.get(key) }

    /// Series of the place sharing `key`'s gid; names often differ between datasets.
    pub fn find(&self, key: &PlaceKey) -> Option<&PlaceSeries> {
        self.by_gid.get(key.gid()).and_then(|stored| self.places.get(stored))
    }

    /// Every attribute name found on any place, sorted.
    pub fn attributes(&self) -> impl Iterator<Item = &str> { self.attributes.iter().map(String::as_str) }

    pub fn iter(&self) -> impl Iterator<Item = (&PlaceKey, &PlaceSeries)> { self.places.iter() }
}

impl FromIterator<(PlaceKey, PlaceSeries)> for ExternalSeries {
    fn from_iter<I: IntoIterator<Item = (PlaceKey, PlaceSeries)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_read_as_numbers_or_text() {
        let series: BTreeMap<i64, AttributeValue> =
            serde_json::from_str(r#"{"19340101": 12, "19350101": 2.5, "19360101": "NA"}"#).unwrap();
        assert_eq!(series[&19340101], AttributeValue::Number(12.0));
        assert_eq!(series[&19350101], AttributeValue::Number(2.5));
        assert_eq!(series[&19360101], AttributeValue::na());
    }

    #[test]
    fn weighting_scales_numbers_only() {
        assert_eq!(AttributeValue::from(200.0).weighted(25.0), AttributeValue::Number(50.0));
        assert_eq!(AttributeValue::na().weighted(25.0), AttributeValue::na());
    }

    #[test]
    fn places_are_found_by_gid() {
        let series = ExternalSeries::from_iter([
            (PlaceKey::from("01__Otley UD"), PlaceSeries::from([("Pop".into(), BTreeMap::new())])),
            (PlaceKey::from("02__Bradford CB"), PlaceSeries::from([("Deaths".into(), BTreeMap::new())])),
        ]);
        assert!(series.find(&"01__OTLEY_UD".into()).is_some());
        assert!(series.get(&"01__OTLEY_UD".into()).is_none());
        assert!(series.find(&"03__ILKLEY_UD".into()).is_none());
        assert_eq!(series.attributes().collect::<Vec<_>>(), vec!["Deaths", "Pop"]);
    }

    #[test]
    fn reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("external.json");
        std::fs::write(&path, r#"{"01__Otley": {"Pop": {"19310101": 1000}}}"#).unwrap();

        let series = ExternalSeries::read(&path).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.find(&"01__OTLEY".into()).unwrap()["Pop"][&19310101], AttributeValue::Number(1000.0));
    }
}
