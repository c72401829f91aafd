use std::{collections::BTreeMap, path::Path};

use anyhow::Result;
use polars::{frame::DataFrame, prelude::Column};
use serde::{Deserialize, Serialize};

use crate::{common, config::WeightKind, error::ConfigError, place::PlaceKey};

/// Overlap of a base place with one place of another revision.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct OverlapRecord {
    /// Percentage of the other place's area lying inside the base place.
    #[serde(rename = "Area")]
    pub area: f64,
    /// Percentage of the other place's sub-unit population lying inside the base place.
    #[serde(rename = "Population", default, skip_serializing_if = "Option::is_none")]
    pub population: Option<f64>,
}

impl OverlapRecord {
    pub fn weight(&self, kind: WeightKind) -> Option<f64> {
        match kind {
            WeightKind::Area => Some(self.area),
            WeightKind::Population => self.population,
        }
    }
}

/// Revision identifier -> overlapping place -> overlap.
pub type RevisionRows = BTreeMap<String, BTreeMap<PlaceKey, OverlapRecord>>;

/// Base place -> revision -> overlapping place -> overlap.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct BaseWeightTable {
    places: BTreeMap<PlaceKey, RevisionRows>,
}

/// Number of distinct boundary states a base place passes through, minus one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedChanges {
    pub place: PlaceKey,
    pub expected_changes: usize,
}

impl BaseWeightTable {
    #[inline] pub fn len(&self) -> usize { self.places.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.places.is_empty() }

    #[inline] pub fn get(&self, key: &PlaceKey) -> Option<&RevisionRows> { self.places.get(key) }

    /// Iterate base places in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&PlaceKey, &RevisionRows)> { self.places.iter() }

    pub(crate) fn insert(&mut self, key: PlaceKey, rows: RevisionRows) {
        self.places.insert(key, rows);
    }

    pub fn read(path: &Path) -> Result<Self> { common::read_json(path) }

    pub fn write(&self, path: &Path) -> Result<()> { common::write_json_atomic(self, path) }

    /// Rows of `key` sorted by numeric revision year (non-numeric identifiers last).
    pub fn rows_by_year(&self, key: &PlaceKey) -> Vec<(&str, &BTreeMap<PlaceKey, OverlapRecord>)> {
        let mut rows = self.places.get(key)
            .map(|rows| rows.iter().map(|(year, row)| (year.as_str(), row)).collect::<Vec<_>>())
            .unwrap_or_default();
        rows.sort_by_key(|(year, _)| (year.parse::<i64>().unwrap_or(i64::MAX), year.to_string()));
        rows
    }

    /// Return a copy of this table with `key` corrected from `fix`.
    ///
    /// Revisions already present for `key` keep their original rows; revisions found only
    /// in the fix are added.
    pub fn with_replacement(&self, key: &PlaceKey, fix: &BaseWeightTable) -> Result<Self, ConfigError> {
        let original = self.places.get(key).ok_or_else(|| ConfigError::UnknownPlace(key.clone()))?;
        let fixed = fix.places.get(key).ok_or_else(|| ConfigError::UnknownPlace(key.clone()))?;

        let mut rows = original.clone();
        for (year, row) in fixed {
            rows.entry(year.clone()).or_insert_with(|| row.clone());
        }

        let mut table = self.clone();
        table.places.insert(key.clone(), rows);
        Ok(table)
    }

    /// Count, for each base place, how many distinct overlap states it passes through
    /// beyond the first, so users know how many change dates to look up.
    pub fn expected_changes(&self, kind: WeightKind) -> Vec<ExpectedChanges> {
        self.places.keys()
            .map(|key| {
                let mut states: Vec<Vec<(&PlaceKey, f64, Option<f64>)>> = Vec::new();
                for (_, row) in self.rows_by_year(key) {
                    let state = row.iter()
                        .map(|(place, rec)| match kind {
                            WeightKind::Area => (place, rec.area, None),
                            WeightKind::Population => (place, rec.area, rec.population),
                        })
                        .collect::<Vec<_>>();
                    if !states.contains(&state) { states.push(state) }
                }
                ExpectedChanges { place: key.clone(), expected_changes: states.len().saturating_sub(1) }
            })
            .collect()
    }

    /// Write the expected-changes report as a `Place,Expected_Changes` CSV.
    pub fn write_expected_changes(&self, kind: WeightKind, path: &Path) -> Result<()> {
        let (places, counts) = self.expected_changes(kind).into_iter()
            .map(|c| (c.place.to_string(), c.expected_changes as u32))
            .unzip::<_, _, Vec<_>, Vec<_>>();

        let mut df = DataFrame::new(vec![
            Column::new("Place".into(), places),
            Column::new("Expected_Changes".into(), counts),
        ])?;
        common::write_csv(&mut df, path)?;
        log::info!("written expected changes for {} places to {}", self.len(), path.display());
        Ok(())
    }
}
