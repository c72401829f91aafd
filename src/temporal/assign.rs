use std::{collections::BTreeMap, path::Path};

use anyhow::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    common,
    config::{WeightConfig, WeightKind},
    error::ConfigError,
    place::PlaceKey,
    weights::{BaseWeightTable, OverlapRecord},
};
use super::ChangeLog;

/// Observation date -> predecessor place -> weight percentage.
pub type DatedWeights = BTreeMap<i64, BTreeMap<PlaceKey, f64>>;

/// Base place -> observation date -> predecessor place -> weight percentage.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct WeightByDateTable {
    places: BTreeMap<PlaceKey, DatedWeights>,
}

impl WeightByDateTable {
    #[inline] pub fn len(&self) -> usize { self.places.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.places.is_empty() }

    #[inline] pub fn get(&self, key: &PlaceKey) -> Option<&DatedWeights> { self.places.get(key) }

    pub fn iter(&self) -> impl Iterator<Item = (&PlaceKey, &DatedWeights)> { self.places.iter() }

    pub fn insert(&mut self, key: PlaceKey, weights: DatedWeights) {
        self.places.insert(key, weights);
    }

    pub fn read(path: &Path) -> Result<Self> { common::read_json(path) }

    pub fn write(&self, path: &Path) -> Result<()> { common::write_json_atomic(self, path) }
}

/// Only the latest change between two consecutive revisions can be seen in the later one:
/// for each interval `(years[i], years[i + 1]]`, keep the latest change date falling in it.
pub fn observed_dates(changes: &[i64], years: &[i64]) -> Vec<i64> {
    years.windows(2)
        .filter_map(|pair| changes.iter().copied().filter(|&date| pair[0] < date && date <= pair[1]).max())
        .collect()
}

/// Turn a revision identifier into a `yyyymmdd` date: 4-digit years get `suffix` appended.
fn revision_date(year: &str, suffix: &str) -> Result<i64, ConfigError> {
    let date = if year.len() == 4 { format!("{year}{suffix}") } else { year.to_string() };
    date.parse().map_err(|_| ConfigError::InvalidRevisionLabel(year.to_string()))
}

/// Assigns the revision rows of a base weight table to the dates on which they came into force.
pub struct DateAssigner<'a> {
    table: &'a BaseWeightTable,
    changes: &'a ChangeLog,
    kind: WeightKind,
    date_suffix: String,
    raw_years: Option<Vec<i64>>,
}

impl<'a> DateAssigner<'a> {
    pub fn new(table: &'a BaseWeightTable, changes: &'a ChangeLog) -> Self {
        Self {
            table,
            changes,
            kind: WeightKind::default(),
            date_suffix: WeightConfig::default().date_suffix,
            raw_years: None,
        }
    }

    pub fn from_config(table: &'a BaseWeightTable, changes: &'a ChangeLog, config: &WeightConfig) -> Self {
        Self::new(table, changes)
            .with_kind(config.weight_kind)
            .with_date_suffix(&config.date_suffix)
            .with_raw_years(config.raw_years.clone())
    }

    pub fn with_kind(mut self, kind: WeightKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_date_suffix(mut self, suffix: &str) -> Self {
        self.date_suffix = suffix.to_string();
        self
    }

    /// Revision years that coincide with a census. Any other revision is itself treated
    /// as evidence of a change at its own date.
    pub fn with_raw_years(mut self, raw_years: Option<Vec<i64>>) -> Self {
        self.raw_years = raw_years;
        self
    }

    /// Date every place of the table. Fails on the first place whose weights cannot be read.
    pub fn assign(&self) -> Result<WeightByDateTable, ConfigError> {
        log::info!("assigning dates to {} places by {} weight", self.table.len(), self.kind.to_str());

        let places = self.table.iter().map(|(key, _)| key).collect::<Vec<_>>();
        let dated = places.into_par_iter()
            .map(|key| Ok((key.clone(), self.assign_place(key)?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let mut table = WeightByDateTable::default();
        for (key, weights) in dated {
            table.insert(key, weights);
        }
        Ok(table)
    }

    /// Date the revision rows of one base place.
    pub fn assign_place(&self, key: &PlaceKey) -> Result<DatedWeights, ConfigError> {
        let rows = self.table.rows_by_year(key);
        if rows.is_empty() {
            return Err(ConfigError::UnknownPlace(key.clone()));
        }
        let years = rows.iter()
            .map(|(year, _)| revision_date(year, &self.date_suffix))
            .collect::<Result<Vec<_>, _>>()?;
        let (first, last) = (years[0], years[years.len() - 1]);

        let mut changes = self.changes.dates_for(key.gid()).iter()
            .copied()
            .filter(|&date| first <= date && date <= last)
            .collect::<Vec<_>>();
        if let Some(raw_years) = &self.raw_years {
            let raw = raw_years.iter()
                .map(|year| revision_date(&year.to_string(), &self.date_suffix))
                .collect::<Result<Vec<_>, _>>()?;
            let extra = years.iter().copied()
                .filter(|year| !raw.contains(year) && !changes.contains(year))
                .collect::<Vec<_>>();
            changes.extend(extra);
        }

        if changes.is_empty() {
            log::debug!("{key}: no changes between {first} and {last}");
            return Ok(DatedWeights::from([(first, BTreeMap::from([(key.clone(), 100.0)]))]));
        }

        let observed = observed_dates(&changes, &years);
        log::debug!("{key}: observed changes {observed:?}");

        let mut dated = DatedWeights::new();
        for (idx, (year, row)) in rows.iter().enumerate() {
            let weights = self.row_weights(key, year, row)?;
            if idx == 0 {
                dated.insert(first, weights);
                continue;
            }
            for &date in observed.iter().filter(|&&date| years[idx - 1] < date && date <= years[idx]) {
                dated.insert(date, weights.clone());
            }
        }
        Ok(dated)
    }

    fn row_weights(
        &self,
        key: &PlaceKey,
        year: &str,
        row: &BTreeMap<PlaceKey, OverlapRecord>,
    ) -> Result<BTreeMap<PlaceKey, f64>, ConfigError> {
        row.iter()
            .map(|(place, record)| {
                record.weight(self.kind)
                    .map(|weight| (place.clone(), weight))
                    .ok_or_else(|| ConfigError::MissingWeightKind {
                        place: key.clone(),
                        revision: year.to_string(),
                        kind: self.kind.to_str(),
                    })
            })
            .collect()
    }
}
