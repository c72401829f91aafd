use std::{collections::BTreeMap, path::Path};

use anyhow::Result;
use polars::{frame::DataFrame, prelude::Column};
use rayon::prelude::*;

use crate::{
    common,
    error::DataQualityWarning,
    place::PlaceKey,
    temporal::{DatedWeights, WeightByDateTable},
};
use super::{AttributeValue, ExternalSeries, PlaceSeries};

/// File name of the non-common dates report, written next to the weighted database.
pub const NON_COMMON_DATES_FILE: &str = "NonCommonDates.csv";

/// Dates of one attribute that only some predecessors of a target had data for.
#[derive(Debug, Clone, PartialEq)]
pub struct NonCommonDates {
    pub target: PlaceKey,
    pub attribute: String,
    pub predecessors: Vec<PlaceKey>,
    /// Number of predecessors every date needed data from.
    pub expected: usize,
    /// Non-common date -> number of predecessors with data at that date.
    pub counts: BTreeMap<i64, usize>,
}

/// Weighted attribute data for the target places, plus everything that could not be weighted.
#[derive(Debug, Clone, Default)]
pub struct WeightedDatabase {
    pub series: BTreeMap<PlaceKey, PlaceSeries>,
    pub non_common: Vec<NonCommonDates>,
    pub warnings: Vec<DataQualityWarning>,
}

impl WeightedDatabase {
    /// Write the weighted series as JSON to `path`, and the non-common dates report (if any)
    /// alongside it.
    pub fn write(&self, path: &Path) -> Result<()> {
        common::write_json_atomic(&self.series, path)?;
        log::info!("written weighted data for {} places to {}", self.series.len(), path.display());

        if !self.non_common.is_empty() {
            let report = path.with_file_name(NON_COMMON_DATES_FILE);
            common::write_csv(&mut self.non_common_frame()?, &report)?;
            log::info!("written {} non-common date records to {}", self.non_common.len(), report.display());
        }
        Ok(())
    }

    /// The non-common dates report, one row per date.
    pub fn non_common_frame(&self) -> Result<DataFrame> {
        let rows = self.non_common.iter()
            .flat_map(|record| record.counts.iter().map(move |(&date, &count)| (record, date, count)))
            .collect::<Vec<_>>();

        let predecessors = |record: &NonCommonDates| record.predecessors.iter()
            .map(PlaceKey::as_str)
            .collect::<Vec<_>>()
            .join(";");

        Ok(DataFrame::new(vec![
            Column::new("Target".into(), rows.iter().map(|(r, _, _)| r.target.to_string()).collect::<Vec<_>>()),
            Column::new("Attribute".into(), rows.iter().map(|(r, _, _)| r.attribute.clone()).collect::<Vec<_>>()),
            Column::new("Predecessors".into(), rows.iter().map(|(r, _, _)| predecessors(r)).collect::<Vec<_>>()),
            Column::new("Expected".into(), rows.iter().map(|(r, _, _)| r.expected as u32).collect::<Vec<_>>()),
            Column::new("Date".into(), rows.iter().map(|(_, date, _)| *date).collect::<Vec<_>>()),
            Column::new("Count".into(), rows.iter().map(|(_, _, count)| *count as u32).collect::<Vec<_>>()),
        ])?)
    }

    /// Re-index the weighted data so it can be weighted again or searched by gid.
    pub fn into_series(self) -> ExternalSeries {
        ExternalSeries::new(self.series)
    }
}

/// Everything produced while weighting one target place.
#[derive(Debug, Default)]
struct PlaceOutcome {
    series: PlaceSeries,
    non_common: Vec<NonCommonDates>,
    warnings: Vec<DataQualityWarning>,
}

impl PlaceOutcome {
    fn warn(&mut self, warning: DataQualityWarning) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    fn insert(&mut self, attribute: &str, date: i64, value: AttributeValue) {
        self.series.entry(attribute.to_string()).or_default().insert(date, value);
    }
}

/// Redistributes attribute data recorded for predecessor places onto the target places
/// of a weight-by-date table.
pub struct WeightEngine<'a> {
    weights: &'a WeightByDateTable,
    source: &'a ExternalSeries,
    date_max: i64,
}

impl<'a> WeightEngine<'a> {
    /// `date_max` closes the interval opened by each target's last weight date (exclusive).
    pub fn new(weights: &'a WeightByDateTable, source: &'a ExternalSeries, date_max: i64) -> Self {
        Self { weights, source, date_max }
    }

    /// Weight every target place. Missing or incomplete source data is reported, never fatal.
    pub fn run(&self) -> WeightedDatabase {
        log::info!("weighting {} attributes for {} places", self.source.attributes().count(), self.weights.len());

        let targets = self.weights.iter().collect::<Vec<_>>();
        let outcomes = targets.into_par_iter()
            .map(|(target, dated)| (target.clone(), self.weight_place(target, dated)))
            .collect::<Vec<_>>();

        let mut database = WeightedDatabase::default();
        for (target, outcome) in outcomes {
            database.series.insert(target, outcome.series);
            database.non_common.extend(outcome.non_common);
            database.warnings.extend(outcome.warnings);
        }
        database
    }

    fn weight_place(&self, target: &PlaceKey, dated: &DatedWeights) -> PlaceOutcome {
        if let Some(series) = self.identity(target, dated) {
            return PlaceOutcome { series: series.clone(), ..Default::default() };
        }

        let mut outcome = PlaceOutcome::default();
        let dates = dated.keys().copied().collect::<Vec<_>>();
        for (idx, (&start, weights)) in dated.iter().enumerate() {
            let end = dates.get(idx + 1).copied().unwrap_or(self.date_max);
            if start >= end {
                log::debug!("{target}: empty interval [{start}, {end})");
                continue;
            }

            match weights.first_key_value() {
                Some((predecessor, &weight)) if weights.len() == 1 => {
                    self.weight_single(&mut outcome, target, predecessor, weight, start, end)
                }
                _ => self.weight_multiple(&mut outcome, target, weights, start, end),
            }
        }
        outcome
    }

    /// A target that has never changed, and is its own sole predecessor, keeps its data as is.
    fn identity(&self, target: &PlaceKey, dated: &DatedWeights) -> Option<&'a PlaceSeries> {
        let (_, weights) = dated.iter().next().filter(|_| dated.len() == 1)?;
        let is_self = weights.len() == 1 && weights.get(target) == Some(&100.0);
        if is_self { self.source.find(target) } else { None }
    }

    fn weight_single(
        &self,
        outcome: &mut PlaceOutcome,
        target: &PlaceKey,
        predecessor: &PlaceKey,
        weight: f64,
        start: i64,
        end: i64,
    ) {
        let Some(series) = self.source.find(predecessor) else {
            outcome.warn(DataQualityWarning::MissingPlace { target: target.clone(), predecessor: predecessor.clone() });
            return;
        };

        for (attribute, values) in series {
            for (&date, value) in values.range(start..end) {
                outcome.insert(attribute, date, value.weighted(weight));
            }
        }
    }

    /// Sum the weighted values of several predecessors, on the dates all of them have data for.
    fn weight_multiple(
        &self,
        outcome: &mut PlaceOutcome,
        target: &PlaceKey,
        weights: &BTreeMap<PlaceKey, f64>,
        start: i64,
        end: i64,
    ) {
        let found = weights.iter()
            .filter_map(|(predecessor, &weight)| self.source.find(predecessor).map(|series| (weight, series)))
            .collect::<Vec<_>>();
        if found.len() != weights.len() {
            outcome.warn(DataQualityWarning::IncompletePredecessors {
                target: target.clone(),
                found: found.len(),
                expected: weights.len(),
            });
            return;
        }

        for attribute in self.source.attributes() {
            let mut counts = BTreeMap::<i64, usize>::new();
            for (_, series) in &found {
                let Some(values) = series.get(attribute) else { continue };
                for (&date, _) in values.range(start..end) {
                    *counts.entry(date).or_default() += 1;
                }
            }

            let (common, non_common): (BTreeMap<_, _>, BTreeMap<_, _>) =
                counts.into_iter().partition(|&(_, count)| count == found.len());

            if !non_common.is_empty() {
                outcome.warn(DataQualityWarning::NonCommonDates { target: target.clone(), attribute: attribute.to_string() });
                outcome.non_common.push(NonCommonDates {
                    target: target.clone(),
                    attribute: attribute.to_string(),
                    predecessors: weights.keys().cloned().collect(),
                    expected: found.len(),
                    counts: non_common,
                });
            }

            for date in common.into_keys() {
                let sum = found.iter()
                    .map(|(weight, series)| series[attribute][&date].weighted(*weight).as_number())
                    .sum::<Option<f64>>();
                outcome.insert(attribute, date, sum.map_or_else(AttributeValue::na, AttributeValue::Number));
            }
        }
    }
}
