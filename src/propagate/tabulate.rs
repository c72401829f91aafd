use std::{collections::{BTreeMap, BTreeSet}, path::Path};

use anyhow::Result;
use polars::{frame::DataFrame, prelude::Column};

use crate::{common, place::PlaceKey};
use super::{PlaceSeries, series::NA};

/// Flatten weighted data into one row per place and date, with one column per requested
/// attribute. Every place gets a row for every date any place has data at; gaps read `"NA"`.
pub fn tabulate(series: &BTreeMap<PlaceKey, PlaceSeries>, attributes: &[&str]) -> Result<DataFrame> {
    let dates = series.values()
        .flat_map(|place| attributes.iter().filter_map(|attr| place.get(*attr)).flat_map(|values| values.keys().copied()))
        .collect::<BTreeSet<_>>();

    let rows = series.len() * dates.len();
    let mut gids = Vec::with_capacity(rows);
    let mut names = Vec::with_capacity(rows);
    let mut row_dates = Vec::with_capacity(rows);
    let mut values = vec![Vec::with_capacity(rows); attributes.len()];

    for (key, place) in series {
        for &date in &dates {
            gids.push(key.gid().to_string());
            names.push(key.name().to_string());
            row_dates.push(date);
            for (column, attr) in values.iter_mut().zip(attributes) {
                let value = place.get(*attr).and_then(|dated| dated.get(&date));
                column.push(value.map_or_else(|| NA.to_string(), ToString::to_string));
            }
        }
    }

    let mut columns = vec![
        Column::new("gid".into(), gids),
        Column::new("place".into(), names),
        Column::new("date".into(), row_dates),
    ];
    columns.extend(attributes.iter().zip(values).map(|(attr, column)| Column::new((*attr).into(), column)));
    Ok(DataFrame::new(columns)?)
}

/// Tabulate and write as CSV.
pub fn write_tabulated(series: &BTreeMap<PlaceKey, PlaceSeries>, attributes: &[&str], path: &Path) -> Result<()> {
    let mut df = tabulate(series, attributes)?;
    common::write_csv(&mut df, path)?;
    log::info!("written {} rows of {} attributes to {}", df.height(), attributes.len(), path.display());
    Ok(())
}
