use std::{collections::BTreeMap, path::Path, sync::LazyLock};

use anyhow::{Context, Result};
use polars::frame::DataFrame;
use regex::Regex;

use crate::{common, config::WeightConfig, error::ConfigError};

static DATE_PARTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[/.\-]").expect("valid regex"));

/// Separator between several dates recorded in one change-log cell.
const DATE_LIST_SEPARATOR: char = ';';

/// One dated boundary change of one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChangeEvent<'a> {
    pub place_gid: &'a str,
    /// Normalized `yyyymmdd`.
    pub date: i64,
}

/// All change dates of a change log, grouped by place gid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeLog {
    dates: BTreeMap<String, Vec<i64>>,
}

impl ChangeLog {
    /// Record a change of `gid` at a normalized `yyyymmdd` date.
    pub fn push(&mut self, gid: &str, date: i64) {
        let dates = self.dates.entry(gid.to_string()).or_default();
        if let Err(pos) = dates.binary_search(&date) {
            dates.insert(pos, date);
        }
    }

    /// Reads a change log CSV laid out as `config` describes.
    pub fn from_csv(path: &Path, config: &WeightConfig) -> Result<Self> {
        let df = common::read_csv_strings(path)?;
        Self::from_frame(&df, config)
            .with_context(|| format!("Error reading change dates from {}", path.display()))
    }

    /// Collect the change dates of a text-typed frame.
    ///
    /// The gid sits in column `config.gid_column`; every column whose header contains
    /// `config.change_marker` holds dates (several per cell separated by `;`), with
    /// `config.blank_marker` or empty cells meaning no change.
    pub fn from_frame(df: &DataFrame, config: &WeightConfig) -> Result<Self> {
        let columns = df.get_columns();
        let gids = columns.get(config.gid_column)
            .ok_or(ConfigError::MissingColumn { column: config.gid_column, available: columns.len() })?
            .str()?;

        let date_columns = columns.iter()
            .filter(|column| column.name().contains(config.change_marker.as_str()))
            .map(|column| column.str())
            .collect::<Result<Vec<_>, _>>()?;
        if date_columns.is_empty() {
            log::warn!("no column header contains {:?}; the change log is empty", config.change_marker);
        }

        let mut log = Self::default();
        for row in 0..df.height() {
            let Some(gid) = gids.get(row).map(str::trim).filter(|gid| !gid.is_empty()) else { continue };
            for column in &date_columns {
                let Some(cell) = column.get(row) else { continue };
                for raw in cell.split(DATE_LIST_SEPARATOR).map(str::trim) {
                    if raw.is_empty() || raw == config.blank_marker { continue }
                    log.push(gid, normalize_date(raw)?);
                }
            }
        }

        log::debug!("read {} change dates for {} places", log.len(), log.dates.len());
        Ok(log)
    }

    /// Sorted, de-duplicated change dates recorded against `gid`.
    pub fn dates_for(&self, gid: &str) -> &[i64] {
        self.dates.get(gid).map_or(&[], Vec::as_slice)
    }

    /// Every event in gid then date order.
    pub fn events(&self) -> impl Iterator<Item = ChangeEvent<'_>> {
        self.dates.iter().flat_map(|(gid, dates)| {
            dates.iter().map(move |&date| ChangeEvent { place_gid: gid, date })
        })
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize { self.dates.values().map(Vec::len).sum() }

    #[inline] pub fn is_empty(&self) -> bool { self.dates.is_empty() }
}

impl<'a> FromIterator<ChangeEvent<'a>> for ChangeLog {
    fn from_iter<I: IntoIterator<Item = ChangeEvent<'a>>>(iter: I) -> Self {
        let mut log = Self::default();
        for event in iter {
            log.push(event.place_gid, event.date);
        }
        log
    }
}

/// Normalize a day-month-year date (`dd/mm/yyyy`, `-` or `.` also accepted) to a `yyyymmdd`
/// integer. Dates already led by a 4-digit year, and bare 8-digit `yyyymmdd`, are accepted as is.
pub fn normalize_date(raw: &str) -> Result<i64, ConfigError> {
    let invalid = || ConfigError::InvalidDate(raw.to_string());
    let raw = raw.trim();

    let parts = DATE_PARTS.split(raw).collect::<Vec<_>>();
    let (year, month, day) = match parts.as_slice() {
        [whole] if whole.len() == 8 && whole.bytes().all(|b| b.is_ascii_digit()) => (&whole[..4], &whole[4..6], &whole[6..]),
        [year, month, day] if year.len() == 4 => (*year, *month, *day),
        [day, month, year] => (*year, *month, *day),
        _ => return Err(invalid()),
    };

    let number = |s: &str| s.parse::<u32>().map_err(|_| invalid());
    let (year, month, day) = (number(year)?, number(month)?, number(day)?);
    if year < 1000 || year > 9999 || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(invalid());
    }
    Ok(year as i64 * 10_000 + month as i64 * 100 + day as i64)
}

#[cfg(test)]
mod tests {
    use polars::prelude::Column;

    use super::*;

    fn frame(columns: &[(&str, &[&str])]) -> DataFrame {
        DataFrame::new(columns.iter()
            .map(|(name, values)| Column::new((*name).into(), values.to_vec()))
            .collect()).unwrap()
    }

    #[test]
    fn dates_are_normalized_to_year_month_day() {
        assert_eq!(normalize_date("01/04/1934"), Ok(19340401));
        assert_eq!(normalize_date("1-6-1938"), Ok(19380601));
        assert_eq!(normalize_date("15.10.1956"), Ok(19561015));
        assert_eq!(normalize_date("1956-10-15"), Ok(19561015));
        assert_eq!(normalize_date("19561015"), Ok(19561015));
    }

    #[test]
    fn malformed_dates_are_rejected() {
        for raw in ["", "1934", "32/01/1934", "01/13/1934", "01/04/34", "aa/bb/cccc", "123é567", "1934-04-0x"] {
            assert_eq!(normalize_date(raw), Err(ConfigError::InvalidDate(raw.to_string())), "{raw}");
        }
    }

    #[test]
    fn reads_marked_columns_only() {
        let df = frame(&[
            ("GID", &["1", "2", "3"]),
            ("Name", &["Otley", "Bradford", "Ilkley"]),
            ("Changes 1", &["01/04/1934", "-", "-"]),
            ("Changes 2", &["01/06/1938;01/01/1956", "", "-"]),
            ("Notes", &["12/12/1999", "12/12/1999", "12/12/1999"]),
        ]);
        let log = ChangeLog::from_frame(&df, &WeightConfig::default()).unwrap();

        assert_eq!(log.dates_for("1"), &[19340401, 19380601, 19560101]);
        assert_eq!(log.dates_for("2"), &[] as &[i64]);
        assert_eq!(log.len(), 3);
        assert_eq!(log.events().next(), Some(ChangeEvent { place_gid: "1", date: 19340401 }));
    }

    #[test]
    fn bad_cell_fails_the_load() {
        let df = frame(&[("GID", &["1"]), ("Changes", &["sometime in 1934"])]);
        let err = ChangeLog::from_frame(&df, &WeightConfig::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::InvalidDate(_))));
    }

    #[test]
    fn reads_csv_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Weight_Dates.csv");
        std::fs::write(&path, "GID,Name,Changes\n1,Otley,01/04/1934\n2,Bradford,-\n").unwrap();

        let log = ChangeLog::from_csv(&path, &WeightConfig::default()).unwrap();
        assert_eq!(log.dates_for("1"), &[19340401]);
        assert!(log.dates_for("2").is_empty());
    }

    #[test]
    fn duplicate_events_collapse() {
        let log = [
            ChangeEvent { place_gid: "1", date: 19380601 },
            ChangeEvent { place_gid: "1", date: 19340401 },
            ChangeEvent { place_gid: "1", date: 19380601 },
        ].into_iter().collect::<ChangeLog>();
        assert_eq!(log.dates_for("1"), &[19340401, 19380601]);
    }
}
