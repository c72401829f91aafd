//! Error and warning types.
//!
//! Configuration errors abort a whole run. Weight errors abort a single place.
//! Data-quality warnings are collected into reports and never abort anything.

use crate::place::PlaceKey;

/// Fatal configuration problems, surfaced before any work is done.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("base revision {base:?} not found among revisions: {found:?}")]
    MissingBaseRevision { base: String, found: Vec<String> },
    #[error("found {0} revision(s), but at least two are required to weight")]
    TooFewRevisions(usize),
    #[error("revisions {labels:?} all resolve to year {year}")]
    DuplicateRevisionYear { year: String, labels: Vec<String> },
    #[error("place {place} appears more than once in revision {revision}")]
    DuplicatePlace { place: PlaceKey, revision: String },
    #[error("sub-unit weighting requested without the column index holding the weight")]
    MissingWeightColumn,
    #[error("attribute column {column} out of range ({available} columns available)")]
    MissingColumn { column: usize, available: usize },
    #[error("no {kind} weight recorded for {place} in revision {revision}")]
    MissingWeightKind { place: PlaceKey, revision: String, kind: &'static str },
    #[error("cannot derive a revision year from label {0:?}")]
    InvalidRevisionLabel(String),
    #[error("cannot normalize date {0:?} to yyyymmdd")]
    InvalidDate(String),
    #[error("place {0} is not present in the weight table")]
    UnknownPlace(PlaceKey),
}

/// Errors that stop the weighting of one place without affecting the others.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum WeightError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no sub-unit weight found under {overlap} while weighting {place}")]
    ZeroSubUnitMass { place: PlaceKey, overlap: PlaceKey },
}

/// Recoverable data problems found while propagating external data.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DataQualityWarning {
    #[error("no data found for {predecessor} (weighting {target})")]
    MissingPlace { target: PlaceKey, predecessor: PlaceKey },
    #[error("only found data for {found} of the expected {expected} places weighting {target}")]
    IncompletePredecessors { target: PlaceKey, found: usize, expected: usize },
    #[error("non-common dates found for {attribute} weighting {target}")]
    NonCommonDates { target: PlaceKey, attribute: String },
}
