#![doc = "geoweights public API"]
mod common;
mod config;
mod error;
mod geom;
mod place;
mod propagate;
mod temporal;
mod weights;

#[doc(inline)]
pub use config::{WeightConfig, WeightKind};

#[doc(inline)]
pub use error::{ConfigError, DataQualityWarning, WeightError};

#[doc(inline)]
pub use geom::{Geometries, decompose, intersection_area, punch_holes, split_by_boundary};

#[doc(inline)]
pub use place::{Fragment, FragmentSet, Place, PlaceKey, PlaceSource, RecordLayout, Revision, SubUnitLayer};

#[doc(inline)]
pub use weights::{
    BaseWeightTable, Construction, ExpectedChanges, FragmentResolver, MassResolver, OverlapRecord,
    Resolution, RevisionRows, WeightConstructor,
};

#[doc(inline)]
pub use temporal::{ChangeEvent, ChangeLog, DateAssigner, DatedWeights, WeightByDateTable, normalize_date, observed_dates};

#[doc(inline)]
pub use propagate::{
    AttributeValue, ExternalSeries, NA, NON_COMMON_DATES_FILE, NonCommonDates, PlaceSeries, WeightEngine,
    WeightedDatabase, tabulate, write_tabulated,
};

#[doc(inline)]
pub use common::{find_shapefiles, read_json, revision_year, write_json_atomic};
