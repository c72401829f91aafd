mod engine;
mod series;
mod tabulate;

pub use engine::{NON_COMMON_DATES_FILE, NonCommonDates, WeightEngine, WeightedDatabase};
pub use series::{AttributeValue, ExternalSeries, NA, PlaceSeries};
pub use tabulate::{tabulate, write_tabulated};
