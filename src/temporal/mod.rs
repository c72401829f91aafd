mod assign;
mod change_log;

pub use assign::{DateAssigner, DatedWeights, WeightByDateTable, observed_dates};
pub use change_log::{ChangeEvent, ChangeLog, normalize_date};
