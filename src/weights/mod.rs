mod construct;
mod resolver;
mod table;

pub use construct::{Construction, WeightConstructor};
pub use resolver::{FragmentResolver, MassResolver, Resolution};
pub use table::{BaseWeightTable, ExpectedChanges, OverlapRecord, RevisionRows};
