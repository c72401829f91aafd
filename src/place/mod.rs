mod place;
mod revision;
mod source;

pub use place::{Place, PlaceKey, RecordLayout};
pub use revision::Revision;
pub use source::{Fragment, FragmentSet, PlaceSource, SubUnitLayer};
