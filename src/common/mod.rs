mod data;
mod fs;
mod polygon;

pub(crate) use data::*;
pub(crate) use fs::*;

pub use data::{read_json, write_json_atomic};
pub use fs::{find_shapefiles, revision_year};
