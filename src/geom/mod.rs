mod bbox;
mod geom;
mod ops;

pub use geom::Geometries;
pub use ops::{decompose, intersection_area, punch_holes, split_by_boundary};
