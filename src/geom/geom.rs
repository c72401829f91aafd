use geo::{Area, BoundingRect, MultiPolygon};
use rstar::RTree;

use super::bbox::{BoundingBox, envelope};

/// Geometries is an immutable collection of MultiPolygons with an R-tree over their bounds.
#[derive(Debug, Clone)]
pub struct Geometries {
    shapes: Vec<MultiPolygon<f64>>,
    areas: Vec<f64>,
    rtree: RTree<BoundingBox>,
}

impl Geometries {
    /// Construct a Geometries object from a vector of MultiPolygons.
    /// Empty shapes are kept (so indices line up) but never returned as candidates.
    pub fn new(shapes: Vec<MultiPolygon<f64>>) -> Self {
        Self {
            rtree: RTree::bulk_load(
                shapes.iter().enumerate()
                    .filter_map(|(i, shape)| shape.bounding_rect().map(|rect| BoundingBox::new(i, rect)))
                    .collect()
            ),
            areas: shapes.iter().map(|shape| shape.unsigned_area()).collect(),
            shapes,
        }
    }

    /// Get the number of MultiPolygons.
    #[inline] pub fn len(&self) -> usize { self.shapes.len() }

    /// Check if there are no MultiPolygons.
    #[inline] pub fn is_empty(&self) -> bool { self.shapes.is_empty() }

    /// Get a reference to the list of MultiPolygons.
    #[inline] pub fn shapes(&self) -> &[MultiPolygon<f64>] { &self.shapes }

    /// Area of the MultiPolygon at `idx`, cached at construction.
    #[inline] pub fn area(&self, idx: usize) -> f64 { self.areas[idx] }

    /// Indices of shapes whose bounding box meets the bounding box of `shape`, in ascending order.
    pub fn candidates(&self, shape: &MultiPolygon<f64>) -> Vec<usize> {
        let Some(rect) = shape.bounding_rect() else { return Vec::new() };
        let mut found = self.rtree
            .locate_in_envelope_intersecting(&envelope(&rect))
            .map(|bb| bb.idx())
            .collect::<Vec<_>>();
        found.sort_unstable();
        found
    }
}

#[cfg(test)]
mod tests {
    use geo::{Rect, coord};

    use super::*;

    fn square(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
        Rect::new(coord! { x: x, y: y }, coord! { x: x + size, y: y + size }).to_polygon().into()
    }

    #[test]
    fn candidates_are_pruned_by_bounds() {
        let geoms = Geometries::new(vec![square(0.0, 0.0, 1.0), square(5.0, 5.0, 1.0), square(0.5, 0.5, 1.0)]);
        assert_eq!(geoms.candidates(&square(0.2, 0.2, 0.1)), vec![0]);
        assert_eq!(geoms.candidates(&square(0.6, 0.6, 0.1)), vec![0, 2]);
        assert!(geoms.candidates(&square(10.0, 10.0, 1.0)).is_empty());
    }

    #[test]
    fn empty_shapes_keep_their_index() {
        let geoms = Geometries::new(vec![MultiPolygon(Vec::new()), square(0.0, 0.0, 2.0)]);
        assert_eq!(geoms.len(), 2);
        assert_eq!(geoms.area(0), 0.0);
        assert_eq!(geoms.area(1), 4.0);
        assert_eq!(geoms.candidates(&square(0.0, 0.0, 1.0)), vec![1]);
    }
}
