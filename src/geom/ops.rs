//! Hole-aware clipping primitives.
//!
//! None of these fail on degenerate input: zero-area or self-touching geometry simply
//! yields zero area or no pieces, and callers filter against a cut-off area.

use geo::{Area, BooleanOps, MultiPolygon, Polygon};

/// Split a (possibly multi-part) polygon into its single-part polygons.
pub fn decompose(shape: &MultiPolygon<f64>) -> Vec<Polygon<f64>> {
    shape.0.clone()
}

/// Area of the intersection of two polygonal shapes, or 0 if they don't meet.
pub fn intersection_area(a: &impl BooleanOps<Scalar = f64>, b: &impl BooleanOps<Scalar = f64>) -> f64 {
    let area = a.intersection(b).unsigned_area();
    if area.is_finite() { area } else { 0.0 }
}

/// Split `target` along the exterior ring of `divider`.
///
/// Returns the pieces of `target` inside the ring followed by the pieces outside it.
/// Holes of `divider` are ignored; see [`punch_holes`].
pub fn split_by_boundary(target: &Polygon<f64>, divider: &Polygon<f64>) -> Vec<Polygon<f64>> {
    let shell = Polygon::new(divider.exterior().clone(), Vec::new());

    target.intersection(&shell).0.into_iter()
        .chain(target.difference(&shell).0)
        .filter(|piece| piece.unsigned_area() > 0.0)
        .collect()
}

/// Remove the holes of `outer` from `fragment`.
///
/// Only holes overlapping `fragment` by more than `cut_off` are applied. The fragment is
/// split along each such hole and every resulting piece that still overlaps `outer` by
/// more than `cut_off` is kept. With no meaningful hole, `[fragment]` is returned as-is.
pub fn punch_holes(outer: &Polygon<f64>, fragment: Polygon<f64>, cut_off: f64) -> Vec<Polygon<f64>> {
    let holes = outer.interiors().iter()
        .map(|ring| Polygon::new(ring.clone(), Vec::new()))
        .filter(|hole| intersection_area(hole, &fragment) > cut_off)
        .collect::<Vec<_>>();

    if holes.is_empty() { return vec![fragment] }

    let mut pieces = vec![fragment];
    for hole in &holes {
        pieces = pieces.iter()
            .flat_map(|piece| split_by_boundary(piece, hole))
            .collect();
    }

    pieces.retain(|piece| intersection_area(outer, piece) > cut_off);
    pieces
}
