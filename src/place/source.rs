use geo::{Area, MultiPolygon, Polygon};

use crate::{error::ConfigError, geom::Geometries};
use super::Revision;

/// Weighted polygons that sub-unit mass can be resolved from.
///
/// Implemented once for sub-unit files loaded from disk and once for fragments already
/// isolated by a previous resolution, so the resolver never inspects which one it has.
pub trait PlaceSource: Sync {
    /// Polygons in index order.
    fn geometries(&self) -> &[MultiPolygon<f64>];

    /// Weight carried by the polygon at `index`.
    fn weight_at(&self, index: usize) -> f64;

    /// Area of the polygon at `index`.
    fn area_at(&self, index: usize) -> f64 {
        self.geometries()[index].unsigned_area()
    }

    /// Indices worth testing against `target`. Defaults to every polygon.
    fn candidates(&self, _target: &MultiPolygon<f64>) -> Vec<usize> {
        (0..self.geometries().len()).collect()
    }
}

/// Sub-unit polygons (e.g. wards) with their population weights, loaded from file.
#[derive(Debug, Clone)]
pub struct SubUnitLayer {
    geoms: Geometries,
    weights: Vec<f64>,
}

impl SubUnitLayer {
    /// Take the weighted places of a revision loaded with a weight column.
    pub fn from_revision(revision: &Revision) -> Result<Self, ConfigError> {
        let weights = revision.places().iter()
            .map(|place| place.weight_value.ok_or(ConfigError::MissingWeightColumn))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { geoms: revision.geoms().clone(), weights })
    }

    pub fn new(shapes: Vec<MultiPolygon<f64>>, weights: Vec<f64>) -> Self {
        debug_assert_eq!(shapes.len(), weights.len(), "one weight per sub-unit");
        Self { geoms: Geometries::new(shapes), weights }
    }

    #[inline] pub fn len(&self) -> usize { self.weights.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.weights.is_empty() }

    /// Total weight of every sub-unit.
    pub fn total_weight(&self) -> f64 { self.weights.iter().sum() }
}

impl PlaceSource for SubUnitLayer {
    fn geometries(&self) -> &[MultiPolygon<f64>] { self.geoms.shapes() }

    fn weight_at(&self, index: usize) -> f64 { self.weights[index] }

    fn area_at(&self, index: usize) -> f64 { self.geoms.area(index) }

    fn candidates(&self, target: &MultiPolygon<f64>) -> Vec<usize> { self.geoms.candidates(target) }
}

/// A single-part piece of a sub-unit polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub polygon: Polygon<f64>,
    /// Index of the sub-unit (within its source) this piece was cut from.
    pub source: usize,
    /// Prorated weight, once assigned.
    pub weight: Option<f64>,
}

impl Fragment {
    pub fn new(polygon: Polygon<f64>, source: usize) -> Self {
        Self { polygon, source, weight: None }
    }

    /// Assign `source_weight` prorated by this piece's share of the source polygon area.
    pub fn prorated(mut self, source_weight: f64, source_area: f64) -> Self {
        let share = if source_area > 0.0 { self.polygon.unsigned_area() / source_area } else { 0.0 };
        self.weight = Some(source_weight * share);
        self
    }
}

/// Fragments from an earlier resolution, re-used as a weighted source.
#[derive(Debug, Clone)]
pub struct FragmentSet {
    shapes: Vec<MultiPolygon<f64>>,
    weights: Vec<f64>,
}

impl FragmentSet {
    /// Unweighted fragments count as zero weight.
    pub fn new(fragments: &[Fragment]) -> Self {
        Self {
            shapes: fragments.iter().map(|f| MultiPolygon(vec![f.polygon.clone()])).collect(),
            weights: fragments.iter().map(|f| f.weight.unwrap_or(0.0)).collect(),
        }
    }

    #[inline] pub fn len(&self) -> usize { self.weights.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.weights.is_empty() }
}

impl PlaceSource for FragmentSet {
    fn geometries(&self) -> &[MultiPolygon<f64>] { &self.shapes }

    fn weight_at(&self, index: usize) -> f64 { self.weights[index] }
}

#[cfg(test)]
mod tests {
    use geo::{Rect, coord};

    use super::*;
    use crate::place::Place;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }).to_polygon()
    }

    #[test]
    fn prorated_weight_follows_area_share() {
        let fragment = Fragment::new(rect(0.0, 0.0, 5.0, 10.0), 0).prorated(200.0, 100.0);
        assert_eq!(fragment.weight, Some(100.0));

        let degenerate = Fragment::new(rect(0.0, 0.0, 1.0, 1.0), 0).prorated(200.0, 0.0);
        assert_eq!(degenerate.weight, Some(0.0));
    }

    #[test]
    fn fragment_set_exposes_fragment_weights() {
        let set = FragmentSet::new(&[
            Fragment::new(rect(0.0, 0.0, 1.0, 1.0), 3).prorated(10.0, 2.0),
            Fragment::new(rect(1.0, 0.0, 2.0, 1.0), 3),
        ]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.weight_at(0), 5.0);
        assert_eq!(set.weight_at(1), 0.0);
        assert_eq!(set.candidates(&rect(0.0, 0.0, 1.0, 1.0).into()), vec![0, 1]);
    }

    #[test]
    fn sub_units_require_weights() {
        let weighted = Revision::new("1921.shp", vec![
            Place::new("1", "Ward", rect(0.0, 0.0, 1.0, 1.0).into()).with_weight(Some(10.0)),
        ]).unwrap();
        let layer = SubUnitLayer::from_revision(&weighted).unwrap();
        assert_eq!(layer.total_weight(), 10.0);

        let unweighted = Revision::new("1921.shp", vec![
            Place::new("1", "Ward", rect(0.0, 0.0, 1.0, 1.0).into()),
        ]).unwrap();
        assert_eq!(SubUnitLayer::from_revision(&unweighted).unwrap_err(), ConfigError::MissingWeightColumn);
    }
}
