use geo::{MultiPolygon, Polygon};

use crate::{
    geom::{decompose, intersection_area, punch_holes, split_by_boundary},
    place::{Fragment, FragmentSet, PlaceSource},
};

/// Sub-unit mass found under a target polygon, plus the fragments that carry it.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub mass: f64,
    pub fragments: Vec<Fragment>,
}

/// Attributes sub-unit weight mass to a target polygon.
pub trait MassResolver: Sync {
    /// Find the weighted fragments of `source` lying within `target`.
    fn resolve(&self, source: &dyn PlaceSource, target: &MultiPolygon<f64>) -> Resolution;

    /// Percentage of the sub-unit mass under `matched` that also lies under `base`, clamped to 100.
    /// Returns `None` if no sub-unit mass lies under `matched` at all.
    fn population_percentage(
        &self,
        sub_units: &dyn PlaceSource,
        matched: &MultiPolygon<f64>,
        base: &MultiPolygon<f64>,
    ) -> Option<f64> {
        let matched = self.resolve(sub_units, matched);
        if matched.mass <= 0.0 { return None }

        let within_base = self.resolve(&FragmentSet::new(&matched.fragments), base);
        Some((within_base.mass / matched.mass * 100.0).min(100.0))
    }
}

/// Resolves mass by cutting sub-unit polygons along the target's boundary and holes,
/// then prorating each sub-unit's weight by the area of the pieces kept.
#[derive(Debug, Clone, Copy)]
pub struct FragmentResolver {
    cut_off: f64,
}

impl FragmentResolver {
    pub fn new(cut_off: f64) -> Self { Self { cut_off } }

    /// Pieces of sub-unit `idx` lying within the single-part polygon `part`.
    fn fragments_within(&self, source: &dyn PlaceSource, idx: usize, part: &Polygon<f64>) -> Vec<Fragment> {
        let weight = source.weight_at(idx);
        let area = source.area_at(idx);

        decompose(&source.geometries()[idx]).iter()
            .filter(|sub| intersection_area(part, *sub) > self.cut_off)
            .flat_map(|sub| split_by_boundary(sub, part))
            .filter(|piece| intersection_area(part, piece) > self.cut_off)
            .flat_map(|piece| {
                if part.interiors().is_empty() { vec![piece] } else { punch_holes(part, piece, self.cut_off) }
            })
            .map(|piece| Fragment::new(piece, idx).prorated(weight, area))
            .collect()
    }
}

impl MassResolver for FragmentResolver {
    fn resolve(&self, source: &dyn PlaceSource, target: &MultiPolygon<f64>) -> Resolution {
        let geometries = source.geometries();
        let under = source.candidates(target).into_iter()
            .filter(|&idx| intersection_area(target, &geometries[idx]) > self.cut_off)
            .collect::<Vec<_>>();

        let fragments = decompose(target).iter()
            .flat_map(|part| under.iter().flat_map(move |&idx| self.fragments_within(source, idx, part)))
            .collect::<Vec<_>>();

        Resolution {
            mass: fragments.iter().filter_map(|f| f.weight).sum(),
            fragments,
        }
    }
}

#[cfg(test)]
mod tests {
    use geo::{Area, LineString, Rect, coord};

    use super::*;
    use crate::place::SubUnitLayer;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }).to_polygon()
    }

    fn ring(x0: f64, y0: f64, x1: f64, y1: f64) -> LineString<f64> {
        rect(x0, y0, x1, y1).exterior().clone()
    }

    /// Four 5x5 wards tiling a 10x10 square, populations 100, 200, 300, 400.
    fn wards() -> SubUnitLayer {
        SubUnitLayer::new(
            vec![
                rect(0.0, 0.0, 5.0, 5.0).into(),
                rect(5.0, 0.0, 10.0, 5.0).into(),
                rect(0.0, 5.0, 5.0, 10.0).into(),
                rect(5.0, 5.0, 10.0, 10.0).into(),
            ],
            vec![100.0, 200.0, 300.0, 400.0],
        )
    }

    #[test]
    fn whole_sub_units_carry_full_weight() {
        let resolution = FragmentResolver::new(0.0).resolve(&wards(), &rect(0.0, 0.0, 10.0, 10.0).into());
        assert!((resolution.mass - 1000.0).abs() < 1e-9);
        assert_eq!(resolution.fragments.len(), 4);
    }

    #[test]
    fn straddling_sub_units_are_prorated() {
        // Left half: all of wards 0 and 2.
        let left = FragmentResolver::new(0.0).resolve(&wards(), &rect(0.0, 0.0, 5.0, 10.0).into());
        assert!((left.mass - 400.0).abs() < 1e-9);

        // A strip through the middle: half of every ward.
        let strip = FragmentResolver::new(0.0).resolve(&wards(), &rect(2.5, 0.0, 7.5, 10.0).into());
        assert!((strip.mass - 500.0).abs() < 1e-9);
        assert!(strip.fragments.iter().all(|f| f.polygon.unsigned_area() <= 12.5 + 1e-9));
    }

    #[test]
    fn cut_off_drops_slivers() {
        // Overlaps ward 1 and 3 by 0.5 x 5 = 2.5 each.
        let target: MultiPolygon<f64> = rect(0.0, 0.0, 5.5, 10.0).into();
        let with_slivers = FragmentResolver::new(0.0).resolve(&wards(), &target);
        let without = FragmentResolver::new(3.0).resolve(&wards(), &target);
        assert!((with_slivers.mass - 460.0).abs() < 1e-9);
        assert!((without.mass - 400.0).abs() < 1e-9);
    }

    #[test]
    fn holes_remove_their_share() {
        // Hole covers the whole of ward 3.
        let target: MultiPolygon<f64> = Polygon::new(ring(0.0, 0.0, 10.0, 10.0), vec![ring(5.0, 5.0, 10.0, 10.0)]).into();
        let resolution = FragmentResolver::new(0.0).resolve(&wards(), &target);
        assert!((resolution.mass - 600.0).abs() < 1e-9);

        // Hole covers half of ward 0.
        let target: MultiPolygon<f64> = Polygon::new(ring(-1.0, -1.0, 11.0, 11.0), vec![ring(0.0, 0.0, 2.5, 5.0)]).into();
        let resolution = FragmentResolver::new(0.0).resolve(&wards(), &target);
        assert!((resolution.mass - 950.0).abs() < 1e-9);
    }

    #[test]
    fn slivers_left_by_holes_are_dropped() {
        let layer = SubUnitLayer::new(vec![rect(9.5, 40.0, 95.0, 60.0).into()], vec![1710.0]);
        let target: MultiPolygon<f64> = Polygon::new(ring(0.0, 0.0, 100.0, 100.0), vec![ring(10.0, 10.0, 90.0, 90.0)]).into();

        // The hole splits the sub-unit into a 10-unit sliver and a 100-unit remainder.
        let resolution = FragmentResolver::new(20.0).resolve(&layer, &target);
        assert_eq!(resolution.fragments.len(), 1);
        assert!((resolution.mass - 100.0).abs() < 1e-9);

        let with_sliver = FragmentResolver::new(0.0).resolve(&layer, &target);
        assert!((with_sliver.mass - 110.0).abs() < 1e-9);
    }

    #[test]
    fn multi_part_targets_sum_their_parts() {
        let target = MultiPolygon(vec![rect(0.0, 0.0, 5.0, 5.0), rect(5.0, 5.0, 10.0, 10.0)]);
        let resolution = FragmentResolver::new(0.0).resolve(&wards(), &target);
        assert!((resolution.mass - 500.0).abs() < 1e-9);
    }

    #[test]
    fn population_percentage_of_partial_overlap() {
        let resolver = FragmentResolver::new(0.0);
        let matched: MultiPolygon<f64> = rect(0.0, 0.0, 10.0, 5.0).into(); // wards 0, 1: 300
        let base: MultiPolygon<f64> = rect(0.0, 0.0, 5.0, 10.0).into();    // covers ward 0: 100

        let pct = resolver.population_percentage(&wards(), &matched, &base).unwrap();
        assert!((pct - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn population_percentage_never_exceeds_100() {
        let resolver = FragmentResolver::new(0.0);
        let matched: MultiPolygon<f64> = rect(0.0, 0.0, 10.0, 10.0).into();
        let base: MultiPolygon<f64> = rect(-1.0, -1.0, 11.0, 11.0).into();
        let pct = resolver.population_percentage(&wards(), &matched, &base).unwrap();
        assert!(pct <= 100.0);
        assert!((pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn no_sub_units_under_match_is_distinct_from_zero() {
        let resolver = FragmentResolver::new(0.0);
        let far: MultiPolygon<f64> = rect(50.0, 50.0, 60.0, 60.0).into();
        assert_eq!(resolver.population_percentage(&wards(), &far, &far), None);

        // Mass exists under the match but none under the base: a genuine 0%.
        let matched: MultiPolygon<f64> = rect(0.0, 0.0, 5.0, 5.0).into();
        assert_eq!(resolver.population_percentage(&wards(), &matched, &far), Some(0.0));
    }
}
