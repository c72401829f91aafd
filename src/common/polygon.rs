use anyhow::{Result, bail};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use shapefile::{self as shp, PolygonRing, Shape};

/// Convert a shapefile shape to geo::MultiPolygon<f64>. Null shapes become empty geometry.
pub(crate) fn shape_to_multipolygon(shape: Shape) -> Result<MultiPolygon<f64>> {
    match shape {
        Shape::Polygon(polygon) => Ok(shp_to_geo(&polygon)),
        Shape::NullShape => Ok(MultiPolygon(Vec::new())),
        other => bail!("found non-Polygon shape in boundary file: {:?}", other.shapetype()),
    }
}

/// Convert shapefile::Polygon to geo::MultiPolygon<f64>.
/// Shapefiles store each outer ring followed by the holes it owns.
pub(crate) fn shp_to_geo(polygon: &shp::Polygon) -> MultiPolygon<f64> {
    /// Close a ring so geo treats it as a LinearRing.
    fn closed_ring(points: &[shp::Point]) -> LineString<f64> {
        let mut coords = points.iter()
            .map(|pt| Coord { x: pt.x, y: pt.y })
            .collect::<Vec<_>>();
        if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
            if first != last { coords.push(first) }
        }
        LineString(coords)
    }

    let mut polys = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes = Vec::new();

    for ring in polygon.rings() {
        match ring {
            PolygonRing::Outer(points) => {
                if let Some(shell) = exterior.replace(closed_ring(points)) {
                    polys.push(Polygon::new(shell, std::mem::take(&mut holes)));
                }
            }
            PolygonRing::Inner(points) => {
                if exterior.is_some() {
                    holes.push(closed_ring(points));
                } else {
                    log::debug!("skipping hole ring with no preceding outer ring");
                }
            }
        }
    }
    if let Some(shell) = exterior {
        polys.push(Polygon::new(shell, holes));
    }

    MultiPolygon(polys)
}
