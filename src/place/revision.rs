use std::{ffi::OsStr, path::Path};

use anyhow::{Context, Result};

use crate::{common, error::ConfigError, geom::Geometries};
use super::{Place, RecordLayout};

/// All places of one boundary snapshot, indexed for overlap search.
#[derive(Debug, Clone)]
pub struct Revision {
    label: String,
    year: String,
    places: Vec<Place>,
    geoms: Geometries,
}

impl Revision {
    /// Build a revision from already-loaded places. The year is the label stripped of non-digits.
    pub fn new(label: &str, places: Vec<Place>) -> Result<Self, ConfigError> {
        let year = common::revision_year(label)?;
        let geoms = Geometries::new(places.iter().map(|place| place.geometry.clone()).collect());
        Ok(Self { label: label.to_string(), year, places, geoms })
    }

    /// Loads a revision from a `.shp` file; the label is the file name.
    pub fn from_shapefile(path: &Path, layout: &RecordLayout) -> Result<Self> {
        let label = path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .with_context(|| format!("Shapefile path has no file name: {}", path.display()))?;

        let places = common::read_shapefile(path)?
            .into_iter()
            .map(|(geometry, values)| layout.place(geometry, &values))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Error reading places from {}", path.display()))?;

        Ok(Self::new(&label, places)?)
    }

    /// Loads every `.shp` file in `dir`, sorted by file name.
    pub fn discover(dir: &Path, layout: &RecordLayout) -> Result<Vec<Self>> {
        common::find_shapefiles(dir)?
            .iter()
            .map(|path| Self::from_shapefile(path, layout))
            .collect()
    }

    #[inline] pub fn label(&self) -> &str { &self.label }

    /// Revision identifier used as the second level of the base weight table.
    #[inline] pub fn year(&self) -> &str { &self.year }

    #[inline] pub fn places(&self) -> &[Place] { &self.places }

    #[inline] pub fn geoms(&self) -> &Geometries { &self.geoms }

    /// True if `name` is this revision's label, or its label without extension.
    pub fn is_named(&self, name: &str) -> bool {
        self.label == name || Path::new(&self.label).file_stem().is_some_and(|stem| stem == OsStr::new(name))
    }
}

#[cfg(test)]
mod tests {
    use geo::MultiPolygon;

    use super::*;

    #[test]
    fn year_comes_from_label() {
        let revision = Revision::new("EW1951_lgdistricts.shp", vec![]).unwrap();
        assert_eq!(revision.year(), "1951");
        assert!(revision.is_named("EW1951_lgdistricts.shp"));
        assert!(revision.is_named("EW1951_lgdistricts"));
        assert!(!revision.is_named("1951"));
    }

    #[test]
    fn label_without_digits_is_rejected() {
        let places = vec![Place::new("1", "A", MultiPolygon(vec![]))];
        assert!(matches!(Revision::new("base.shp", places), Err(ConfigError::InvalidRevisionLabel(_))));
    }
}
