use std::{collections::{BTreeMap, BTreeSet}, path::Path};

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::{
    config::WeightConfig,
    error::{ConfigError, WeightError},
    geom::intersection_area,
    place::{Place, PlaceKey, Revision, SubUnitLayer},
};
use super::{BaseWeightTable, FragmentResolver, MassResolver, OverlapRecord, RevisionRows};

/// Result of a construction pass: the table of every place that succeeded,
/// and the error of every place that didn't.
#[derive(Debug, Clone, Default)]
pub struct Construction {
    pub table: BaseWeightTable,
    pub failures: BTreeMap<PlaceKey, WeightError>,
}

/// Builds the base weight table: for every place of the base revision, the overlap with
/// every place of every revision (the base included), by area and optionally by population.
pub struct WeightConstructor<R = FragmentResolver> {
    revisions: Vec<Revision>,
    base: usize,
    sub_units: Option<SubUnitLayer>,
    cut_off: f64,
    resolver: R,
}

impl WeightConstructor {
    /// Validate the revision set. `base` names the base revision by label or file stem.
    pub fn new(revisions: Vec<Revision>, base: &str, cut_off: f64) -> Result<Self, ConfigError> {
        if revisions.len() < 2 {
            return Err(ConfigError::TooFewRevisions(revisions.len()));
        }
        let base_idx = revisions.iter()
            .position(|revision| revision.is_named(base))
            .ok_or_else(|| ConfigError::MissingBaseRevision {
                base: base.to_string(),
                found: revisions.iter().map(|revision| revision.label().to_string()).collect(),
            })?;

        let mut years = BTreeMap::<&str, Vec<String>>::new();
        for revision in &revisions {
            years.entry(revision.year()).or_default().push(revision.label().to_string());
        }
        if let Some((year, labels)) = years.into_iter().find(|(_, labels)| labels.len() > 1) {
            return Err(ConfigError::DuplicateRevisionYear { year: year.to_string(), labels });
        }

        for revision in &revisions {
            let mut seen = BTreeSet::new();
            if let Some(place) = revision.places().iter().map(Place::key).find(|key| !seen.insert(key.clone())) {
                return Err(ConfigError::DuplicatePlace { place, revision: revision.label().to_string() });
            }
        }

        Ok(Self {
            revisions,
            base: base_idx,
            sub_units: None,
            cut_off,
            resolver: FragmentResolver::new(cut_off),
        })
    }

    /// Load every revision in `dir`, and the sub-unit file if given, according to `config`.
    pub fn from_config(dir: &Path, sub_units: Option<&Path>, config: &WeightConfig) -> Result<Self> {
        // Validate before any expensive load.
        if sub_units.is_some() && config.weight_column.is_none() {
            return Err(ConfigError::MissingWeightColumn.into());
        }

        let revisions = Revision::discover(dir, &config.boundary_layout())?;
        log::info!("loaded {} boundary revisions from {}", revisions.len(), dir.display());
        let constructor = Self::new(revisions, &config.base_revision, config.cut_off)?;

        match sub_units {
            Some(path) => {
                let revision = Revision::from_shapefile(path, &config.sub_unit_layout())
                    .with_context(|| format!("Failed to load sub-units from {}", path.display()))?;
                Ok(constructor.with_sub_units(SubUnitLayer::from_revision(&revision)?))
            }
            None => Ok(constructor),
        }
    }
}

impl<R: MassResolver> WeightConstructor<R> {
    /// Weight overlaps by the sub-unit population beneath them, as well as by area.
    pub fn with_sub_units(mut self, sub_units: SubUnitLayer) -> Self {
        self.sub_units = Some(sub_units);
        self
    }

    /// Swap the sub-unit resolver.
    pub fn with_resolver<S: MassResolver>(self, resolver: S) -> WeightConstructor<S> {
        WeightConstructor {
            revisions: self.revisions,
            base: self.base,
            sub_units: self.sub_units,
            cut_off: self.cut_off,
            resolver,
        }
    }

    #[inline] pub fn base(&self) -> &Revision { &self.revisions[self.base] }

    #[inline] pub fn revisions(&self) -> &[Revision] { &self.revisions }

    /// Compute the weight table. Places are processed in parallel; a place whose population
    /// weight cannot be resolved is reported in `failures` without affecting the others.
    pub fn construct(&self) -> Construction {
        let base = self.base();
        log::info!(
            "constructing weights for {} places of {} against {} revisions",
            base.places().len(), base.label(), self.revisions.len(),
        );

        let results = base.places().par_iter()
            .map(|place| (place.key(), self.place_rows(place)))
            .collect::<Vec<_>>();

        let mut construction = Construction::default();
        for (key, result) in results {
            match result {
                Ok(rows) => construction.table.insert(key, rows),
                Err(err) => {
                    log::error!("failed to weight {key}: {err}");
                    construction.failures.insert(key, err);
                }
            }
        }
        construction
    }

    /// Overlaps of one base place with every revision.
    fn place_rows(&self, place: &Place) -> Result<RevisionRows, WeightError> {
        log::debug!("weighting {}", place.key());
        self.revisions.iter()
            .map(|revision| Ok((revision.year().to_string(), self.revision_row(place, revision)?)))
            .collect()
    }

    /// Overlaps of one base place with the places of one revision, above the cut-off.
    fn revision_row(&self, place: &Place, revision: &Revision) -> Result<BTreeMap<PlaceKey, OverlapRecord>, WeightError> {
        let geoms = revision.geoms();
        let mut row = BTreeMap::new();

        for idx in geoms.candidates(&place.geometry) {
            let other = &revision.places()[idx];
            let overlap = intersection_area(&place.geometry, &other.geometry);
            if overlap <= self.cut_off { continue }

            let area = overlap / geoms.area(idx) * 100.0;
            let population = match &self.sub_units {
                None => None,
                Some(_) if area == 100.0 => Some(100.0),
                Some(sub_units) => Some(
                    self.resolver
                        .population_percentage(sub_units, &other.geometry, &place.geometry)
                        .ok_or_else(|| WeightError::ZeroSubUnitMass { place: place.key(), overlap: other.key() })?,
                ),
            };

            row.insert(other.key(), OverlapRecord { area, population });
        }

        Ok(row)
    }
}
