//! Biome classification from NLCD land cover.
//!
//! A scene's acquisition year picks the land-cover epoch through a fixed
//! interval table; the epoch raster's class codes are then remapped to the
//! nine-biome scheme. Epoch rasters are fetched once per region and shared.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ndarray::Array2;
use tracing::{debug, info};

use crate::core::grid::GridSpec;
use crate::error::{Error, Result};
use crate::io::landcover::LandCoverSource;
use crate::types::Biome;

/// Earliest acquisition year with a land-cover epoch assignment.
pub const EARLIEST_YEAR: i32 = 1984;

/// Inclusive year ranges and the epoch serving them. Gaps between epochs are
/// split so each year uses the nearest epoch; years after the last epoch
/// keep using it.
const EPOCH_TABLE: &[(i32, i32, u16)] = &[
    (EARLIEST_YEAR, 2002, 2001),
    (2003, 2004, 2004),
    (2005, 2006, 2006),
    (2007, 2009, 2008),
    (2010, 2011, 2011),
    (2012, 2014, 2013),
    (2015, 2017, 2016),
    (2018, 2019, 2019),
    (2020, i32::MAX, 2021),
];

pub fn epoch_for_year(year: i32) -> Result<u16> {
    EPOCH_TABLE
        .iter()
        .find(|(lo, hi, _)| (*lo..=*hi).contains(&year))
        .map(|&(_, _, epoch)| epoch)
        .ok_or(Error::UnsupportedYear(year))
}

/// NLCD class code to biome; `None` for codes outside the legend.
pub fn biome_for_class(code: u16) -> Option<Biome> {
    match code {
        // water, ice/snow, developed, barren
        11 | 12 | 21 | 22 | 23 | 24 | 31 => Some(Biome::NON_VEGETATED),
        41 => Some(Biome::DECIDUOUS_FOREST),
        42 => Some(Biome::EVERGREEN_FOREST),
        43 => Some(Biome::MIXED_FOREST),
        51 | 52 => Some(Biome::SHRUBLAND),
        71 | 72 | 73 | 74 => Some(Biome::GRASSLAND),
        81 => Some(Biome::PASTURE),
        82 => Some(Biome::CROPLAND),
        90 | 95 => Some(Biome::WETLAND),
        _ => None,
    }
}

pub type BiomeMap = Array2<Option<Biome>>;

/// Remap land-cover codes; an epoch with no recognised class anywhere is an error.
pub fn classify(codes: &Array2<f64>, epoch: u16) -> Result<BiomeMap> {
    let map = codes.mapv(|c| {
        if c.is_finite() && c >= 0.0 && c <= u16::MAX as f64 {
            biome_for_class(c as u16)
        } else {
            None
        }
    });
    if map.iter().all(Option::is_none) {
        return Err(Error::LandCoverEpoch {
            epoch,
            reason: "no recognised land-cover classes over the region".to_string(),
        });
    }
    Ok(map)
}

type EpochSlot = Arc<Mutex<Option<Arc<BiomeMap>>>>;

/// Per-region biome maps, one fetch per epoch.
///
/// The outer lock only hands out per-epoch slots; a fetch holds its own
/// slot's lock, so different epochs load concurrently while callers of the
/// same epoch wait for the first fetch.
pub struct BiomeClassifier<'a> {
    source: &'a dyn LandCoverSource,
    grid: GridSpec,
    cache: Mutex<HashMap<u16, EpochSlot>>,
}

impl<'a> BiomeClassifier<'a> {
    pub fn new(source: &'a dyn LandCoverSource, grid: GridSpec) -> Self {
        Self {
            source,
            grid,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, epoch: u16) -> Result<EpochSlot> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| Error::Processing("land-cover cache poisoned".to_string()))?;
        Ok(Arc::clone(cache.entry(epoch).or_default()))
    }

    pub fn biomes_for_year(&self, year: i32) -> Result<Arc<BiomeMap>> {
        let epoch = epoch_for_year(year)?;
        let slot = self.slot(epoch)?;
        let mut entry = slot
            .lock()
            .map_err(|_| Error::Processing(format!("land-cover epoch {} poisoned", epoch)))?;
        if let Some(map) = entry.as_ref() {
            return Ok(Arc::clone(map));
        }
        // a failed fetch leaves the slot empty for the next caller
        info!("Fetching land-cover epoch {} for year {}", epoch, year);
        let codes = self.source.fetch(epoch, &self.grid)?;
        if codes.dim() != self.grid.shape() {
            return Err(Error::ShapeMismatch {
                expected: self.grid.shape(),
                actual: codes.dim(),
            });
        }
        let map = Arc::new(classify(&codes, epoch)?);
        debug!("Cached biome map for epoch {}", epoch);
        *entry = Some(Arc::clone(&map));
        Ok(map)
    }
}
