//! Biome-stratified regression.
//!
//! Each requested biome gets its own layer computed by that biome's model over
//! that biome's pixels only. Layers are then overlaid onto an empty raster;
//! since biome masks are disjoint every pixel is written at most once. Pixels
//! no model wrote stay `None`, so no prediction value can be mistaken for them.
use ndarray::{Array2, Zip};
use rayon::prelude::*;
use tracing::debug;

use crate::core::model::{Feature, FeatureVector, ModelRegistry, Regressor, FEATURE_COUNT};
use crate::core::processing::biome::BiomeMap;
use crate::core::processing::features::SolarGeometry;
use crate::error::{Error, Result};
use crate::types::{Biome, SensorGroup};

/// Biomes the regressor runs for: 1..=8, plus 0 when non-vegetated retrieval is enabled.
pub fn requested_biomes(include_non_vegetated: bool) -> Vec<Biome> {
    let mut biomes = Vec::with_capacity(9);
    if include_non_vegetated {
        biomes.push(Biome::NON_VEGETATED);
    }
    biomes.extend_from_slice(&Biome::VEGETATED);
    biomes
}

/// Borrowed per-pixel inputs of the ten-feature vector.
pub struct FeatureInputs<'a> {
    pub red: &'a Array2<f64>,
    pub green: &'a Array2<f64>,
    pub nir: &'a Array2<f64>,
    pub swir1: &'a Array2<f64>,
    pub latitude: &'a Array2<f64>,
    pub longitude: &'a Array2<f64>,
    pub ndvi: &'a Array2<f64>,
    pub ndwi: &'a Array2<f64>,
    pub solar: SolarGeometry,
}

impl FeatureInputs<'_> {
    pub fn dim(&self) -> (usize, usize) {
        self.red.dim()
    }

    fn check_shapes(&self) -> Result<()> {
        let dim = self.dim();
        for a in [
            self.green,
            self.nir,
            self.swir1,
            self.latitude,
            self.longitude,
            self.ndvi,
            self.ndwi,
        ] {
            if a.dim() != dim {
                return Err(Error::ShapeMismatch {
                    expected: dim,
                    actual: a.dim(),
                });
            }
        }
        Ok(())
    }

    /// Feature vector at a pixel, or `None` if any input is missing.
    pub fn vector(&self, idx: (usize, usize)) -> Option<FeatureVector> {
        let mut x = [0.0; FEATURE_COUNT];
        x[Feature::Red.index()] = self.red[idx];
        x[Feature::Green.index()] = self.green[idx];
        x[Feature::Nir.index()] = self.nir[idx];
        x[Feature::Swir1.index()] = self.swir1[idx];
        x[Feature::Latitude.index()] = self.latitude[idx];
        x[Feature::Longitude.index()] = self.longitude[idx];
        x[Feature::Ndvi.index()] = self.ndvi[idx];
        x[Feature::Ndwi.index()] = self.ndwi[idx];
        x[Feature::SolarZenith.index()] = self.solar.zenith;
        x[Feature::SolarAzimuth.index()] = self.solar.azimuth;
        x.iter().all(|v| v.is_finite()).then_some(x)
    }
}

/// Predictions of one biome's model, `Some` only on that biome's pixels.
pub fn predict_biome_layer(
    model: &dyn Regressor,
    biome: Biome,
    biomes: &BiomeMap,
    inputs: &FeatureInputs<'_>,
) -> Array2<Option<f64>> {
    let mut layer = Array2::from_elem(biomes.dim(), None);
    Zip::indexed(&mut layer).and(biomes).par_for_each(|idx, out, &b| {
        if b == Some(biome) {
            *out = inputs.vector(idx).map(|x| model.predict(&x));
        }
    });
    layer
}

/// Write `layer` into `target`; a pixel already written is an error.
pub fn overlay_disjoint(
    target: &mut Array2<Option<f64>>,
    layer: &Array2<Option<f64>>,
) -> Result<()> {
    if target.dim() != layer.dim() {
        return Err(Error::ShapeMismatch {
            expected: target.dim(),
            actual: layer.dim(),
        });
    }
    let mut collisions = 0usize;
    Zip::from(&mut *target).and(layer).for_each(|t, &v| {
        if v.is_some() {
            if t.is_some() {
                collisions += 1;
            }
            *t = v;
        }
    });
    if collisions > 0 {
        return Err(Error::Processing(format!(
            "{} pixels written by more than one biome model",
            collisions
        )));
    }
    Ok(())
}

/// Raw (unclamped) LAI for every pixel whose biome is requested, `None` elsewhere.
pub fn apply_stratified(
    group: SensorGroup,
    registry: &ModelRegistry,
    biomes: &BiomeMap,
    inputs: &FeatureInputs<'_>,
    include_non_vegetated: bool,
) -> Result<Array2<Option<f64>>> {
    inputs.check_shapes()?;
    if biomes.dim() != inputs.dim() {
        return Err(Error::ShapeMismatch {
            expected: inputs.dim(),
            actual: biomes.dim(),
        });
    }

    let dispatch = requested_biomes(include_non_vegetated)
        .into_iter()
        .map(|b| registry.get(group, b).map(|m| (b, m)))
        .collect::<Result<Vec<_>>>()?;

    let layers: Vec<(Biome, Array2<Option<f64>>)> = dispatch
        .par_iter()
        .filter(|(b, _)| biomes.iter().any(|x| *x == Some(*b)))
        .map(|&(b, model)| (b, predict_biome_layer(model, b, biomes, inputs)))
        .collect();

    let mut lai = Array2::from_elem(inputs.dim(), None);
    for (b, layer) in &layers {
        overlay_disjoint(&mut lai, layer)?;
        debug!("Biome {} layer applied", b);
    }
    Ok(lai)
}
