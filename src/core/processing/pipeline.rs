use std::sync::Arc;

use chrono::Datelike;
use ndarray::{Array2, Zip};
use tracing::debug;

use crate::core::grid::GridSpec;
use crate::core::hull::HullTable;
use crate::core::model::ModelRegistry;
use crate::core::processing::biome::{BiomeClassifier, BiomeMap};
use crate::core::processing::features::{derive_features, SolarGeometry};
use crate::core::processing::mask::apply_qa_mask;
use crate::core::processing::normalize::{normalize_scene, NormalizedScene};
use crate::core::processing::qa::{encode_lai, encode_qa, is_valid, LAI_NODATA};
use crate::core::processing::regress::{apply_stratified, requested_biomes, FeatureInputs};
use crate::error::{Error, Result};
use crate::io::landcover::LandCoverSource;
use crate::io::scene::Scene;
use crate::types::{CanonicalBand, SensorGroup};

/// Read-only state shared by every scene of one region, reused across months.
pub struct RetrievalContext<'a> {
    pub registry: &'a ModelRegistry,
    pub hulls: &'a HullTable,
    pub grid: GridSpec,
    pub classifier: BiomeClassifier<'a>,
    pub longitude: Array2<f64>,
    pub latitude: Array2<f64>,
    pub include_non_vegetated: bool,
}

impl<'a> RetrievalContext<'a> {
    pub fn new(
        registry: &'a ModelRegistry,
        hulls: &'a HullTable,
        landcover: &'a dyn LandCoverSource,
        grid: GridSpec,
        include_non_vegetated: bool,
    ) -> Self {
        let (longitude, latitude) = grid.coordinate_bands();
        Self {
            registry,
            hulls,
            classifier: BiomeClassifier::new(landcover, grid.clone()),
            grid,
            longitude,
            latitude,
            include_non_vegetated,
        }
    }

    /// Fail before touching pixels if any model or hull for `group` is missing.
    pub fn check_group(&self, group: SensorGroup) -> Result<()> {
        self.registry
            .require(group, &requested_biomes(self.include_non_vegetated))?;
        self.hulls.get(group)?;
        Ok(())
    }
}

/// Per-scene retrieval outputs on the region grid.
#[derive(Debug, Clone)]
pub struct SceneRetrieval {
    pub scene_id: String,
    pub group: SensorGroup,
    /// Raw regression output, `None` where no model ran.
    pub lai: Array2<Option<f64>>,
    /// Clamped ×100 LAI, `LAI_NODATA` where no model ran.
    pub lai_scaled: Array2<u16>,
    pub qa: Array2<u8>,
    pub biome: Arc<BiomeMap>,
    pub solar: SolarGeometry,
}

impl SceneRetrieval {
    pub fn valid_mask(&self) -> Array2<bool> {
        let mut mask = Array2::from_elem(self.qa.dim(), false);
        Zip::from(&mut mask)
            .and(&self.qa)
            .and(&self.lai_scaled)
            .for_each(|m, &q, &v| *m = is_valid(q) && v != LAI_NODATA);
        mask
    }
}

/// Normalize, mask, derive features, classify, regress and QA-encode one scene.
pub fn retrieve_scene(scene: &Scene, ctx: &RetrievalContext<'_>) -> Result<SceneRetrieval> {
    let mut normalized = normalize_scene(scene)?;
    retrieve_normalized(&mut normalized, ctx)
}

pub fn retrieve_normalized(
    scene: &mut NormalizedScene,
    ctx: &RetrievalContext<'_>,
) -> Result<SceneRetrieval> {
    let group = scene.group();
    ctx.check_group(group)?;
    if scene.dim() != ctx.grid.shape() {
        return Err(Error::ShapeMismatch {
            expected: ctx.grid.shape(),
            actual: scene.dim(),
        });
    }

    apply_qa_mask(scene);
    let features = derive_features(scene);
    let biome = ctx.classifier.biomes_for_year(scene.acquired.year())?;

    let inputs = FeatureInputs {
        red: scene.band(CanonicalBand::Red),
        green: scene.band(CanonicalBand::Green),
        nir: scene.band(CanonicalBand::Nir),
        swir1: scene.band(CanonicalBand::Swir1),
        latitude: &ctx.latitude,
        longitude: &ctx.longitude,
        ndvi: &features.ndvi,
        ndwi: &features.ndwi,
        solar: features.solar,
    };

    let lai = apply_stratified(
        group,
        ctx.registry,
        &biome,
        &inputs,
        ctx.include_non_vegetated,
    )?;
    let qa = encode_qa(ctx.hulls.get(group)?, &inputs, &lai, &biome);
    let lai_scaled = lai.mapv(|v| v.map_or(LAI_NODATA, encode_lai));

    let retrieval = SceneRetrieval {
        scene_id: scene.id.clone(),
        group,
        lai,
        lai_scaled,
        qa,
        biome,
        solar: features.solar,
    };
    debug!(
        "Scene {}: {} valid LAI pixels",
        retrieval.scene_id,
        retrieval.valid_mask().iter().filter(|&&v| v).count()
    );
    Ok(retrieval)
}
