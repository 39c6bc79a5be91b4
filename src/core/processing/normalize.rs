//! Reflectance normalization: sensor-specific band names to the canonical band
//! set, and Collection 2 surface-reflectance digital numbers to the legacy
//! 0.0001 reflectance scale.
use chrono::{DateTime, Utc};
use ndarray::Array2;
use tracing::debug;

use crate::error::{Error, Result};
use crate::io::scene::{Scene, SolarMetadata};
use crate::types::{CanonicalBand, Sensor, SensorGroup};

pub const REFLECTANCE_GAIN: f64 = 0.0000275;
pub const REFLECTANCE_OFFSET: f64 = -0.2;
pub const LEGACY_SCALE: f64 = 0.0001;

const TM_ETM_BANDS: [(CanonicalBand, &str); 7] = [
    (CanonicalBand::Blue, "SR_B1"),
    (CanonicalBand::Green, "SR_B2"),
    (CanonicalBand::Red, "SR_B3"),
    (CanonicalBand::Nir, "SR_B4"),
    (CanonicalBand::Swir1, "SR_B5"),
    (CanonicalBand::Swir2, "SR_B7"),
    (CanonicalBand::Qa, "QA_PIXEL"),
];

const OLI_BANDS: [(CanonicalBand, &str); 7] = [
    (CanonicalBand::Blue, "SR_B2"),
    (CanonicalBand::Green, "SR_B3"),
    (CanonicalBand::Red, "SR_B4"),
    (CanonicalBand::Nir, "SR_B5"),
    (CanonicalBand::Swir1, "SR_B6"),
    (CanonicalBand::Swir2, "SR_B7"),
    (CanonicalBand::Qa, "QA_PIXEL"),
];

/// Source band name for each canonical band of a sensor group.
pub fn band_mapping(group: SensorGroup) -> &'static [(CanonicalBand, &'static str); 7] {
    match group {
        SensorGroup::L5 | SensorGroup::L7 => &TM_ETM_BANDS,
        SensorGroup::L8 => &OLI_BANDS,
    }
}

/// Digital number to 0.0001-scaled surface reflectance.
#[inline]
pub fn rescale_reflectance(dn: f64) -> f64 {
    (dn * REFLECTANCE_GAIN + REFLECTANCE_OFFSET) / LEGACY_SCALE
}

/// A scene carrying exactly the canonical band set.
#[derive(Debug, Clone)]
pub struct NormalizedScene {
    pub id: String,
    pub sensor: Sensor,
    pub acquired: DateTime<Utc>,
    pub solar: SolarMetadata,
    bands: [Array2<f64>; 7],
}

impl NormalizedScene {
    pub fn band(&self, band: CanonicalBand) -> &Array2<f64> {
        &self.bands[band as usize]
    }

    pub fn bands_mut(&mut self) -> impl Iterator<Item = &mut Array2<f64>> {
        self.bands.iter_mut()
    }

    pub fn band_names(&self) -> [CanonicalBand; 7] {
        CanonicalBand::ALL
    }

    pub fn group(&self) -> SensorGroup {
        self.sensor.group()
    }

    pub fn dim(&self) -> (usize, usize) {
        self.bands[0].dim()
    }
}

/// Rename and rescale a raw scene. Unknown sensors and missing bands are errors.
pub fn normalize_scene(scene: &Scene) -> Result<NormalizedScene> {
    let sensor: Sensor = scene.info.spacecraft.parse()?;
    let mapping = band_mapping(sensor.group());
    let expected = mapping
        .iter()
        .find_map(|(_, name)| scene.bands.get(*name))
        .map(|a| a.dim());

    let mut bands: Vec<Array2<f64>> = Vec::with_capacity(mapping.len());
    for &(canonical, source_name) in mapping.iter() {
        let raw = scene.bands.get(source_name).ok_or_else(|| Error::MissingBand {
            scene: scene.info.id.clone(),
            band: source_name.to_string(),
        })?;
        if let Some(dim) = expected {
            if raw.dim() != dim {
                return Err(Error::ShapeMismatch {
                    expected: dim,
                    actual: raw.dim(),
                });
            }
        }
        let band = match canonical {
            CanonicalBand::Qa => raw.clone(),
            _ => raw.mapv(rescale_reflectance),
        };
        bands.push(band);
    }
    let bands: [Array2<f64>; 7] = bands
        .try_into()
        .map_err(|_| Error::Processing("canonical band count mismatch".to_string()))?;

    debug!(
        "Normalized scene {} ({} -> group {})",
        scene.info.id,
        sensor,
        sensor.group()
    );

    Ok(NormalizedScene {
        id: scene.info.id.clone(),
        sensor,
        acquired: scene.info.acquired,
        solar: scene.solar,
        bands,
    })
}
