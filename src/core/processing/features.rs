use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::processing::normalize::NormalizedScene;
use crate::io::scene::SolarMetadata;
use crate::types::CanonicalBand;

pub const DEFAULT_SOLAR_ZENITH: f64 = 45.0;
pub const DEFAULT_SOLAR_AZIMUTH: f64 = 180.0;

/// Normalized difference: (a - b) / (a + b), NaN where the sum is zero or an input is missing
pub fn normalized_difference(a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    let mut result = Array2::from_elem(a.dim(), f64::NAN);
    Zip::from(a).and(b).and(&mut result).par_for_each(|&a_val, &b_val, res| {
        let sum = a_val + b_val;
        if sum != 0.0 && sum.is_finite() {
            *res = (a_val - b_val) / sum;
        }
    });
    result
}

/// Scene-wide illumination angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolarGeometry {
    pub zenith: f64,
    pub azimuth: f64,
}

impl SolarGeometry {
    /// Zenith: `90 - SUN_ELEVATION`, then `SOLAR_ZENITH_ANGLE`, then 45.
    /// Azimuth: `SUN_AZIMUTH`, then `SOLAR_AZIMUTH_ANGLE`, then 180.
    pub fn resolve(meta: &SolarMetadata) -> Self {
        let zenith = [meta.sun_elevation.map(|e| 90.0 - e), meta.solar_zenith_angle]
            .into_iter()
            .flatten()
            .find(|v| v.is_finite())
            .unwrap_or(DEFAULT_SOLAR_ZENITH);
        let azimuth = [meta.sun_azimuth, meta.solar_azimuth_angle]
            .into_iter()
            .flatten()
            .find(|v| v.is_finite())
            .unwrap_or(DEFAULT_SOLAR_AZIMUTH);
        Self { zenith, azimuth }
    }
}

/// Per-scene derived inputs: the two spectral indices plus uniform solar geometry.
#[derive(Debug, Clone)]
pub struct SceneFeatures {
    pub ndvi: Array2<f64>,
    pub ndwi: Array2<f64>,
    pub solar: SolarGeometry,
}

pub fn derive_features(scene: &NormalizedScene) -> SceneFeatures {
    let red = scene.band(CanonicalBand::Red);
    let nir = scene.band(CanonicalBand::Nir);
    let swir1 = scene.band(CanonicalBand::Swir1);
    let solar = SolarGeometry::resolve(&scene.solar);
    debug!(
        "Scene {} solar zenith {:.2}, azimuth {:.2}",
        scene.id, solar.zenith, solar.azimuth
    );
    SceneFeatures {
        ndvi: normalized_difference(nir, red),
        ndwi: normalized_difference(nir, swir1),
        solar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn indices_are_nan_on_zero_denominator() {
        let nir = Array2::from_shape_vec((1, 3), vec![3000.0, 0.0, f64::NAN]).unwrap();
        let red = Array2::from_shape_vec((1, 3), vec![1000.0, 0.0, 500.0]).unwrap();
        let nd = normalized_difference(&nir, &red);
        assert_relative_eq!(nd[[0, 0]], 0.5);
        assert!(nd[[0, 1]].is_nan());
        assert!(nd[[0, 2]].is_nan());
    }

    #[test]
    fn zenith_prefers_sun_elevation() {
        let meta = SolarMetadata {
            sun_elevation: Some(60.0),
            solar_zenith_angle: Some(10.0),
            ..Default::default()
        };
        assert_relative_eq!(SolarGeometry::resolve(&meta).zenith, 30.0);
    }

    #[test]
    fn zenith_falls_back_to_angle_field_then_default() {
        let meta = SolarMetadata {
            solar_zenith_angle: Some(33.0),
            ..Default::default()
        };
        assert_relative_eq!(SolarGeometry::resolve(&meta).zenith, 33.0);
        assert_relative_eq!(SolarGeometry::resolve(&SolarMetadata::default()).zenith, 45.0);
    }

    #[test]
    fn azimuth_fallback_chain() {
        let both = SolarMetadata {
            sun_azimuth: Some(140.0),
            solar_azimuth_angle: Some(150.0),
            ..Default::default()
        };
        assert_relative_eq!(SolarGeometry::resolve(&both).azimuth, 140.0);
        let alt = SolarMetadata {
            solar_azimuth_angle: Some(150.0),
            ..Default::default()
        };
        assert_relative_eq!(SolarGeometry::resolve(&alt).azimuth, 150.0);
        assert_relative_eq!(SolarGeometry::resolve(&SolarMetadata::default()).azimuth, 180.0);
    }
}
