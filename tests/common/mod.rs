#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{TimeZone, Utc};
use ndarray::Array2;

use laipro::core::hull::{ConvexHull, HullTable, ReflectanceRanges, BIN_COUNT};
use laipro::core::model::{Feature, FrozenModel, LinearModel, ModelRegistry, FEATURE_COUNT};
use laipro::core::processing::regress::requested_biomes;
use laipro::io::scene::{Scene, SceneInfo, SolarMetadata};
use laipro::{BoundingBox, GridSpec, LandCoverSource, RegionConfig, SensorGroup};

pub const BOUNDS: BoundingBox = BoundingBox {
    min_lon: -94.0,
    min_lat: 42.0,
    max_lon: -93.0,
    max_lat: 43.0,
};
pub const GSD: f64 = 0.5;
pub const CLEAR_QA: f64 = 21824.0;
/// Clear value with the cloud bit set.
pub const CLOUD_QA: f64 = 21824.0 + 8.0;

// NLCD codes
pub const DECIDUOUS: f64 = 41.0;
pub const OPEN_WATER: f64 = 11.0;

pub fn grid() -> GridSpec {
    GridSpec::from_bbox(&BOUNDS, GSD).unwrap()
}

pub fn region(id: &str, bounds: BoundingBox) -> RegionConfig {
    RegionConfig {
        id: id.to_string(),
        bounds,
    }
}

/// Digital number that normalizes to `reflectance` on the 0.0001 scale.
pub fn dn(reflectance: f64) -> f64 {
    (reflectance * 0.0001 + 0.2) / 0.0000275
}

pub struct FixedLandCover {
    pub codes: Array2<f64>,
    pub calls: AtomicUsize,
}

impl FixedLandCover {
    pub fn uniform(code: f64) -> Self {
        Self::new(Array2::from_elem(grid().shape(), code))
    }

    pub fn new(codes: Array2<f64>) -> Self {
        Self {
            codes,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LandCoverSource for FixedLandCover {
    fn fetch(&self, _epoch: u16, _grid: &GridSpec) -> laipro::Result<Array2<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.codes.clone())
    }
}

/// `intercept + zenith_coef * solar_zenith`
pub fn linear(intercept: f64, zenith_coef: f64) -> FrozenModel {
    let mut coefficients = [0.0; FEATURE_COUNT];
    coefficients[Feature::SolarZenith.index()] = zenith_coef;
    FrozenModel::Linear(LinearModel {
        intercept,
        coefficients,
    })
}

/// The same model for every sensor group and biome, non-vegetated included.
pub fn registry_with(model: FrozenModel) -> ModelRegistry {
    let mut registry = ModelRegistry::default();
    for group in SensorGroup::ALL {
        for biome in requested_biomes(true) {
            registry.insert(group, biome, model.clone()).unwrap();
        }
    }
    registry
}

/// Hulls that accept every reflectance in `[0, 10000]`.
pub fn full_hulls() -> HullTable {
    let ranges = ReflectanceRanges {
        red: [0.0, 10000.0],
        green: [0.0, 10000.0],
        nir: [0.0, 10000.0],
        swir1: [0.0, 10000.0],
    };
    let mut inside = Vec::with_capacity(BIN_COUNT.pow(4));
    for r in 0..BIN_COUNT as u8 {
        for g in 0..BIN_COUNT as u8 {
            for n in 0..BIN_COUNT as u8 {
                for s in 0..BIN_COUNT as u8 {
                    inside.push([r, g, n, s]);
                }
            }
        }
    }
    let mut table = HullTable::default();
    for group in SensorGroup::ALL {
        table.insert(group, ConvexHull::new(ranges, &inside).unwrap());
    }
    table
}

pub struct SceneFixture {
    pub id: &'static str,
    pub spacecraft: &'static str,
    pub month: u32,
    pub day: u32,
    pub sun_elevation: Option<f64>,
    pub qa: f64,
    pub footprint: BoundingBox,
}

impl Default for SceneFixture {
    fn default() -> Self {
        Self {
            id: "LC08_A",
            spacecraft: "LANDSAT_8",
            month: 7,
            day: 10,
            sun_elevation: Some(60.0),
            qa: CLEAR_QA,
            footprint: BOUNDS,
        }
    }
}

/// A uniform 2x2 scene with vegetated reflectance.
pub fn scene(desc: SceneFixture) -> Scene {
    let shape = grid().shape();
    let oli = [
        ("SR_B2", 400.0),
        ("SR_B3", 700.0),
        ("SR_B4", 3000.0),
        ("SR_B5", 4500.0),
        ("SR_B6", 2000.0),
        ("SR_B7", 1200.0),
    ];
    let tm = [
        ("SR_B1", 400.0),
        ("SR_B2", 700.0),
        ("SR_B3", 3000.0),
        ("SR_B4", 4500.0),
        ("SR_B5", 2000.0),
        ("SR_B7", 1200.0),
    ];
    let layout = if desc.spacecraft.ends_with('8') || desc.spacecraft.ends_with('9') {
        oli
    } else {
        tm
    };
    let mut bands: HashMap<String, Array2<f64>> = layout
        .iter()
        .map(|(name, r)| (name.to_string(), Array2::from_elem(shape, dn(*r))))
        .collect();
    bands.insert("QA_PIXEL".to_string(), Array2::from_elem(shape, desc.qa));
    Scene {
        info: SceneInfo {
            id: desc.id.to_string(),
            spacecraft: desc.spacecraft.to_string(),
            acquired: Utc
                .with_ymd_and_hms(2019, desc.month, desc.day, 16, 30, 0)
                .unwrap(),
            cloud_cover: 12.0,
            footprint: desc.footprint,
        },
        solar: SolarMetadata {
            sun_elevation: desc.sun_elevation,
            sun_azimuth: Some(135.0),
            ..Default::default()
        },
        bands,
    }
}
