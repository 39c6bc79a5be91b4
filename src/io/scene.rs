//! Scene catalog and pixel access.
//!
//! `SceneSource` separates the catalog query (whose failure makes a whole
//! region-month unavailable) from the per-scene fetch (whose failure only drops
//! that scene). `DirectorySceneSource` serves scenes laid out on disk as
//!
//! ```text
//! <root>/<scene id>/scene.json
//! <root>/<scene id>/<band files referenced by scene.json>
//! ```
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::grid::{BoundingBox, GridSpec, resample_nearest};
use crate::error::{Error, Result};
use crate::io::gdal::GdalRasterReader;

pub const MANIFEST_NAME: &str = "scene.json";

/// Catalog entry: everything known about a scene before its pixels are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneInfo {
    pub id: String,
    /// Raw spacecraft identifier (e.g. `LANDSAT_8`); parsed during normalization.
    pub spacecraft: String,
    pub acquired: DateTime<Utc>,
    pub cloud_cover: f64,
    pub footprint: BoundingBox,
}

/// Illumination metadata as delivered; any field may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SolarMetadata {
    #[serde(default)]
    pub sun_elevation: Option<f64>,
    #[serde(default)]
    pub sun_azimuth: Option<f64>,
    #[serde(default)]
    pub solar_zenith_angle: Option<f64>,
    #[serde(default)]
    pub solar_azimuth_angle: Option<f64>,
}

/// One acquired scene with its raw (digital number) bands on the region grid.
#[derive(Debug, Clone)]
pub struct Scene {
    pub info: SceneInfo,
    pub solar: SolarMetadata,
    /// Sensor-specific band name (e.g. `SR_B4`, `QA_PIXEL`) to pixels.
    pub bands: HashMap<String, Array2<f64>>,
}

#[derive(Debug, Clone)]
pub struct SceneQuery {
    /// Inclusive.
    pub start: DateTime<Utc>,
    /// Exclusive.
    pub end: DateTime<Utc>,
    pub bounds: BoundingBox,
    /// Maximum scene cloud cover, percent.
    pub max_cloud_cover: f64,
}

impl SceneQuery {
    pub fn matches(&self, info: &SceneInfo) -> bool {
        info.acquired >= self.start
            && info.acquired < self.end
            && info.cloud_cover <= self.max_cloud_cover
            && info.footprint.intersects(&self.bounds)
    }
}

pub trait SceneSource: Sync {
    /// Scenes matching `query`, sorted by acquisition time. An error means the
    /// source itself is unavailable.
    fn query(&self, query: &SceneQuery) -> Result<Vec<SceneInfo>>;

    /// Load one scene's bands resampled onto `grid`.
    fn fetch(&self, info: &SceneInfo, grid: &GridSpec) -> Result<Scene>;
}

fn sort_by_acquisition(scenes: &mut [SceneInfo]) {
    scenes.sort_by(|a, b| a.acquired.cmp(&b.acquired).then_with(|| a.id.cmp(&b.id)));
}

/// Scenes already in memory and on the target grid.
#[derive(Debug, Clone, Default)]
pub struct InMemorySceneSource {
    scenes: Vec<Scene>,
}

impl InMemorySceneSource {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }
}

impl SceneSource for InMemorySceneSource {
    fn query(&self, query: &SceneQuery) -> Result<Vec<SceneInfo>> {
        let mut found: Vec<SceneInfo> = self
            .scenes
            .iter()
            .map(|s| &s.info)
            .filter(|info| query.matches(info))
            .cloned()
            .collect();
        sort_by_acquisition(&mut found);
        Ok(found)
    }

    fn fetch(&self, info: &SceneInfo, grid: &GridSpec) -> Result<Scene> {
        let scene = self
            .scenes
            .iter()
            .find(|s| s.info.id == info.id)
            .ok_or_else(|| Error::SceneFetch {
                scene: info.id.clone(),
                reason: "not in memory".to_string(),
            })?;
        for band in scene.bands.values() {
            if band.dim() != grid.shape() {
                return Err(Error::ShapeMismatch {
                    expected: grid.shape(),
                    actual: band.dim(),
                });
            }
        }
        Ok(scene.clone())
    }
}

/// `scene.json` contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneManifest {
    #[serde(flatten)]
    pub info: SceneInfo,
    #[serde(flatten)]
    pub solar: SolarMetadata,
    /// Band name to file path relative to the scene directory.
    pub bands: HashMap<String, PathBuf>,
}

/// Scene catalog backed by a directory of per-scene folders.
#[derive(Debug, Clone)]
pub struct DirectorySceneSource {
    root: PathBuf,
}

impl DirectorySceneSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn read_manifest(dir: &Path) -> Result<SceneManifest> {
        let text = fs::read_to_string(dir.join(MANIFEST_NAME))?;
        Ok(serde_json::from_str(&text)?)
    }

    fn load_bands(&self, manifest: &SceneManifest, grid: &GridSpec) -> Result<HashMap<String, Array2<f64>>> {
        let dir = self.root.join(&manifest.info.id);
        let bounds = grid.bounds();
        let mut bands = HashMap::with_capacity(manifest.bands.len());
        for (name, file) in &manifest.bands {
            let reader = GdalRasterReader::open(dir.join(file))?;
            let data = match reader.window_for_bounds(&bounds) {
                Some((offset, size)) => {
                    let window = reader.read_window(1, offset, size)?;
                    resample_nearest(&window, &reader.window_geotransform(offset), grid, f64::NAN)?
                }
                None => Array2::from_elem(grid.shape(), f64::NAN),
            };
            bands.insert(name.clone(), data);
        }
        Ok(bands)
    }
}

impl SceneSource for DirectorySceneSource {
    fn query(&self, query: &SceneQuery) -> Result<Vec<SceneInfo>> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            Error::SourceUnavailable(format!("{}: {}", self.root.display(), e))
        })?;
        let mut found = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.join(MANIFEST_NAME).is_file() {
                continue;
            }
            match Self::read_manifest(&path) {
                Ok(manifest) => {
                    if query.matches(&manifest.info) {
                        found.push(manifest.info);
                    }
                }
                Err(e) => warn!("Skipping unreadable scene manifest in {:?}: {}", path, e),
            }
        }
        sort_by_acquisition(&mut found);
        debug!("Catalog query matched {} scenes under {:?}", found.len(), self.root);
        Ok(found)
    }

    fn fetch(&self, info: &SceneInfo, grid: &GridSpec) -> Result<Scene> {
        let to_fetch_error = |e: Error| Error::SceneFetch {
            scene: info.id.clone(),
            reason: e.to_string(),
        };
        let manifest = Self::read_manifest(&self.root.join(&info.id)).map_err(to_fetch_error)?;
        let bands = self.load_bands(&manifest, grid).map_err(to_fetch_error)?;
        Ok(Scene {
            info: manifest.info,
            solar: manifest.solar,
            bands,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn info(id: &str, day: u32, cloud: f64) -> SceneInfo {
        SceneInfo {
            id: id.to_string(),
            spacecraft: "LANDSAT_8".to_string(),
            acquired: Utc.with_ymd_and_hms(2021, 6, day, 17, 0, 0).unwrap(),
            cloud_cover: cloud,
            footprint: BoundingBox {
                min_lon: -100.0,
                min_lat: 40.0,
                max_lon: -99.0,
                max_lat: 41.0,
            },
        }
    }

    fn query() -> SceneQuery {
        SceneQuery {
            start: Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2021, 7, 1, 0, 0, 0).unwrap(),
            bounds: BoundingBox {
                min_lon: -99.5,
                min_lat: 40.5,
                max_lon: -99.4,
                max_lat: 40.6,
            },
            max_cloud_cover: 70.0,
        }
    }

    #[test]
    fn query_filters_cloud_and_sorts_by_time() {
        let mk = |i: SceneInfo| Scene {
            info: i,
            solar: SolarMetadata::default(),
            bands: HashMap::new(),
        };
        let source = InMemorySceneSource::new(vec![
            mk(info("b", 20, 10.0)),
            mk(info("a", 3, 10.0)),
            mk(info("cloudy", 5, 90.0)),
        ]);
        let ids: Vec<String> = source.query(&query()).unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn month_end_is_exclusive() {
        let mut i = info("late", 1, 0.0);
        i.acquired = Utc.with_ymd_and_hms(2021, 7, 1, 0, 0, 0).unwrap();
        assert!(!query().matches(&i));
    }

    #[test]
    fn manifest_parses_with_missing_solar_fields() {
        let json = r#"{
            "id": "LC08_031032_20210612",
            "spacecraft": "LANDSAT_8",
            "acquired": "2021-06-12T17:20:00Z",
            "cloud_cover": 12.5,
            "footprint": { "min_lon": -100, "min_lat": 40, "max_lon": -98, "max_lat": 42 },
            "sun_elevation": 64.2,
            "bands": { "SR_B4": "SR_B4.TIF", "QA_PIXEL": "QA_PIXEL.TIF" }
        }"#;
        let manifest: SceneManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.solar.sun_elevation, Some(64.2));
        assert_eq!(manifest.solar.sun_azimuth, None);
        assert_eq!(manifest.bands.len(), 2);
    }

    #[test]
    fn missing_root_means_source_unavailable() {
        let source = DirectorySceneSource::new("/nonexistent/laipro/scenes");
        assert!(matches!(source.query(&query()), Err(Error::SourceUnavailable(_))));
    }
}
