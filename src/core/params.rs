use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::grid::BoundingBox;
use crate::error::{Error, Result};
use crate::types::Reducer;

pub const DEFAULT_CLOUD_COVER_MAX: f64 = 70.0;
pub const DEFAULT_OUTPUT_CRS: &str = "EPSG:4326";
/// Roughly 30 m at mid latitudes.
pub const DEFAULT_GSD_DEGREES: f64 = 0.00027;
pub const ALGORITHM_VERSION: &str = concat!("laipro-", env!("CARGO_PKG_VERSION"));

/// Retrieval parameters suitable for config files and CLI overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalParams {
    pub reducer: Reducer,
    /// Scene-level cloud cover ceiling in percent
    pub cloud_cover_max: f64,
    /// Also retrieve LAI over biome 0 (non-vegetated)
    pub include_non_vegetated: bool,
    /// Region bounds and the pixel grid are in lon/lat degrees, so only
    /// `EPSG:4326` is accepted.
    pub output_crs: String,
    /// Output ground sample distance in CRS units
    pub gsd: f64,
    pub algorithm_version: String,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            reducer: Reducer::Median,
            cloud_cover_max: DEFAULT_CLOUD_COVER_MAX,
            include_non_vegetated: false,
            output_crs: DEFAULT_OUTPUT_CRS.to_string(),
            gsd: DEFAULT_GSD_DEGREES,
            algorithm_version: ALGORITHM_VERSION.to_string(),
        }
    }
}

impl RetrievalParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.cloud_cover_max) {
            return Err(Error::InvalidArgument {
                arg: "cloud_cover_max",
                value: self.cloud_cover_max.to_string(),
            });
        }
        if !self.output_crs.trim().eq_ignore_ascii_case(DEFAULT_OUTPUT_CRS) {
            return Err(Error::InvalidArgument {
                arg: "output_crs",
                value: self.output_crs.clone(),
            });
        }
        if !(self.gsd.is_finite() && self.gsd > 0.0) {
            return Err(Error::InvalidArgument {
                arg: "gsd",
                value: self.gsd.to_string(),
            });
        }
        Ok(())
    }
}

/// One named output region (e.g. a state) and its extent in the output CRS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub id: String,
    pub bounds: BoundingBox,
}

/// Asset locations for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPaths {
    pub scenes: PathBuf,
    pub landcover: PathBuf,
    pub models: PathBuf,
    pub hulls: PathBuf,
}

/// Full run description loaded from a JSON config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub assets: AssetPaths,
    pub output_dir: PathBuf,
    pub year: i32,
    #[serde(default = "all_months")]
    pub months: Vec<u32>,
    pub regions: Vec<RegionConfig>,
    #[serde(default)]
    pub params: RetrievalParams,
}

fn all_months() -> Vec<u32> {
    (1..=12).collect()
}

impl RunConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: RunConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;
        if let Some(m) = self.months.iter().find(|m| !(1..=12).contains(*m)) {
            return Err(Error::InvalidArgument {
                arg: "months",
                value: m.to_string(),
            });
        }
        if let Some(r) = self.regions.iter().find(|r| !r.bounds.is_valid()) {
            return Err(Error::InvalidArgument {
                arg: "regions",
                value: r.id.clone(),
            });
        }
        Ok(())
    }

    pub fn region(&self, id: &str) -> Option<&RegionConfig> {
        self.regions.iter().find(|r| r.id == id)
    }
}
