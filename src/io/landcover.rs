//! Land-cover rasters by epoch. The GDAL-backed source expects one file per
//! epoch, `nlcd_<epoch>.tif`, in a single directory.
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::debug;

use crate::core::grid::{GridSpec, resample_nearest};
use crate::error::{Error, Result};
use crate::io::gdal::GdalRasterReader;

pub trait LandCoverSource: Sync {
    /// Class codes for `epoch` on `grid`; NaN where the raster has no data.
    fn fetch(&self, epoch: u16, grid: &GridSpec) -> Result<Array2<f64>>;
}

#[derive(Debug, Clone)]
pub struct GdalLandCoverSource {
    dir: PathBuf,
}

impl GdalLandCoverSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, epoch: u16) -> PathBuf {
        self.dir.join(format!("nlcd_{}.tif", epoch))
    }
}

impl LandCoverSource for GdalLandCoverSource {
    fn fetch(&self, epoch: u16, grid: &GridSpec) -> Result<Array2<f64>> {
        let path = self.path_for(epoch);
        let epoch_error = |reason: String| Error::LandCoverEpoch { epoch, reason };
        if !path.is_file() {
            return Err(epoch_error(format!("{} not found", path.display())));
        }
        let reader = GdalRasterReader::open(&path).map_err(|e| epoch_error(e.to_string()))?;
        let (offset, size) = reader
            .window_for_bounds(&grid.bounds())
            .ok_or_else(|| epoch_error("raster does not cover the region".to_string()))?;
        debug!("Reading land cover {:?} window {:?} {:?}", path, offset, size);
        let window = reader
            .read_window(1, offset, size)
            .map_err(|e| epoch_error(e.to_string()))?;
        resample_nearest(&window, &reader.window_geotransform(offset), grid, f64::NAN)
    }
}
