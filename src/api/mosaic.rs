//! Merge per-region monthly LAI rasters onto one reference grid.
//!
//! The output is a float32 raster in physical LAI units (the 0.01 scale is
//! applied), pre-filled with no-data and filled block by block from each input
//! in path order. Inputs in another CRS are read through a nearest-neighbour
//! warped view in the reference CRS.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::grid::{resample_nearest, GridSpec};
use crate::core::processing::merge::{merge_block, DEFAULT_BLOCK_SIZE, DEFAULT_MOSAIC_NODATA};
use crate::core::processing::qa::LAI_SCALE_FACTOR;
use crate::error::{Error, Result};
use crate::io::gdal::GdalRasterReader;
use crate::io::writers::tiff::{create_f32_tiff, read_block_f32, write_block_f32};
use crate::types::MergePolicy;

pub const OVERVIEW_LEVELS: [i32; 5] = [2, 4, 8, 16, 32];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MosaicOptions {
    pub policy: MergePolicy,
    pub block_size: usize,
    /// Output no-data; defaults to the reference's no-data, else -9999
    pub nodata: Option<f64>,
    pub scale_factor: f64,
    pub recursive: bool,
    pub overviews: bool,
}

impl Default for MosaicOptions {
    fn default() -> Self {
        Self {
            policy: MergePolicy::Src,
            block_size: DEFAULT_BLOCK_SIZE,
            nodata: None,
            scale_factor: LAI_SCALE_FACTOR,
            recursive: true,
            overviews: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MosaicReport {
    pub merged: usize,
    pub skipped: Vec<PathBuf>,
    pub pixels_written: usize,
    pub overviews_built: bool,
}

fn is_tiff(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

fn walk(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                walk(&path, recursive, out)?;
            }
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// `.tif` files sorted by path, followed by `.tiff` files sorted by path.
pub fn collect_inputs(input_dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut all = Vec::new();
    walk(input_dir, recursive, &mut all)?;
    let mut tif: Vec<PathBuf> = all.iter().filter(|p| is_tiff(p, "tif")).cloned().collect();
    let mut tiff: Vec<PathBuf> = all.into_iter().filter(|p| is_tiff(p, "tiff")).collect();
    tif.sort();
    tiff.sort();
    tif.extend(tiff);
    Ok(tif)
}

fn block_origins(len: usize, block: usize) -> impl Iterator<Item = usize> {
    (0..len).step_by(block.max(1))
}

/// Merge `inputs` onto the grid of `reference`, writing `output`.
pub fn merge_to_reference_grid(
    inputs: &[PathBuf],
    reference: &Path,
    output: &Path,
    options: &MosaicOptions,
) -> Result<MosaicReport> {
    if inputs.is_empty() {
        return Err(Error::MissingArgument {
            arg: "mosaic inputs".to_string(),
        });
    }
    if options.block_size == 0 {
        return Err(Error::InvalidArgument {
            arg: "block_size",
            value: "0".to_string(),
        });
    }

    let reference = GdalRasterReader::open(reference)?;
    let ref_meta = &reference.metadata;
    let ref_wkt = reference.dataset.projection();
    let grid = GridSpec {
        geotransform: ref_meta.geotransform,
        width: ref_meta.size_x,
        height: ref_meta.size_y,
    };
    let nodata = options
        .nodata
        .or(ref_meta.nodata.first().copied().flatten())
        .unwrap_or(DEFAULT_MOSAIC_NODATA);
    let nodata_f32 = nodata as f32;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    info!(
        "Mosaicking {} inputs onto {}x{} reference grid ({})",
        inputs.len(),
        grid.width,
        grid.height,
        ref_meta.projection
    );
    let mut ds = create_f32_tiff(
        output,
        grid.width,
        grid.height,
        &grid.geotransform,
        &ref_meta.projection,
        nodata,
    )?;

    let mut report = MosaicReport::default();
    for path in inputs {
        let src = match GdalRasterReader::open(path) {
            Ok(src) => src,
            Err(e) => {
                warn!("Skipping {:?}: {}", path, e);
                report.skipped.push(path.clone());
                continue;
            }
        };
        let src = if src.metadata.projection == ref_meta.projection {
            src
        } else {
            debug!(
                "Warping {:?} from {} to {}",
                path, src.metadata.projection, ref_meta.projection
            );
            match src.into_warped(&ref_wkt) {
                Ok(warped) => warped,
                Err(e) => {
                    warn!("Skipping {:?}: cannot warp to reference CRS: {}", path, e);
                    report.skipped.push(path.clone());
                    continue;
                }
            }
        };

        let mut written = 0usize;
        for row in block_origins(grid.height, options.block_size) {
            let h = options.block_size.min(grid.height - row);
            for col in block_origins(grid.width, options.block_size) {
                let w = options.block_size.min(grid.width - col);
                let block_grid = grid.window((col, row), (w, h));
                let Some((offset, size)) = src.window_for_bounds(&block_grid.bounds()) else {
                    continue;
                };
                let window = src.read_window(1, offset, size)?;
                let resampled =
                    resample_nearest(&window, &src.window_geotransform(offset), &block_grid, f64::NAN)?;
                let mut dest = read_block_f32(&ds, (col, row), (w, h))?;
                let n = merge_block(
                    &mut dest,
                    &resampled,
                    options.policy,
                    options.scale_factor,
                    nodata_f32,
                )?;
                if n > 0 {
                    write_block_f32(&ds, (col, row), &dest)?;
                    written += n;
                }
            }
        }
        debug!("Merged {:?}: {} pixels", path, written);
        report.merged += 1;
        report.pixels_written += written;
    }

    if options.overviews {
        match ds.build_overviews("AVERAGE", &OVERVIEW_LEVELS, &[]) {
            Ok(()) => report.overviews_built = true,
            Err(e) => warn!("Overview build skipped: {}", e),
        }
    }
    drop(ds);

    info!(
        "Mosaic written to {:?}: {} merged, {} skipped",
        output,
        report.merged,
        report.skipped.len()
    );
    Ok(report)
}
