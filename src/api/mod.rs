//! High-level, ergonomic library API: composite one region-month in memory or
//! to a GeoTIFF, run a whole batch of (region, month) jobs, and merge per-region
//! outputs onto a reference grid. Prefer these entrypoints over the low-level
//! processing modules when integrating LAIPRO.
use std::path::{Path, PathBuf};

use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::core::grid::GridSpec;
use crate::core::hull::HullTable;
use crate::core::model::ModelRegistry;
use crate::core::params::{AssetPaths, RegionConfig, RetrievalParams};
use crate::core::processing::composite::{MonthWindow, MonthlyComposite, MonthlyCompositor};
use crate::core::processing::pipeline::{retrieve_scene, RetrievalContext, SceneRetrieval};
use crate::core::processing::qa::LAI_SCALE_FACTOR;
use crate::error::{Error, Result};
use crate::io::assets::{load_hull_table, load_model_registry};
use crate::io::landcover::{GdalLandCoverSource, LandCoverSource};
use crate::io::scene::{DirectorySceneSource, SceneInfo, SceneQuery, SceneSource};
use crate::io::writers::metadata::{
    create_metadata_sidecar, embed_tiff_metadata, sidecar_path, CompositeMetadata,
};
use crate::io::writers::tiff::write_composite_tiff;
use crate::types::Sensor;

pub mod mosaic;

/// Borrowed external collaborators for a run.
#[derive(Clone, Copy)]
pub struct RetrievalAssets<'a> {
    pub scenes: &'a dyn SceneSource,
    pub landcover: &'a dyn LandCoverSource,
    pub registry: &'a ModelRegistry,
    pub hulls: &'a HullTable,
}

/// Assets loaded from the paths of a run config.
pub struct LoadedAssets {
    pub scenes: DirectorySceneSource,
    pub landcover: GdalLandCoverSource,
    pub registry: ModelRegistry,
    pub hulls: HullTable,
}

impl LoadedAssets {
    pub fn load(paths: &AssetPaths) -> Result<Self> {
        Ok(Self {
            scenes: DirectorySceneSource::new(&paths.scenes),
            landcover: GdalLandCoverSource::new(&paths.landcover),
            registry: load_model_registry(&paths.models)?,
            hulls: load_hull_table(&paths.hulls)?,
        })
    }

    pub fn as_assets(&self) -> RetrievalAssets<'_> {
        RetrievalAssets {
            scenes: &self.scenes,
            landcover: &self.landcover,
            registry: &self.registry,
            hulls: &self.hulls,
        }
    }
}

/// Outcome of one (region, year, month) job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobReport {
    pub region: String,
    pub year: i32,
    pub month: u32,
    pub scenes_found: usize,
    pub scenes_used: usize,
    pub scenes_dropped: usize,
    /// Pixels with at least one valid observation
    pub valid_pixels: usize,
    pub output: Option<PathBuf>,
}

/// A job that failed, with enough context to re-run just that unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFailure {
    pub region: String,
    pub year: i32,
    pub month: u32,
    pub configuration: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub processed: usize,
    /// Jobs that completed with no usable scene (explicitly empty composite)
    pub empty: usize,
    pub failed: usize,
    pub jobs: Vec<JobReport>,
    pub failures: Vec<JobFailure>,
}

/// Output grid of a region at the run's ground sample distance.
pub fn region_grid(region: &RegionConfig, params: &RetrievalParams) -> Result<GridSpec> {
    GridSpec::from_bbox(&region.bounds, params.gsd)
}

/// Per-region retrieval state: grid, coordinate bands and land-cover cache.
pub fn region_context<'a>(
    region: &RegionConfig,
    assets: &RetrievalAssets<'a>,
    params: &RetrievalParams,
) -> Result<RetrievalContext<'a>> {
    let grid = region_grid(region, params)?;
    info!(
        "Region {}: grid {}x{} at gsd {}",
        region.id, grid.width, grid.height, params.gsd
    );
    Ok(RetrievalContext::new(
        assets.registry,
        assets.hulls,
        assets.landcover,
        grid,
        params.include_non_vegetated,
    ))
}

/// `<out>/<year>/<Mon>/<region>_<year>_<MM>_LAI.tif`
pub fn output_path(output_dir: &Path, region: &str, window: &MonthWindow) -> PathBuf {
    output_dir
        .join(window.year.to_string())
        .join(window.month_abbrev())
        .join(format!(
            "{}_{}_{:02}_LAI.tif",
            region, window.year, window.month
        ))
}

enum SceneOutcome {
    Used(Box<SceneRetrieval>),
    Dropped,
    Fatal(Error),
}

fn process_scene(
    info: &SceneInfo,
    scenes: &dyn SceneSource,
    ctx: &RetrievalContext<'_>,
) -> SceneOutcome {
    let scene = match scenes.fetch(info, &ctx.grid) {
        Ok(scene) => scene,
        Err(e) => {
            warn!("Dropping scene {}: fetch failed: {}", info.id, e);
            return SceneOutcome::Dropped;
        }
    };
    match retrieve_scene(&scene, ctx) {
        Ok(r) => SceneOutcome::Used(Box::new(r)),
        Err(e) if e.is_configuration() => SceneOutcome::Fatal(e),
        Err(e) => {
            warn!("Dropping scene {}: retrieval failed: {}", info.id, e);
            SceneOutcome::Dropped
        }
    }
}

/// Every scene's sensor must be known and fully covered by models and hull
/// tables before any pixel is processed.
fn check_sensors(found: &[SceneInfo], ctx: &RetrievalContext<'_>) -> Result<()> {
    for info in found {
        let sensor: Sensor = info.spacecraft.parse()?;
        ctx.check_group(sensor.group())?;
    }
    Ok(())
}

/// Composite one region-month in memory.
pub fn composite_region_month(
    region: &RegionConfig,
    window: &MonthWindow,
    scenes: &dyn SceneSource,
    ctx: &RetrievalContext<'_>,
    params: &RetrievalParams,
) -> Result<(MonthlyComposite, JobReport)> {
    let query = SceneQuery {
        start: window.start,
        end: window.end,
        bounds: region.bounds,
        max_cloud_cover: params.cloud_cover_max,
    };
    let found = scenes
        .query(&query)
        .map_err(|e| match e {
            Error::SourceUnavailable(_) => e,
            other => Error::SourceUnavailable(other.to_string()),
        })?;
    info!(
        "Region {} {}-{:02}: {} candidate scenes",
        region.id,
        window.year,
        window.month,
        found.len()
    );
    check_sensors(&found, ctx)?;

    let outcomes: Vec<SceneOutcome> = found
        .par_iter()
        .map(|info| process_scene(info, scenes, ctx))
        .collect();

    let mut compositor = MonthlyCompositor::new(ctx.grid.shape(), params.reducer);
    let mut dropped = 0usize;
    for outcome in outcomes {
        match outcome {
            SceneOutcome::Used(r) => compositor.add(&r.lai_scaled, &r.qa)?,
            SceneOutcome::Dropped => dropped += 1,
            SceneOutcome::Fatal(e) => return Err(e),
        }
    }
    let used = compositor.len();
    let composite = compositor.finish();

    let report = JobReport {
        region: region.id.clone(),
        year: window.year,
        month: window.month,
        scenes_found: found.len(),
        scenes_used: used,
        scenes_dropped: dropped,
        valid_pixels: composite.valid_pixels(),
        output: None,
    };
    Ok((composite, report))
}

pub fn composite_metadata(
    region: &RegionConfig,
    window: &MonthWindow,
    grid: &GridSpec,
    params: &RetrievalParams,
    scenes_used: usize,
    registry: &ModelRegistry,
) -> CompositeMetadata {
    CompositeMetadata {
        region: region.id.clone(),
        year: window.year,
        month: window.month,
        start_millis: window.start_millis(),
        end_millis: window.end_millis(),
        scale_factor: LAI_SCALE_FACTOR,
        reducer: params.reducer,
        cloud_cover_max: params.cloud_cover_max,
        include_non_vegetated: params.include_non_vegetated,
        algorithm_version: params.algorithm_version.clone(),
        crs: params.output_crs.clone(),
        gsd: params.gsd,
        geotransform: grid.geotransform,
        scenes_used,
        model_registry_version: registry.version().map(str::to_string),
        created: Utc::now().to_rfc3339(),
    }
}

/// Composite one region-month and write the GeoTIFF plus JSON sidecar.
/// Nothing is written when the job fails.
pub fn process_region_month_to_path(
    region: &RegionConfig,
    window: &MonthWindow,
    scenes: &dyn SceneSource,
    ctx: &RetrievalContext<'_>,
    params: &RetrievalParams,
    output_dir: &Path,
) -> Result<JobReport> {
    let (composite, mut report) = composite_region_month(region, window, scenes, ctx, params)?;

    let output = output_path(output_dir, &region.id, window);
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let meta = composite_metadata(
        region,
        window,
        &ctx.grid,
        params,
        report.scenes_used,
        ctx.registry,
    );
    if let Err(e) = write_outputs(&output, &composite, &meta) {
        remove_partial_outputs(&output);
        return Err(e);
    }

    info!(
        "Wrote {:?} ({} scenes, {} valid pixels)",
        output, report.scenes_used, report.valid_pixels
    );
    report.output = Some(output);
    Ok(report)
}

fn write_outputs(output: &Path, composite: &MonthlyComposite, meta: &CompositeMetadata) -> Result<()> {
    let mut ds = write_composite_tiff(output, &composite.lai, &composite.count)?;
    embed_tiff_metadata(&mut ds, meta)?;
    drop(ds);
    create_metadata_sidecar(output, meta)?;
    Ok(())
}

/// Best-effort removal of whatever a failed write left behind.
fn remove_partial_outputs(output: &Path) {
    for path in [output.to_path_buf(), sidecar_path(output)] {
        match std::fs::remove_file(&path) {
            Ok(()) => warn!("Removed partial output {:?}", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove partial output {:?}: {}", path, e),
        }
    }
}

fn record_failure(report: &mut BatchReport, region: &str, year: i32, month: u32, e: Error) {
    let e = e.in_job(region, year, month);
    error!("{}", e);
    report.failed += 1;
    report.failures.push(JobFailure {
        region: region.to_string(),
        year,
        month,
        configuration: e.is_configuration(),
        message: e.to_string(),
    });
}

/// Run every (region, month) job. A failed job is recorded and never aborts
/// its siblings.
pub fn process_batch(
    regions: &[RegionConfig],
    year: i32,
    months: &[u32],
    assets: &RetrievalAssets<'_>,
    params: &RetrievalParams,
    output_dir: &Path,
) -> Result<BatchReport> {
    params.validate()?;
    std::fs::create_dir_all(output_dir)?;
    let mut report = BatchReport::default();

    for region in regions {
        let ctx = match region_context(region, assets, params) {
            Ok(ctx) => ctx,
            Err(e) => {
                let message = e.to_string();
                for &month in months {
                    record_failure(
                        &mut report,
                        &region.id,
                        year,
                        month,
                        Error::Processing(message.clone()),
                    );
                }
                continue;
            }
        };
        for &month in months {
            let result = MonthWindow::new(year, month).and_then(|window| {
                process_region_month_to_path(
                    region,
                    &window,
                    assets.scenes,
                    &ctx,
                    params,
                    output_dir,
                )
            });
            match result {
                Ok(job) => {
                    if job.scenes_used == 0 {
                        report.empty += 1;
                    } else {
                        report.processed += 1;
                    }
                    report.jobs.push(job);
                }
                Err(e) => record_failure(&mut report, &region.id, year, month, e),
            }
        }
    }

    info!(
        "Batch complete: processed={} empty={} failed={}",
        report.processed, report.empty, report.failed
    );
    Ok(report)
}
