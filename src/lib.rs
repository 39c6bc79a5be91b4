#![doc = r#"
LAIPRO: biome-stratified Leaf Area Index retrieval from Landsat surface reflectance.

This crate turns Landsat 5/7/8/9 Collection 2 scenes into monthly LAI composites.
Each scene is normalized to a canonical band set, cloud/shadow/water pixels are
masked, spectral indices and solar geometry are derived, every pixel is assigned
a biome from an NLCD land-cover epoch, and the frozen regression model for that
(sensor group, biome) pair predicts LAI. Per-pixel QA flags record out-of-hull
reflectance, out-of-range LAI and non-vegetated pixels. A month's retrievals are
reduced (median or mean) into a two-band raster: scaled LAI and observation count.

Requirements
------------
- GDAL development headers and runtime available on your system.
- Rust 2024 edition toolchain.

Quick start: one region-month to a GeoTIFF
------------------------------------------
```rust,no_run
use std::path::Path;
use laipro::{
    process_region_month_to_path, region_context, LoadedAssets, MonthWindow,
    RegionConfig, RetrievalParams, RunConfig,
};

fn main() -> laipro::Result<()> {
    let config = RunConfig::from_file("run.json")?;
    let assets = LoadedAssets::load(&config.assets)?;
    let assets = assets.as_assets();
    let params = RetrievalParams::default();

    let region: &RegionConfig = &config.regions[0];
    let ctx = region_context(region, &assets, &params)?;
    let window = MonthWindow::new(2019, 7)?;

    let report = process_region_month_to_path(
        region,
        &window,
        assets.scenes,
        &ctx,
        &params,
        Path::new("/out"),
    )?;
    println!("{} scenes used, output {:?}", report.scenes_used, report.output);
    Ok(())
}
```

Batch
-----
```rust,no_run
use laipro::{process_batch, LoadedAssets, RunConfig};

fn main() -> laipro::Result<()> {
    let config = RunConfig::from_file("run.json")?;
    let assets = LoadedAssets::load(&config.assets)?;
    let report = process_batch(
        &config.regions,
        config.year,
        &config.months,
        &assets.as_assets(),
        &config.params,
        &config.output_dir,
    )?;
    println!("processed={} empty={} failed={}", report.processed, report.empty, report.failed);
    Ok(())
}
```

Error handling
--------------
All public functions return `laipro::Result<T>`. Configuration faults (unknown
sensor, missing model, missing land-cover epoch) satisfy
[`Error::is_configuration`] and abort only the affected (region, month) job.

Useful modules
--------------
- [`api`]: high-level entry points, batch runner and mosaic merge.
- [`core`]: grid geometry, models, hull tables and per-pixel processing stages.
- [`io`]: GDAL readers, scene and land-cover sources, asset loading, writers.
- [`types`]: sensors, canonical bands, biomes, reducers.
- [`error`]: crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
// Types
pub use crate::core::grid::{BoundingBox, GridSpec};
pub use crate::core::params::{RegionConfig, RetrievalParams, RunConfig};
pub use crate::core::processing::composite::{MonthWindow, MonthlyComposite};
pub use error::{Error, Result};
pub use types::{Biome, CanonicalBand, MergePolicy, Reducer, Sensor, SensorGroup};

// Assets and sources
pub use crate::core::hull::HullTable;
pub use crate::core::model::{ModelRegistry, Regressor};
pub use io::landcover::{GdalLandCoverSource, LandCoverSource};
pub use io::scene::{DirectorySceneSource, InMemorySceneSource, SceneSource};

// High-level API re-exports
pub use api::mosaic::{merge_to_reference_grid, MosaicOptions, MosaicReport};
pub use api::{
    BatchReport, JobReport, LoadedAssets, RetrievalAssets, composite_region_month,
    process_batch, process_region_month_to_path, region_context,
};
