use std::fs;

use tracing::info;
use tracing_subscriber::EnvFilter;

use laipro::api::mosaic::{collect_inputs, merge_to_reference_grid, MosaicOptions};
use laipro::api::{process_batch, LoadedAssets};
use laipro::core::params::{RegionConfig, RunConfig};

use super::args::{CliArgs, Command, MosaicArgs, RetrieveArgs};
use super::errors::AppError;

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn apply_overrides(config: &mut RunConfig, args: &RetrieveArgs) {
    if let Some(year) = args.year {
        config.year = year;
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(month) = args.month {
        config.months = vec![month];
    }
    if let Some(reducer) = args.reducer {
        config.params.reducer = reducer;
    }
    if let Some(max) = args.cloud_cover_max {
        config.params.cloud_cover_max = max;
    }
    if args.include_non_vegetated {
        config.params.include_non_vegetated = true;
    }
}

fn selected_regions(config: &RunConfig, region: Option<&str>) -> Result<Vec<RegionConfig>, AppError> {
    match region {
        None => Ok(config.regions.clone()),
        Some(id) => config
            .region(id)
            .cloned()
            .map(|r| vec![r])
            .ok_or_else(|| AppError::UnknownRegion {
                region: id.to_string(),
                available: config
                    .regions
                    .iter()
                    .map(|r| r.id.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            }),
    }
}

fn run_retrieve(args: RetrieveArgs) -> Result<(), AppError> {
    let mut config = RunConfig::from_file(&args.config)?;
    apply_overrides(&mut config, &args);
    config.validate()?;
    let regions = selected_regions(&config, args.region.as_deref())?;

    info!(
        "Retrieving {} regions x {} months for {}",
        regions.len(),
        config.months.len(),
        config.year
    );
    let assets = LoadedAssets::load(&config.assets)?;
    let report = process_batch(
        &regions,
        config.year,
        &config.months,
        &assets.as_assets(),
        &config.params,
        &config.output_dir,
    )?;

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report).map_err(laipro::Error::from)?;
        fs::write(path, json)?;
        info!("Batch report written to {:?}", path);
    }

    info!("Processed: {}", report.processed);
    info!("Empty: {}", report.empty);
    info!("Failed: {}", report.failed);
    if report.failed > 0 {
        return Err(AppError::JobsFailed {
            failed: report.failed,
            total: report.processed + report.empty + report.failed,
        });
    }
    Ok(())
}

fn run_mosaic(args: MosaicArgs) -> Result<(), AppError> {
    let inputs: Vec<_> = collect_inputs(&args.input_dir, !args.no_recursive)?
        .into_iter()
        .filter(|p| *p != args.output)
        .collect();
    if inputs.is_empty() {
        return Err(AppError::NoInputs {
            dir: args.input_dir.display().to_string(),
        });
    }
    let options = MosaicOptions {
        policy: args.policy,
        block_size: args.block_size,
        nodata: args.nodata,
        recursive: !args.no_recursive,
        overviews: !args.no_overviews,
        ..MosaicOptions::default()
    };
    let report = merge_to_reference_grid(&inputs, &args.reference, &args.output, &options)?;
    info!(
        "Merged {} inputs ({} skipped, {} pixels written)",
        report.merged,
        report.skipped.len(),
        report.pixels_written
    );
    Ok(())
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(args.log);

    match args.command {
        Command::Retrieve(retrieve) => run_retrieve(retrieve)?,
        Command::Mosaic(mosaic) => run_mosaic(mosaic)?,
    }
    Ok(())
}
