use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use laipro::types::{MergePolicy, Reducer};

#[derive(Parser)]
#[command(name = "laipro", version, about = "LAIPRO CLI")]
pub struct CliArgs {
    /// Enable debug logging (RUST_LOG still takes precedence)
    #[arg(long, global = true, default_value_t = false)]
    pub log: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Retrieve monthly LAI composites for configured regions
    Retrieve(RetrieveArgs),
    /// Merge per-region monthly rasters onto a reference grid
    Mosaic(MosaicArgs),
}

#[derive(Args)]
pub struct RetrieveArgs {
    /// Run configuration (JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Only this region id (default: every configured region)
    #[arg(long)]
    pub region: Option<String>,

    /// Only this month, 1-12 (default: every configured month)
    #[arg(long)]
    pub month: Option<u32>,

    /// Override the configured year
    #[arg(long)]
    pub year: Option<i32>,

    /// Override the configured output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Override the pixel-wise reducer (median or mean)
    #[arg(long, value_enum)]
    pub reducer: Option<Reducer>,

    /// Override the scene cloud-cover ceiling (percent)
    #[arg(long)]
    pub cloud_cover_max: Option<f64>,

    /// Also retrieve LAI over non-vegetated pixels
    #[arg(long, default_value_t = false)]
    pub include_non_vegetated: bool,

    /// Write the batch report as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Args)]
pub struct MosaicArgs {
    /// Directory containing per-region GeoTIFFs for one year/month
    #[arg(short, long)]
    pub input_dir: PathBuf,

    /// Reference raster defining the output grid
    #[arg(short, long)]
    pub reference: PathBuf,

    /// Output mosaic GeoTIFF
    #[arg(short, long)]
    pub output: PathBuf,

    /// Overlap rule: src (last input wins) or dest (fill gaps only)
    #[arg(long, value_enum, default_value_t = MergePolicy::Src)]
    pub policy: MergePolicy,

    /// Processing block size in pixels
    #[arg(long, default_value_t = 512)]
    pub block_size: usize,

    /// Output no-data value (default: reference no-data, else -9999)
    #[arg(long)]
    pub nodata: Option<f64>,

    /// Only look at the top level of the input directory
    #[arg(long, default_value_t = false)]
    pub no_recursive: bool,

    /// Skip building overviews
    #[arg(long, default_value_t = false)]
    pub no_overviews: bool,
}
