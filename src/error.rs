//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Converts underlying I/O, JSON, and GDAL errors, and provides semantic variants
//! for configuration faults (unknown sensor, missing model key, missing land-cover
//! epoch) and for per-scene fetch failures.
use thiserror::Error;

use crate::types::{Biome, SensorGroup};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] crate::io::GdalError),

    #[error("Unknown sensor identifier: {0}")]
    UnknownSensor(String),

    #[error("No regression model for sensor group {group}, biome {biome}")]
    MissingModel { group: SensorGroup, biome: Biome },

    #[error("No convex-hull table for sensor group {0}")]
    MissingHullTable(SensorGroup),

    #[error("Land-cover epoch {epoch} unavailable: {reason}")]
    LandCoverEpoch { epoch: u16, reason: String },

    #[error("Acquisition year {0} is before the earliest supported year")]
    UnsupportedYear(i32),

    #[error("Band `{band}` missing from scene {scene}")]
    MissingBand { scene: String, band: String },

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("Scene source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Failed to fetch scene {scene}: {reason}")]
    SceneFetch { scene: String, reason: String },

    #[error("Job failed for region {region} {year}-{month:02}: {source}")]
    Job {
        region: String,
        year: i32,
        month: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("Processing error: {0}")]
    Processing(String),
}

impl Error {
    /// Errors that abort a whole (region, month) job before any output is written.
    pub fn is_configuration(&self) -> bool {
        match self {
            Error::UnknownSensor(_)
            | Error::MissingModel { .. }
            | Error::MissingHullTable(_)
            | Error::LandCoverEpoch { .. }
            | Error::UnsupportedYear(_) => true,
            Error::Job { source, .. } => source.is_configuration(),
            _ => false,
        }
    }

    pub fn in_job(self, region: &str, year: i32, month: u32) -> Self {
        Error::Job {
            region: region.to_string(),
            year,
            month,
            source: Box::new(self),
        }
    }
}
