use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unknown region: {region}. Configured: {available}")]
    UnknownRegion { region: String, available: String },

    #[error("No .tif/.tiff files found in: {dir}")]
    NoInputs { dir: String },

    #[error("{failed} of {total} jobs failed")]
    JobsFailed { failed: usize, total: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Lai(#[from] laipro::Error),
}
