//! GeoTIFF writers and metadata embedding/sidecars.
pub mod metadata;
pub mod tiff;
