//! I/O layer: GDAL-backed raster reading, scene and land-cover sources,
//! frozen model and hull-table assets, and `writers` for GeoTIFF outputs
//! with embedded metadata and JSON sidecars.
pub mod assets;
pub mod gdal;
pub use gdal::{GdalError, GdalMetadata, GdalRasterReader};

pub mod landcover;
pub use landcover::{GdalLandCoverSource, LandCoverSource};

pub mod scene;
pub use scene::{DirectorySceneSource, InMemorySceneSource, Scene, SceneInfo, SceneQuery, SceneSource};

pub mod writers;
