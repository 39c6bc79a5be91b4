use gdal::raster::ResampleAlg;
use gdal::{Dataset, Metadata, errors::GdalError as GdalCrateError};
use gdal_sys::GDALResampleAlg;
use ndarray::Array2;
use std::collections::HashMap;
use std::ffi::CString;
use std::path::Path;
use std::ptr;
use thiserror::Error;

/// Errors encountered when using GDAL reader
#[derive(Debug, Error)]
pub enum GdalError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] GdalCrateError),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Dimension mismatch: expected {0}x{1}, got {2}x{3}")]
    DimensionMismatch(usize, usize, usize, usize),
}

impl From<GdalCrateError> for crate::error::Error {
    fn from(e: GdalCrateError) -> Self {
        crate::error::Error::Gdal(GdalError::Gdal(e))
    }
}

/// Metadata extracted from a GDAL-supported dataset
#[derive(Debug, Clone)]
pub struct GdalMetadata {
    /// Width (pixels) of the raster
    pub size_x: usize,
    /// Height (lines) of the raster
    pub size_y: usize,
    /// Number of raster bands
    pub bands: usize,
    /// Affine geotransform coefficients ([origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height])
    pub geotransform: [f64; 6],
    /// Projection, as `EPSG:XXXX` when an authority code is present, else WKT
    pub projection: String,
    /// No-data value of each band (index 0 is band 1)
    pub nodata: Vec<Option<f64>>,
    /// Additional metadata key-value pairs
    pub metadata: HashMap<String, String>,
}

/// Reader for single- and multi-band rasters (GeoTIFF, VRT, ...) via GDAL
pub struct GdalRasterReader {
    pub dataset: Dataset,
    pub metadata: GdalMetadata,
    // Source of a warped view; declared after `dataset` so it is closed last.
    warp_source: Option<Dataset>,
}

// Helper to extract EPSG code from WKT authority tag
pub(crate) fn parse_epsg(wkt: &str) -> Option<String> {
    const KEY: &str = "AUTHORITY[\"EPSG\",\"";
    if let Some(idx) = wkt.rfind(KEY) {
        let start = idx + KEY.len();
        if let Some(end) = wkt[start..].find('"') {
            let code = &wkt[start..start + end];
            return Some(format!("EPSG:{}", code));
        }
    }
    None
}

impl GdalRasterReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GdalError> {
        Self::from_dataset(Dataset::open(path.as_ref())?)
    }

    fn from_dataset(dataset: Dataset) -> Result<Self, GdalError> {
        let (size_x, size_y) = dataset.raster_size();
        let bands = dataset.raster_count() as usize;
        if bands == 0 {
            return Err(GdalError::UnsupportedFormat("No raster bands found".into()));
        }
        let geotransform = match dataset.geo_transform() {
            Ok(gt) => gt,
            Err(_) => [0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        };
        let proj = dataset.projection();
        let projection = if proj.starts_with("EPSG:") {
            proj
        } else if let Some(code) = parse_epsg(&proj) {
            code
        } else {
            proj
        };
        let mut nodata = Vec::with_capacity(bands);
        for idx in 1..=bands {
            nodata.push(dataset.rasterband(idx)?.no_data_value());
        }
        // Collect metadata entries (domain "")
        let mut metadata_map = HashMap::new();
        if let Some(entries) = dataset.metadata_domain("") {
            for entry in entries {
                if let Some((key, val)) = entry.split_once('=') {
                    metadata_map.insert(key.to_string(), val.to_string());
                }
            }
        }
        Ok(GdalRasterReader {
            dataset,
            metadata: GdalMetadata {
                size_x,
                size_y,
                bands,
                geotransform,
                projection,
                nodata,
                metadata: metadata_map,
            },
            warp_source: None,
        })
    }

    /// Nearest-neighbour warped view of this raster in the CRS given as WKT.
    /// GDAL chooses the warped grid; band no-data carries over.
    pub fn into_warped(self, dst_wkt: &str) -> Result<Self, GdalError> {
        if self.warp_source.is_some() {
            return Err(GdalError::UnsupportedFormat("raster is already a warped view".into()));
        }
        let src_wkt = CString::new(self.dataset.projection()).map_err(GdalCrateError::from)?;
        let dst_wkt = CString::new(dst_wkt).map_err(GdalCrateError::from)?;
        // The warped VRT borrows the source handle; `warp_source` keeps it open.
        let handle = unsafe {
            gdal_sys::GDALAutoCreateWarpedVRT(
                self.dataset.c_dataset(),
                src_wkt.as_ptr(),
                dst_wkt.as_ptr(),
                GDALResampleAlg::GRA_NearestNeighbour,
                0.0,
                ptr::null(),
            )
        };
        if handle.is_null() {
            return Err(GdalCrateError::NullPointer {
                method_name: "GDALAutoCreateWarpedVRT",
                msg: format!("cannot warp to {}", dst_wkt.to_string_lossy()),
            }
            .into());
        }
        let mut warped = Self::from_dataset(unsafe { Dataset::from_c_dataset(handle) })?;
        warped.warp_source = Some(self.dataset);
        Ok(warped)
    }

    /// Read a full band (1-based index) as f64 with no-data mapped to NaN.
    pub fn read_band(&self, index: usize) -> Result<Array2<f64>, GdalError> {
        self.read_window(index, (0, 0), (self.metadata.size_x, self.metadata.size_y))
    }

    /// Read a `(width, height)` window at pixel `offset` of a band (1-based index)
    /// as f64 with no-data mapped to NaN.
    pub fn read_window(
        &self,
        index: usize,
        offset: (usize, usize),
        size: (usize, usize),
    ) -> Result<Array2<f64>, GdalError> {
        if index == 0 || index > self.metadata.bands {
            return Err(GdalError::UnsupportedFormat(format!(
                "Band index {} out of range",
                index
            )));
        }
        let band = self.dataset.rasterband(index)?;
        let buf = band.read_as::<f64>(
            (offset.0 as isize, offset.1 as isize),
            size,
            size,
            Some(ResampleAlg::NearestNeighbour),
        )?;
        let (w, h) = size;
        let mut array = Array2::from_shape_vec((h, w), buf.data().to_vec())
            .map_err(|_| GdalError::DimensionMismatch(w, h, w, h))?;
        if let Some(nd) = self.metadata.nodata[index - 1] {
            array.mapv_inplace(|v| if v == nd { f64::NAN } else { v });
        }
        Ok(array)
    }

    /// Pixel window `(offset, size)` of this raster overlapping the map-space box,
    /// or `None` when disjoint. North-up rasters only.
    pub fn window_for_bounds(
        &self,
        bounds: &crate::core::grid::BoundingBox,
    ) -> Option<((usize, usize), (usize, usize))> {
        let gt = &self.metadata.geotransform;
        let to_col = |x: f64| (x - gt[0]) / gt[1];
        let to_row = |y: f64| (y - gt[3]) / gt[5];
        let (c0, c1) = (to_col(bounds.min_lon), to_col(bounds.max_lon));
        let (r0, r1) = (to_row(bounds.max_lat), to_row(bounds.min_lat));
        let col_start = c0.min(c1).floor().max(0.0);
        let row_start = r0.min(r1).floor().max(0.0);
        let col_end = c0.max(c1).ceil().min(self.metadata.size_x as f64);
        let row_end = r0.max(r1).ceil().min(self.metadata.size_y as f64);
        if !(col_end > col_start && row_end > row_start) {
            return None;
        }
        Some((
            (col_start as usize, row_start as usize),
            ((col_end - col_start) as usize, (row_end - row_start) as usize),
        ))
    }

    /// Geotransform of a pixel window starting at `offset`.
    pub fn window_geotransform(&self, offset: (usize, usize)) -> [f64; 6] {
        let mut gt = self.metadata.geotransform;
        gt[0] += offset.0 as f64 * gt[1] + offset.1 as f64 * gt[2];
        gt[3] += offset.0 as f64 * gt[4] + offset.1 as f64 * gt[5];
        gt
    }
}
