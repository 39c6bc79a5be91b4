//! Raster grid geometry: bounding boxes, north-up grids derived from a ground
//! sample distance, pixel-centre coordinates, and nearest-neighbour resampling
//! between grids by inverse geotransform lookup.
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon < other.max_lon
            && other.min_lon < self.max_lon
            && self.min_lat < other.max_lat
            && other.min_lat < self.max_lat
    }

    pub fn is_valid(&self) -> bool {
        self.min_lon < self.max_lon && self.min_lat < self.max_lat
    }
}

/// North-up raster grid: GDAL-style geotransform plus pixel dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// [origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height]
    pub geotransform: [f64; 6],
    pub width: usize,
    pub height: usize,
}

impl GridSpec {
    /// Grid covering `bbox` at `gsd` degrees per pixel, anchored at the upper-left corner.
    pub fn from_bbox(bbox: &BoundingBox, gsd: f64) -> Result<Self> {
        if !(gsd > 0.0) {
            return Err(Error::InvalidArgument {
                arg: "gsd",
                value: gsd.to_string(),
            });
        }
        if !bbox.is_valid() {
            return Err(Error::InvalidArgument {
                arg: "bbox",
                value: format!("{:?}", bbox),
            });
        }
        let width = ((bbox.max_lon - bbox.min_lon) / gsd).ceil().max(1.0) as usize;
        let height = ((bbox.max_lat - bbox.min_lat) / gsd).ceil().max(1.0) as usize;
        Ok(Self {
            geotransform: [bbox.min_lon, gsd, 0.0, bbox.max_lat, 0.0, -gsd],
            width,
            height,
        })
    }

    /// (rows, cols), matching `Array2::dim()`.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn is_north_up(&self) -> bool {
        self.geotransform[2] == 0.0 && self.geotransform[4] == 0.0
    }

    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        pixel_center(&self.geotransform, row, col)
    }

    pub fn bounds(&self) -> BoundingBox {
        let gt = &self.geotransform;
        let x0 = gt[0];
        let x1 = gt[0] + gt[1] * self.width as f64;
        let y0 = gt[3];
        let y1 = gt[3] + gt[5] * self.height as f64;
        BoundingBox {
            min_lon: x0.min(x1),
            min_lat: y0.min(y1),
            max_lon: x0.max(x1),
            max_lat: y0.max(y1),
        }
    }

    /// Sub-grid of `size` (cols, rows) starting at pixel `offset` (col, row).
    pub fn window(&self, offset: (usize, usize), size: (usize, usize)) -> GridSpec {
        let mut gt = self.geotransform;
        gt[0] += offset.0 as f64 * gt[1] + offset.1 as f64 * gt[2];
        gt[3] += offset.0 as f64 * gt[4] + offset.1 as f64 * gt[5];
        GridSpec {
            geotransform: gt,
            width: size.0,
            height: size.1,
        }
    }

    /// Per-pixel longitude and latitude of pixel centres.
    pub fn coordinate_bands(&self) -> (Array2<f64>, Array2<f64>) {
        let shape = self.shape();
        let lon = Array2::from_shape_fn(shape, |(i, j)| self.pixel_center(i, j).0);
        let lat = Array2::from_shape_fn(shape, |(i, j)| self.pixel_center(i, j).1);
        (lon, lat)
    }
}

fn pixel_center(gt: &[f64; 6], row: usize, col: usize) -> (f64, f64) {
    let c = col as f64 + 0.5;
    let r = row as f64 + 0.5;
    (gt[0] + c * gt[1] + r * gt[2], gt[3] + c * gt[4] + r * gt[5])
}

/// Pixel (row, col) containing map coordinate (x, y) on a north-up grid.
pub fn pixel_index(gt: &[f64; 6], width: usize, height: usize, x: f64, y: f64) -> Option<(usize, usize)> {
    let col = ((x - gt[0]) / gt[1]).floor();
    let row = ((y - gt[3]) / gt[5]).floor();
    if !col.is_finite() || !row.is_finite() || col < 0.0 || row < 0.0 {
        return None;
    }
    let (row, col) = (row as usize, col as usize);
    (row < height && col < width).then_some((row, col))
}

/// Resample `src` (georeferenced by `src_gt`) onto `dst` by nearest neighbour.
/// Destination pixels whose centre falls outside the source get `fill`.
pub fn resample_nearest(
    src: &Array2<f64>,
    src_gt: &[f64; 6],
    dst: &GridSpec,
    fill: f64,
) -> Result<Array2<f64>> {
    if src_gt[2] != 0.0 || src_gt[4] != 0.0 || !dst.is_north_up() {
        return Err(Error::Processing(
            "nearest-neighbour resampling requires north-up grids".to_string(),
        ));
    }
    let (src_rows, src_cols) = src.dim();
    let mut out = Array2::from_elem(dst.shape(), fill);
    Zip::indexed(&mut out).par_for_each(|(i, j), v| {
        let (x, y) = dst.pixel_center(i, j);
        if let Some((r, c)) = pixel_index(src_gt, src_cols, src_rows, x, y) {
            *v = src[[r, c]];
        }
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bbox() -> BoundingBox {
        BoundingBox {
            min_lon: -100.0,
            min_lat: 40.0,
            max_lon: -99.0,
            max_lat: 40.5,
        }
    }

    #[test]
    fn grid_from_bbox_covers_extent() {
        let grid = GridSpec::from_bbox(&bbox(), 0.1).unwrap();
        assert_eq!(grid.shape(), (5, 10));
        let (x, y) = grid.pixel_center(0, 0);
        assert_relative_eq!(x, -99.95, epsilon = 1e-9);
        assert_relative_eq!(y, 40.45, epsilon = 1e-9);
        let b = grid.bounds();
        assert_relative_eq!(b.max_lon, -99.0, epsilon = 1e-9);
        assert_relative_eq!(b.min_lat, 40.0, epsilon = 1e-9);
    }

    #[test]
    fn window_shifts_origin() {
        let grid = GridSpec::from_bbox(&bbox(), 0.1).unwrap();
        let w = grid.window((2, 1), (3, 2));
        assert_eq!(w.shape(), (2, 3));
        assert_relative_eq!(w.geotransform[0], -99.8, epsilon = 1e-9);
        assert_relative_eq!(w.geotransform[3], 40.4, epsilon = 1e-9);
    }

    #[test]
    fn rejects_non_positive_gsd() {
        assert!(GridSpec::from_bbox(&bbox(), 0.0).is_err());
    }

    #[test]
    fn coordinate_bands_follow_pixel_centres() {
        let grid = GridSpec::from_bbox(&bbox(), 0.25).unwrap();
        let (lon, lat) = grid.coordinate_bands();
        assert_relative_eq!(lon[[1, 3]], -99.125, epsilon = 1e-9);
        assert_relative_eq!(lat[[1, 3]], 40.125, epsilon = 1e-9);
    }

    #[test]
    fn bbox_intersection() {
        let a = bbox();
        let b = BoundingBox {
            min_lon: -99.5,
            min_lat: 40.4,
            max_lon: -98.0,
            max_lat: 41.0,
        };
        let c = BoundingBox {
            min_lon: -98.0,
            min_lat: 40.0,
            max_lon: -97.0,
            max_lat: 40.5,
        };
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn nearest_resample_downsamples_and_fills_outside() {
        // 4x4 source at 0.5 deg, destination 1 deg shifted half a degree west
        let src = Array2::from_shape_fn((4, 4), |(i, j)| (i * 4 + j) as f64);
        let src_gt = [0.0, 0.5, 0.0, 2.0, 0.0, -0.5];
        let dst = GridSpec {
            geotransform: [-1.0, 1.0, 0.0, 2.0, 0.0, -1.0],
            width: 3,
            height: 2,
        };
        let out = resample_nearest(&src, &src_gt, &dst, -1.0).unwrap();
        assert_eq!(out[[0, 0]], -1.0);
        // centre (0.5, 1.5) -> src col 1, row 1
        assert_eq!(out[[0, 1]], 5.0);
        // centre (1.5, 0.5) -> src col 3, row 3
        assert_eq!(out[[1, 2]], 15.0);
    }
}
