use gdal::cpl::CslStringList;
use gdal::raster::{Buffer, ColorInterpretation};
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::Array2;
use std::path::Path;

use crate::core::processing::qa::{LAI_NODATA, LAI_SCALE_FACTOR};
use crate::io::gdal::GdalError;

pub const LAI_BAND_NAME: &str = "LAI";
pub const COUNT_BAND_NAME: &str = "COUNT";

fn tiled_options(compress: &str) -> Result<CslStringList, GdalError> {
    let mut options = CslStringList::new();
    options.set_name_value("TILED", "YES")?;
    options.set_name_value("COMPRESS", compress)?;
    options.set_name_value("BIGTIFF", "IF_SAFER")?;
    Ok(options)
}

fn write_band_u16(
    ds: &Dataset,
    index: usize,
    data: &Array2<u16>,
    description: &str,
) -> Result<(), GdalError> {
    let (rows, cols) = data.dim();
    let mut band = ds.rasterband(index)?;
    band.set_color_interpretation(ColorInterpretation::GrayIndex)?;
    band.set_description(description)?;
    let mut buf = Buffer::new((cols, rows), data.iter().copied().collect());
    band.write((0, 0), (cols, rows), &mut buf)?;
    Ok(())
}

/// Write the two-band composite: band 1 scaled LAI with no-data, band 2 observation count.
pub fn write_composite_tiff(
    output: &Path,
    lai: &Array2<u16>,
    count: &Array2<u16>,
) -> Result<Dataset, GdalError> {
    let (rows, cols) = lai.dim();
    if count.dim() != (rows, cols) {
        let (c_rows, c_cols) = count.dim();
        return Err(GdalError::DimensionMismatch(cols, rows, c_cols, c_rows));
    }
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let options = tiled_options("DEFLATE")?;
    let ds = driver.create_with_band_type_with_options::<u16, _>(output, cols, rows, 2, &options)?;

    write_band_u16(&ds, 1, lai, LAI_BAND_NAME)?;
    {
        let mut band = ds.rasterband(1)?;
        band.set_no_data_value(Some(LAI_NODATA as f64))?;
        band.set_scale(LAI_SCALE_FACTOR)?;
    }
    write_band_u16(&ds, 2, count, COUNT_BAND_NAME)?;

    Ok(ds)
}

/// Create a float32 single-band raster on a reference grid, pre-filled with `nodata`.
pub fn create_f32_tiff(
    output: &Path,
    cols: usize,
    rows: usize,
    geotransform: &[f64; 6],
    projection: &str,
    nodata: f64,
) -> Result<Dataset, GdalError> {
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut options = tiled_options("LZW")?;
    options.set_name_value("PREDICTOR", "2")?;
    let mut ds =
        driver.create_with_band_type_with_options::<f32, _>(output, cols, rows, 1, &options)?;
    ds.set_geo_transform(geotransform)?;
    if !projection.is_empty() {
        ds.set_spatial_ref(&SpatialRef::from_definition(projection)?)?;
    }
    let mut band = ds.rasterband(1)?;
    band.set_no_data_value(Some(nodata))?;
    band.fill(nodata, None)?;
    Ok(ds)
}

/// Write an f32 block at pixel `offset` (x, y) of band 1.
pub fn write_block_f32(
    ds: &Dataset,
    offset: (usize, usize),
    block: &Array2<f32>,
) -> Result<(), GdalError> {
    let (rows, cols) = block.dim();
    let mut band = ds.rasterband(1)?;
    let mut buf = Buffer::new((cols, rows), block.iter().copied().collect());
    band.write((offset.0 as isize, offset.1 as isize), (cols, rows), &mut buf)?;
    Ok(())
}

/// Read an f32 block at pixel `offset` (x, y) of band 1.
pub fn read_block_f32(
    ds: &Dataset,
    offset: (usize, usize),
    size: (usize, usize),
) -> Result<Array2<f32>, GdalError> {
    let band = ds.rasterband(1)?;
    let buf = band.read_as::<f32>((offset.0 as isize, offset.1 as isize), size, size, None)?;
    let (w, h) = size;
    Array2::from_shape_vec((h, w), buf.data().to_vec())
        .map_err(|_| GdalError::DimensionMismatch(w, h, w, h))
}

