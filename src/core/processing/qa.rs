//! Per-pixel quality flags and the fixed-point LAI encoding.
use ndarray::{Array2, Zip};

use crate::core::hull::ConvexHull;
use crate::core::processing::regress::FeatureInputs;
use crate::types::Biome;

/// Reflectances outside the training hull (or outside its range envelope).
pub const QA_OUT_OF_HULL: u8 = 1 << 0;
/// Raw LAI prediction outside `[LAI_MIN, LAI_MAX]`.
pub const QA_LAI_OUT_OF_RANGE: u8 = 1 << 1;
/// Pixel classified as non-vegetated.
pub const QA_NON_VEGETATED: u8 = 1 << 2;

const QA_INVALID_MASK: u8 = QA_OUT_OF_HULL | QA_LAI_OUT_OF_RANGE;

pub const LAI_MIN: f64 = 0.0;
pub const LAI_MAX: f64 = 8.0;
pub const LAI_SCALE: f64 = 100.0;
/// Multiply stored LAI by this to recover physical units.
pub const LAI_SCALE_FACTOR: f64 = 0.01;
pub const LAI_NODATA: u16 = u16::MAX;

/// Bit 0 and bit 1 clear; bit 2 alone does not invalidate a pixel.
#[inline]
pub fn is_valid(qa: u8) -> bool {
    qa & QA_INVALID_MASK == 0
}

/// Flags for one pixel. `lai` is `None` where no model produced a prediction.
#[inline]
pub fn qa_flags(in_hull: bool, lai: Option<f64>, biome: Option<Biome>) -> u8 {
    let mut flags = 0;
    if !in_hull {
        flags |= QA_OUT_OF_HULL;
    }
    if let Some(v) = lai {
        if !(LAI_MIN..=LAI_MAX).contains(&v) {
            flags |= QA_LAI_OUT_OF_RANGE;
        }
    }
    if biome == Some(Biome::NON_VEGETATED) {
        flags |= QA_NON_VEGETATED;
    }
    flags
}

/// Clamp to the physical range, then scale to hundredths.
#[inline]
pub fn encode_lai(lai: f64) -> u16 {
    (lai.clamp(LAI_MIN, LAI_MAX) * LAI_SCALE).round() as u16
}

#[inline]
pub fn decode_lai(scaled: u16) -> Option<f64> {
    (scaled != LAI_NODATA).then(|| scaled as f64 * LAI_SCALE_FACTOR)
}

/// QA raster for a scene. `raw_lai` is `None` for pixels no model wrote.
pub fn encode_qa(
    hull: &ConvexHull,
    inputs: &FeatureInputs<'_>,
    raw_lai: &Array2<Option<f64>>,
    biomes: &Array2<Option<Biome>>,
) -> Array2<u8> {
    let mut qa = Array2::zeros(raw_lai.dim());
    Zip::indexed(&mut qa)
        .and(raw_lai)
        .and(biomes)
        .par_for_each(|idx, q, &lai, &b| {
            let in_hull = hull.contains(
                inputs.red[idx],
                inputs.green[idx],
                inputs.nir[idx],
                inputs.swir1[idx],
            );
            *q = qa_flags(in_hull, lai, b);
        });
    qa
}
