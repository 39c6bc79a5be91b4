//! Sensor QA masking: cloud, cloud shadow, and water pixels from the
//! `QA_PIXEL` bitfield are set to no-data (NaN) in every canonical band.
use ndarray::{Array2, Zip};
use tracing::debug;

use crate::core::processing::normalize::NormalizedScene;
use crate::types::CanonicalBand;

pub const QA_CLOUD_BIT: u16 = 3;
pub const QA_CLOUD_SHADOW_BIT: u16 = 4;
pub const QA_WATER_BIT: u16 = 7;

const QA_REJECT_MASK: u16 = (1 << QA_CLOUD_BIT) | (1 << QA_CLOUD_SHADOW_BIT) | (1 << QA_WATER_BIT);

/// True when a `QA_PIXEL` value is clear of cloud, shadow and water.
/// Missing or non-integral QA values are never clear.
#[inline]
pub fn qa_is_clear(qa: f64) -> bool {
    if !qa.is_finite() || qa < 0.0 || qa > u16::MAX as f64 || qa.fract() != 0.0 {
        return false;
    }
    (qa as u16) & QA_REJECT_MASK == 0
}

pub fn clear_mask(qa: &Array2<f64>) -> Array2<bool> {
    qa.mapv(qa_is_clear)
}

/// Mask every band of `scene` in place; returns the clear-pixel mask.
pub fn apply_qa_mask(scene: &mut NormalizedScene) -> Array2<bool> {
    let mask = clear_mask(scene.band(CanonicalBand::Qa));
    for band in scene.bands_mut() {
        Zip::from(band).and(&mask).par_for_each(|v, &clear| {
            if !clear {
                *v = f64::NAN;
            }
        });
    }
    let masked = mask.iter().filter(|&&c| !c).count();
    debug!("QA mask removed {} of {} pixels", masked, mask.len());
    mask
}
