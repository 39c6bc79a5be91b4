//! Block merge rule for mosaicking scaled per-region LAI onto a reference grid.
use ndarray::{Array2, Zip};

use crate::error::{Error, Result};
use crate::types::MergePolicy;

pub const DEFAULT_MOSAIC_NODATA: f64 = -9999.0;
pub const DEFAULT_BLOCK_SIZE: usize = 512;

#[inline]
fn is_set(v: f32, nodata: f32) -> bool {
    v.is_finite() && v != nodata
}

/// Merge a resampled source block into `dest`. Source pixels are valid when
/// finite and not `nodata`; valid ones are multiplied by `scale` first.
/// Returns the number of output pixels written.
pub fn merge_block(
    dest: &mut Array2<f32>,
    src: &Array2<f64>,
    policy: MergePolicy,
    scale: f64,
    nodata: f32,
) -> Result<usize> {
    if dest.dim() != src.dim() {
        return Err(Error::ShapeMismatch {
            expected: dest.dim(),
            actual: src.dim(),
        });
    }
    let mut written = 0usize;
    Zip::from(dest).and(src).for_each(|d, &s| {
        let s = s as f32;
        if !is_set(s, nodata) {
            return;
        }
        let take = match policy {
            MergePolicy::Src => true,
            MergePolicy::Dest => !is_set(*d, nodata),
        };
        if take {
            *d = (s as f64 * scale) as f32;
            written += 1;
        }
    });
    Ok(written)
}
