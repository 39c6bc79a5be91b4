//! Month-level temporal reduction.
//!
//! Scenes for one (region, month) are pushed into a [`MonthlyCompositor`] as
//! QA-masked scaled LAI rasters; [`MonthlyCompositor::finish`] reduces the
//! stack pixel-wise and counts contributing observations.
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use ndarray::{Array2, Zip};
use tracing::debug;

use crate::core::processing::qa::{is_valid, LAI_NODATA};
use crate::error::{Error, Result};
use crate::types::Reducer;

/// Half-open calendar month `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub year: i32,
    pub month: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MonthWindow {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        let invalid = || Error::InvalidArgument {
            arg: "month",
            value: format!("{}-{:02}", year, month),
        };
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(invalid)?;
        let start = Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0).ok_or_else(invalid)?);
        let end = Utc.from_utc_datetime(&next.and_hms_opt(0, 0, 0).ok_or_else(invalid)?);
        Ok(Self {
            year,
            month,
            start,
            end,
        })
    }

    pub fn contains(&self, t: &DateTime<Utc>) -> bool {
        *t >= self.start && *t < self.end
    }

    pub fn start_millis(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_millis(&self) -> i64 {
        self.end.timestamp_millis()
    }

    /// Three-letter month name used in output directory names.
    pub fn month_abbrev(&self) -> String {
        self.start.format("%b").to_string()
    }

    pub fn days(&self) -> i64 {
        (self.end.date_naive() - self.start.date_naive()).num_days()
    }
}

/// Composite bands for one (region, month).
#[derive(Debug, Clone)]
pub struct MonthlyComposite {
    /// Scaled LAI (×100), `LAI_NODATA` where no scene contributed.
    pub lai: Array2<u16>,
    /// Number of valid observations per pixel.
    pub count: Array2<u16>,
    pub scenes: usize,
}

impl MonthlyComposite {
    /// Explicitly empty month: all no-data, zero count.
    pub fn empty(shape: (usize, usize)) -> Self {
        Self {
            lai: Array2::from_elem(shape, LAI_NODATA),
            count: Array2::zeros(shape),
            scenes: 0,
        }
    }

    pub fn valid_pixels(&self) -> usize {
        self.count.iter().filter(|&&c| c > 0).count()
    }
}

/// Masked stack of scaled-LAI observations awaiting reduction.
#[derive(Debug)]
pub struct MonthlyCompositor {
    shape: (usize, usize),
    reducer: Reducer,
    stack: Vec<Array2<Option<u16>>>,
}

impl MonthlyCompositor {
    pub fn new(shape: (usize, usize), reducer: Reducer) -> Self {
        Self {
            shape,
            reducer,
            stack: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Push a scene's scaled LAI, keeping only pixels whose QA is valid.
    pub fn add(&mut self, lai_scaled: &Array2<u16>, qa: &Array2<u8>) -> Result<()> {
        for dim in [lai_scaled.dim(), qa.dim()] {
            if dim != self.shape {
                return Err(Error::ShapeMismatch {
                    expected: self.shape,
                    actual: dim,
                });
            }
        }
        let mut masked = Array2::from_elem(self.shape, None);
        Zip::from(&mut masked)
            .and(lai_scaled)
            .and(qa)
            .par_for_each(|m, &v, &q| {
                if is_valid(q) && v != LAI_NODATA {
                    *m = Some(v);
                }
            });
        self.stack.push(masked);
        Ok(())
    }

    pub fn finish(self) -> MonthlyComposite {
        let scenes = self.stack.len();
        if scenes == 0 {
            return MonthlyComposite::empty(self.shape);
        }
        let mut lai = Array2::from_elem(self.shape, LAI_NODATA);
        let mut count = Array2::zeros(self.shape);
        let reducer = self.reducer;
        let stack = &self.stack;
        Zip::indexed(&mut lai)
            .and(&mut count)
            .par_for_each(|idx, out, n| {
                let mut values: Vec<f64> = stack
                    .iter()
                    .filter_map(|layer| layer[idx])
                    .map(f64::from)
                    .collect();
                *n = values.len() as u16;
                if let Some(v) = reduce(&mut values, reducer) {
                    *out = v.round() as u16;
                }
            });
        debug!("Composited {} scenes with {} reducer", scenes, reducer);
        MonthlyComposite { lai, count, scenes }
    }
}

/// Central tendency of `values`; `None` when empty. Reorders `values`.
pub fn reduce(values: &mut [f64], reducer: Reducer) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    match reducer {
        Reducer::Mean => Some(values.iter().sum::<f64>() / values.len() as f64),
        Reducer::Median => {
            values.sort_by(f64::total_cmp);
            let mid = values.len() / 2;
            if values.len() % 2 == 0 {
                Some((values[mid - 1] + values[mid]) / 2.0)
            } else {
                Some(values[mid])
            }
        }
    }
}
