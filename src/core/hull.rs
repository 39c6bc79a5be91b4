//! Feature-space validity: the per-sensor-group valid reflectance ranges and the
//! precomputed convex-hull membership of discretized (red, green, nir, swir1) bins.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::SensorGroup;

/// Equal-width bins per band over its valid range.
pub const BIN_COUNT: usize = 10;
const TABLE_SIZE: usize = BIN_COUNT * BIN_COUNT * BIN_COUNT * BIN_COUNT;

/// Inclusive valid numeric range of the four hull bands, on the 0.0001 reflectance scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReflectanceRanges {
    pub red: [f64; 2],
    pub green: [f64; 2],
    pub nir: [f64; 2],
    pub swir1: [f64; 2],
}

impl ReflectanceRanges {
    fn validate(&self) -> Result<()> {
        for (name, [lo, hi]) in [
            ("red", self.red),
            ("green", self.green),
            ("nir", self.nir),
            ("swir1", self.swir1),
        ] {
            if !(lo < hi) {
                return Err(Error::InvalidArgument {
                    arg: "hull range",
                    value: format!("{}=[{}, {}]", name, lo, hi),
                });
            }
        }
        Ok(())
    }

    pub fn contains(&self, red: f64, green: f64, nir: f64, swir1: f64) -> bool {
        in_range(red, self.red) && in_range(green, self.green) && in_range(nir, self.nir) && in_range(swir1, self.swir1)
    }
}

fn in_range(v: f64, [lo, hi]: [f64; 2]) -> bool {
    v >= lo && v <= hi
}

/// Bin index of `v` within `range`; `None` outside the range or for NaN.
pub fn bin_index(v: f64, range: [f64; 2]) -> Option<usize> {
    if !in_range(v, range) {
        return None;
    }
    let [lo, hi] = range;
    let idx = ((v - lo) / (hi - lo) * BIN_COUNT as f64).floor() as usize;
    Some(idx.min(BIN_COUNT - 1))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HullGroupFile {
    pub ranges: ReflectanceRanges,
    /// In-hull bins as `[red, green, nir, swir1]`.
    pub inside: Vec<[u8; 4]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HullTableFile {
    pub groups: HashMap<SensorGroup, HullGroupFile>,
}

/// Dense 10x10x10x10 membership table for one sensor group.
#[derive(Debug, Clone)]
pub struct ConvexHull {
    pub ranges: ReflectanceRanges,
    members: Vec<bool>,
}

impl ConvexHull {
    pub fn new(ranges: ReflectanceRanges, inside: &[[u8; 4]]) -> Result<Self> {
        ranges.validate()?;
        let mut members = vec![false; TABLE_SIZE];
        for bins in inside {
            if bins.iter().any(|&b| b as usize >= BIN_COUNT) {
                return Err(Error::InvalidArgument {
                    arg: "hull bin",
                    value: format!("{:?}", bins),
                });
            }
            members[flat_index(bins.map(|b| b as usize))] = true;
        }
        Ok(Self { ranges, members })
    }

    /// False when any band is outside its range, otherwise the table lookup.
    pub fn contains(&self, red: f64, green: f64, nir: f64, swir1: f64) -> bool {
        let r = &self.ranges;
        match (
            bin_index(red, r.red),
            bin_index(green, r.green),
            bin_index(nir, r.nir),
            bin_index(swir1, r.swir1),
        ) {
            (Some(a), Some(b), Some(c), Some(d)) => self.members[flat_index([a, b, c, d])],
            _ => false,
        }
    }
}

fn flat_index([r, g, n, s]: [usize; 4]) -> usize {
    ((r * BIN_COUNT + g) * BIN_COUNT + n) * BIN_COUNT + s
}

/// Per-sensor-group hulls, loaded once and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct HullTable {
    groups: HashMap<SensorGroup, ConvexHull>,
}

impl HullTable {
    pub fn from_file_contents(file: HullTableFile) -> Result<Self> {
        let mut groups = HashMap::with_capacity(file.groups.len());
        for (group, g) in file.groups {
            groups.insert(group, ConvexHull::new(g.ranges, &g.inside)?);
        }
        Ok(Self { groups })
    }

    pub fn insert(&mut self, group: SensorGroup, hull: ConvexHull) {
        self.groups.insert(group, hull);
    }

    pub fn get(&self, group: SensorGroup) -> Result<&ConvexHull> {
        self.groups.get(&group).ok_or(Error::MissingHullTable(group))
    }
}
