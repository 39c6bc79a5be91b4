//! Shared types and enums used across LAIPRO.
//! Includes `Sensor` and its `SensorGroup`, the canonical band set (`CanonicalBand`),
//! the `Biome` stratum, the compositing `Reducer`, and the mosaic `MergePolicy`.
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Landsat instrument generation that acquired a scene.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Sensor {
    Landsat5,
    Landsat7,
    Landsat8,
    Landsat9,
}

impl Sensor {
    pub fn group(self) -> SensorGroup {
        match self {
            Sensor::Landsat5 => SensorGroup::L5,
            Sensor::Landsat7 => SensorGroup::L7,
            Sensor::Landsat8 | Sensor::Landsat9 => SensorGroup::L8,
        }
    }
}

impl FromStr for Sensor {
    type Err = Error;

    /// Accepts spacecraft ids (`LANDSAT_8`) and collection prefixes (`LC08`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LANDSAT_5" | "LT05" | "LT5" => Ok(Sensor::Landsat5),
            "LANDSAT_7" | "LE07" | "LE7" => Ok(Sensor::Landsat7),
            "LANDSAT_8" | "LC08" | "LC8" => Ok(Sensor::Landsat8),
            "LANDSAT_9" | "LC09" | "LC9" => Ok(Sensor::Landsat9),
            _ => Err(Error::UnknownSensor(s.to_string())),
        }
    }
}

impl std::fmt::Display for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Sensor::Landsat5 => "LANDSAT_5",
            Sensor::Landsat7 => "LANDSAT_7",
            Sensor::Landsat8 => "LANDSAT_8",
            Sensor::Landsat9 => "LANDSAT_9",
        };
        write!(f, "{}", s)
    }
}

/// Sensors whose band layouts and trained models are interchangeable.
/// Landsat 8 and 9 share a group.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum SensorGroup {
    L5,
    L7,
    L8,
}

impl SensorGroup {
    pub const ALL: [SensorGroup; 3] = [SensorGroup::L5, SensorGroup::L7, SensorGroup::L8];
}

impl std::fmt::Display for SensorGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorGroup::L5 => write!(f, "L5"),
            SensorGroup::L7 => write!(f, "L7"),
            SensorGroup::L8 => write!(f, "L8"),
        }
    }
}

/// Canonical reflectance band names every scene is normalized to.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum CanonicalBand {
    Blue,
    Green,
    Red,
    Nir,
    Swir1,
    Swir2,
    Qa,
}

impl CanonicalBand {
    pub const ALL: [CanonicalBand; 7] = [
        CanonicalBand::Blue,
        CanonicalBand::Green,
        CanonicalBand::Red,
        CanonicalBand::Nir,
        CanonicalBand::Swir1,
        CanonicalBand::Swir2,
        CanonicalBand::Qa,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CanonicalBand::Blue => "blue",
            CanonicalBand::Green => "green",
            CanonicalBand::Red => "red",
            CanonicalBand::Nir => "nir",
            CanonicalBand::Swir1 => "swir1",
            CanonicalBand::Swir2 => "swir2",
            CanonicalBand::Qa => "qa",
        }
    }
}

impl std::fmt::Display for CanonicalBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Land-cover stratum used to select a regression model.
/// 0 is non-vegetated; 1..=8 are vegetation types.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Biome(u8);

impl Biome {
    pub const NON_VEGETATED: Biome = Biome(0);
    pub const DECIDUOUS_FOREST: Biome = Biome(1);
    pub const EVERGREEN_FOREST: Biome = Biome(2);
    pub const MIXED_FOREST: Biome = Biome(3);
    pub const SHRUBLAND: Biome = Biome(4);
    pub const GRASSLAND: Biome = Biome(5);
    pub const PASTURE: Biome = Biome(6);
    pub const CROPLAND: Biome = Biome(7);
    pub const WETLAND: Biome = Biome(8);

    pub const VEGETATED: [Biome; 8] = [
        Biome(1),
        Biome(2),
        Biome(3),
        Biome(4),
        Biome(5),
        Biome(6),
        Biome(7),
        Biome(8),
    ];

    pub fn new(code: u8) -> Option<Self> {
        (code <= 8).then_some(Biome(code))
    }

    pub fn code(self) -> u8 {
        self.0
    }

    pub fn is_vegetated(self) -> bool {
        self.0 != 0
    }
}

impl TryFrom<u8> for Biome {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Biome::new(code).ok_or_else(|| format!("biome code {} outside 0..=8", code))
    }
}

impl From<Biome> for u8 {
    fn from(b: Biome) -> u8 {
        b.0
    }
}

impl std::fmt::Display for Biome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pixel-wise reducer applied to a month's stack of valid retrievals.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    Median,
    Mean,
}

impl std::fmt::Display for Reducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reducer::Median => write!(f, "median"),
            Reducer::Mean => write!(f, "mean"),
        }
    }
}

/// Which raster wins where mosaic inputs overlap.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Last-write-wins: every valid source pixel overwrites the output.
    Src,
    /// First-write-wins: source pixels only fill output gaps.
    Dest,
}

impl std::fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergePolicy::Src => write!(f, "src"),
            MergePolicy::Dest => write!(f, "dest"),
        }
    }
}
