//! Frozen per-(sensor group, biome) regressors and the registry that serves them.
//!
//! Models are trained elsewhere and shipped as JSON; nothing here mutates them
//! after loading. Tree ensembles use the usual `<=` goes left convention and
//! average their trees.
//!
//! ```json
//! {
//!   "version": "v0.2.0",
//!   "models": [
//!     {
//!       "sensor_group": "L8",
//!       "biome": 1,
//!       "model": {
//!         "kind": "random_forest",
//!         "trees": [
//!           { "nodes": [
//!               { "feature": 6, "threshold": 0.5, "left": 1, "right": 2 },
//!               { "value": 1.2 },
//!               { "value": 3.4 }
//!           ] }
//!         ]
//!       }
//!     }
//!   ]
//! }
//! ```
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Biome, SensorGroup};

pub const FEATURE_COUNT: usize = 10;

/// Regression inputs, in the order models were trained on.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Feature {
    Red,
    Green,
    Nir,
    Swir1,
    Latitude,
    Longitude,
    Ndvi,
    Ndwi,
    SolarZenith,
    SolarAzimuth,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::Red,
        Feature::Green,
        Feature::Nir,
        Feature::Swir1,
        Feature::Latitude,
        Feature::Longitude,
        Feature::Ndvi,
        Feature::Ndwi,
        Feature::SolarZenith,
        Feature::SolarAzimuth,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

pub type FeatureVector = [f64; FEATURE_COUNT];

/// A trained model mapping the fixed feature vector to an LAI estimate.
pub trait Regressor: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> f64;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Children must come after their parent, which also rules out cycles.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::Processing("regression tree has no nodes".to_string()));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = *node
            {
                if feature >= FEATURE_COUNT {
                    return Err(Error::Processing(format!(
                        "node {} splits on feature {} (only {} features)",
                        idx, feature, FEATURE_COUNT
                    )));
                }
                for child in [left, right] {
                    if child <= idx || child >= self.nodes.len() {
                        return Err(Error::Processing(format!(
                            "node {} has invalid child index {}",
                            idx, child
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn evaluate(&self, features: &FeatureVector) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                TreeNode::Leaf { value } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[feature] <= threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub trees: Vec<RegressionTree>,
}

impl Regressor for RandomForest {
    fn predict(&self, features: &FeatureVector) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.evaluate(features)).sum();
        sum / self.trees.len() as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: [f64; FEATURE_COUNT],
}

impl Regressor for LinearModel {
    fn predict(&self, features: &FeatureVector) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(features.iter())
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }
}

/// Serialized model variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrozenModel {
    RandomForest(RandomForest),
    Linear(LinearModel),
}

impl FrozenModel {
    pub fn validate(&self) -> Result<()> {
        match self {
            FrozenModel::RandomForest(rf) => {
                if rf.trees.is_empty() {
                    return Err(Error::Processing("random forest has no trees".to_string()));
                }
                rf.trees.iter().try_for_each(RegressionTree::validate)
            }
            FrozenModel::Linear(_) => Ok(()),
        }
    }
}

impl Regressor for FrozenModel {
    fn predict(&self, features: &FeatureVector) -> f64 {
        match self {
            FrozenModel::RandomForest(rf) => rf.predict(features),
            FrozenModel::Linear(lm) => lm.predict(features),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub sensor_group: SensorGroup,
    pub biome: Biome,
    pub model: FrozenModel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRegistryFile {
    #[serde(default)]
    pub version: Option<String>,
    pub models: Vec<ModelEntry>,
}

/// Read-only dispatch table from (sensor group, biome) to a frozen model.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    version: Option<String>,
    models: HashMap<(SensorGroup, Biome), FrozenModel>,
}

impl ModelRegistry {
    pub fn from_file_contents(file: ModelRegistryFile) -> Result<Self> {
        let mut models = HashMap::with_capacity(file.models.len());
        for entry in file.models {
            entry.model.validate()?;
            let key = (entry.sensor_group, entry.biome);
            if models.insert(key, entry.model).is_some() {
                return Err(Error::InvalidArgument {
                    arg: "models",
                    value: format!("duplicate entry for {} biome {}", key.0, key.1),
                });
            }
        }
        Ok(Self {
            version: file.version,
            models,
        })
    }

    /// Adds or replaces the model for `(group, biome)` after validating it.
    pub fn insert(&mut self, group: SensorGroup, biome: Biome, model: FrozenModel) -> Result<()> {
        model.validate()?;
        self.models.insert((group, biome), model);
        Ok(())
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn get(&self, group: SensorGroup, biome: Biome) -> Result<&FrozenModel> {
        self.models
            .get(&(group, biome))
            .ok_or(Error::MissingModel { group, biome })
    }

    /// Fails on the first biome without a model for `group`.
    pub fn require(&self, group: SensorGroup, biomes: &[Biome]) -> Result<()> {
        biomes.iter().try_for_each(|&b| self.get(group, b).map(|_| ()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(feature: Feature, threshold: f64, lo: f64, hi: f64) -> RegressionTree {
        RegressionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: feature.index(),
                    threshold,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: lo },
                TreeNode::Leaf { value: hi },
            ],
        }
    }

    #[test]
    fn forest_averages_trees_and_goes_left_on_equal() {
        let rf = RandomForest {
            trees: vec![
                stump(Feature::Ndvi, 0.5, 1.0, 3.0),
                stump(Feature::Nir, 2000.0, 2.0, 4.0),
            ],
        };
        let mut x = [0.0; FEATURE_COUNT];
        x[Feature::Ndvi.index()] = 0.5;
        x[Feature::Nir.index()] = 2500.0;
        assert_eq!(rf.predict(&x), 2.5);
    }

    #[test]
    fn linear_model_is_dot_product_plus_intercept() {
        let mut coefficients = [0.0; FEATURE_COUNT];
        coefficients[Feature::Ndvi.index()] = 4.0;
        let lm = LinearModel {
            intercept: 0.5,
            coefficients,
        };
        let mut x = [1.0; FEATURE_COUNT];
        x[Feature::Ndvi.index()] = 0.25;
        assert_eq!(lm.predict(&x), 1.5);
    }

    #[test]
    fn tree_validation_rejects_backward_edges() {
        let bad = RegressionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: 0.0,
                    left: 0,
                    right: 1,
                },
                TreeNode::Leaf { value: 1.0 },
            ],
        };
        assert!(bad.validate().is_err());
        assert!(stump(Feature::Red, 1.0, 0.0, 1.0).validate().is_ok());
    }

    #[test]
    fn registry_parses_json_and_reports_missing_keys() {
        let json = r#"{
            "version": "test",
            "models": [
                { "sensor_group": "L8", "biome": 1,
                  "model": { "kind": "random_forest", "trees": [ { "nodes": [
                      { "feature": 6, "threshold": 0.5, "left": 1, "right": 2 },
                      { "value": 1.0 }, { "value": 3.0 } ] } ] } },
                { "sensor_group": "L8", "biome": 2,
                  "model": { "kind": "linear", "intercept": 2.0,
                             "coefficients": [0,0,0,0,0,0,0,0,0,0] } }
            ]
        }"#;
        let file: ModelRegistryFile = serde_json::from_str(json).unwrap();
        let reg = ModelRegistry::from_file_contents(file).unwrap();
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.version(), Some("test"));
        assert!(reg.require(SensorGroup::L8, &[Biome::DECIDUOUS_FOREST, Biome::EVERGREEN_FOREST]).is_ok());
        let err = reg.require(SensorGroup::L8, &Biome::VEGETATED).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingModel { group: SensorGroup::L8, biome } if biome == Biome::MIXED_FOREST
        ));
        assert!(reg.get(SensorGroup::L5, Biome::DECIDUOUS_FOREST).is_err());
    }

    #[test]
    fn registry_rejects_duplicate_keys() {
        let model = FrozenModel::Linear(LinearModel {
            intercept: 1.0,
            coefficients: [0.0; FEATURE_COUNT],
        });
        let entry = ModelEntry {
            sensor_group: SensorGroup::L7,
            biome: Biome::GRASSLAND,
            model,
        };
        let file = ModelRegistryFile {
            version: None,
            models: vec![entry.clone(), entry],
        };
        assert!(ModelRegistry::from_file_contents(file).is_err());
    }

    #[test]
    fn insert_rejects_models_that_cannot_predict() {
        let mut reg = ModelRegistry::default();
        let empty_tree = FrozenModel::RandomForest(RandomForest {
            trees: vec![RegressionTree { nodes: Vec::new() }],
        });
        let empty_forest = FrozenModel::RandomForest(RandomForest { trees: Vec::new() });
        assert!(reg.insert(SensorGroup::L8, Biome::CROPLAND, empty_tree).is_err());
        assert!(reg.insert(SensorGroup::L8, Biome::CROPLAND, empty_forest).is_err());
        assert!(reg.is_empty());

        let forest = FrozenModel::RandomForest(RandomForest {
            trees: vec![stump(Feature::Ndvi, 0.5, 1.0, 3.0)],
        });
        reg.insert(SensorGroup::L8, Biome::CROPLAND, forest).unwrap();
        assert_eq!(reg.len(), 1);
    }
}
