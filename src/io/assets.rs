//! Loading of the frozen retrieval assets (model registry, convex-hull table).
//! Both are read once per run and shared read-only afterwards.
use std::fs;
use std::path::Path;

use tracing::info;

use crate::core::hull::{HullTable, HullTableFile};
use crate::core::model::{ModelRegistry, ModelRegistryFile};
use crate::error::Result;

pub fn load_model_registry<P: AsRef<Path>>(path: P) -> Result<ModelRegistry> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let file: ModelRegistryFile = serde_json::from_str(&text)?;
    let registry = ModelRegistry::from_file_contents(file)?;
    info!(
        "Loaded {} regression models from {:?} (version {})",
        registry.len(),
        path,
        registry.version().unwrap_or("unversioned")
    );
    Ok(registry)
}

pub fn load_hull_table<P: AsRef<Path>>(path: P) -> Result<HullTable> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let file: HullTableFile = serde_json::from_str(&text)?;
    let groups = file.groups.len();
    let table = HullTable::from_file_contents(file)?;
    info!("Loaded convex-hull tables for {} sensor groups from {:?}", groups, path);
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::{Biome, SensorGroup};

    const REGISTRY: &str = r#"{
        "version": "2021.1",
        "models": [
            {"sensor_group": "L8", "biome": 1, "model": {
                "kind": "random_forest",
                "trees": [{"nodes": [
                    {"feature": 6, "threshold": 0.5, "left": 1, "right": 2},
                    {"value": 1.0},
                    {"value": 4.0}
                ]}]
            }},
            {"sensor_group": "L5", "biome": 7, "model": {
                "kind": "linear", "intercept": 0.5,
                "coefficients": [0, 0, 0, 0, 0, 0, 2.0, 0, 0, 0]
            }}
        ]
    }"#;

    const HULLS: &str = r#"{
        "groups": {
            "L8": {
                "ranges": {"red": [0, 5000], "green": [0, 5000], "nir": [0, 8000], "swir1": [0, 6000]},
                "inside": [[0, 0, 0, 0], [1, 2, 3, 4]]
            }
        }
    }"#;

    #[test]
    fn registry_loads_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");
        fs::write(&path, REGISTRY).unwrap();
        let registry = load_model_registry(&path).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.version(), Some("2021.1"));
        assert!(registry.get(SensorGroup::L8, Biome::DECIDUOUS_FOREST).is_ok());
        assert!(matches!(
            registry.get(SensorGroup::L7, Biome::DECIDUOUS_FOREST),
            Err(Error::MissingModel { .. })
        ));
    }

    #[test]
    fn hull_table_loads_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hulls.json");
        fs::write(&path, HULLS).unwrap();
        let table = load_hull_table(&path).unwrap();
        let hull = table.get(SensorGroup::L8).unwrap();
        assert!(hull.contains(10.0, 10.0, 10.0, 10.0));
        assert!(hull.contains(600.0, 1100.0, 2500.0, 2500.0));
        assert!(!hull.contains(600.0, 1100.0, 2500.0, 10.0));
        assert!(table.get(SensorGroup::L5).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_model_registry("/nonexistent/models.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
