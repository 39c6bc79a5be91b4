use gdal::Dataset;
use gdal::Metadata;
use gdal::spatial_ref::SpatialRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::Reducer;

/// Descriptive metadata for one (region, year, month) composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeMetadata {
    pub region: String,
    pub year: i32,
    pub month: u32,
    /// UTC month start, epoch milliseconds
    pub start_millis: i64,
    /// UTC month end (exclusive), epoch milliseconds
    pub end_millis: i64,
    pub scale_factor: f64,
    pub reducer: Reducer,
    pub cloud_cover_max: f64,
    pub include_non_vegetated: bool,
    pub algorithm_version: String,
    pub crs: String,
    pub gsd: f64,
    pub geotransform: [f64; 6],
    /// Scenes that entered the monthly stack
    pub scenes_used: usize,
    pub model_registry_version: Option<String>,
    pub created: String,
}

/// Flatten metadata into upper-case GDAL metadata items
pub fn extract_metadata_fields(meta: &CompositeMetadata) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();

    metadata.insert("REGION".to_string(), meta.region.clone());
    metadata.insert("YEAR".to_string(), meta.year.to_string());
    metadata.insert("MONTH".to_string(), meta.month.to_string());
    metadata.insert("START_MILLIS".to_string(), meta.start_millis.to_string());
    metadata.insert("END_MILLIS".to_string(), meta.end_millis.to_string());

    // Encoding
    metadata.insert("SCALE_FACTOR".to_string(), meta.scale_factor.to_string());
    metadata.insert("REDUCER".to_string(), meta.reducer.to_string());
    metadata.insert(
        "CLOUD_COVER_MAX".to_string(),
        meta.cloud_cover_max.to_string(),
    );
    metadata.insert(
        "INCLUDE_NON_VEGETATED".to_string(),
        meta.include_non_vegetated.to_string(),
    );
    metadata.insert("SCENES_USED".to_string(), meta.scenes_used.to_string());

    // Provenance
    metadata.insert(
        "ALGORITHM_VERSION".to_string(),
        meta.algorithm_version.clone(),
    );
    if let Some(version) = &meta.model_registry_version {
        metadata.insert("MODEL_REGISTRY_VERSION".to_string(), version.clone());
    }
    metadata.insert("CREATED".to_string(), meta.created.clone());
    metadata.insert("GSD".to_string(), meta.gsd.to_string());

    metadata
}

/// Convert metadata items to JSON values, keeping numbers and booleans typed
pub fn convert_metadata_to_json(
    metadata: &BTreeMap<String, String>,
) -> BTreeMap<String, serde_json::Value> {
    let mut json_metadata = BTreeMap::new();

    for (key, value) in metadata {
        let json_key = key.to_lowercase();

        let json_value = if let Ok(num) = value.parse::<i64>() {
            serde_json::Value::Number(serde_json::Number::from(num))
        } else if let Ok(b) = value.parse::<bool>() {
            serde_json::Value::Bool(b)
        } else if let Some(num) = value
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
        {
            serde_json::Value::Number(num)
        } else {
            serde_json::Value::String(value.clone())
        };
        json_metadata.insert(json_key, json_value);
    }

    json_metadata
}

/// Add fields that need array or non-item form in JSON
pub fn add_special_json_fields(
    json_metadata: &mut BTreeMap<String, serde_json::Value>,
    meta: &CompositeMetadata,
) {
    let geotransform: Vec<serde_json::Value> = meta
        .geotransform
        .iter()
        .filter_map(|&v| serde_json::Number::from_f64(v).map(serde_json::Value::Number))
        .collect();
    if geotransform.len() == 6 {
        json_metadata.insert(
            "geotransform".to_string(),
            serde_json::Value::Array(geotransform),
        );
    }
    if !meta.crs.is_empty() {
        json_metadata.insert(
            "crs".to_string(),
            serde_json::Value::String(meta.crs.clone()),
        );
    }
}

/// Set georeferencing and metadata items on a GeoTIFF dataset
pub fn embed_tiff_metadata(
    ds: &mut Dataset,
    meta: &CompositeMetadata,
) -> Result<(), gdal::errors::GdalError> {
    ds.set_geo_transform(&meta.geotransform)?;
    if !meta.crs.is_empty() {
        let srs = SpatialRef::from_definition(&meta.crs)?;
        ds.set_spatial_ref(&srs)?;
    }

    for (key, value) in extract_metadata_fields(meta) {
        ds.set_metadata_item(&key, &value, "")?;
    }

    Ok(())
}

pub fn sidecar_path(output_path: &Path) -> PathBuf {
    output_path.with_extension("json")
}

/// Write `<output>.json` next to a composite raster
pub fn create_metadata_sidecar(
    output_path: &Path,
    meta: &CompositeMetadata,
) -> crate::error::Result<PathBuf> {
    let metadata = extract_metadata_fields(meta);
    let mut json_metadata = convert_metadata_to_json(&metadata);
    add_special_json_fields(&mut json_metadata, meta);

    let path = sidecar_path(output_path);
    let json_string = serde_json::to_string_pretty(&json_metadata)?;
    std::fs::write(&path, json_string)?;

    info!("Created metadata sidecar: {:?}", path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::processing::composite::MonthWindow;
    use crate::core::processing::qa::LAI_SCALE_FACTOR;

    fn sample() -> CompositeMetadata {
        let window = MonthWindow::new(2019, 7).unwrap();
        CompositeMetadata {
            region: "IA".to_string(),
            year: 2019,
            month: 7,
            start_millis: window.start_millis(),
            end_millis: window.end_millis(),
            scale_factor: LAI_SCALE_FACTOR,
            reducer: Reducer::Median,
            cloud_cover_max: 70.0,
            include_non_vegetated: false,
            algorithm_version: "laipro-test".to_string(),
            crs: "EPSG:4326".to_string(),
            gsd: 0.00027,
            geotransform: [-96.0, 0.00027, 0.0, 43.0, 0.0, -0.00027],
            scenes_used: 3,
            model_registry_version: None,
            created: "2019-08-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn fields_cover_the_output_contract() {
        let fields = extract_metadata_fields(&sample());
        for key in [
            "REGION",
            "YEAR",
            "MONTH",
            "START_MILLIS",
            "END_MILLIS",
            "SCALE_FACTOR",
            "REDUCER",
            "CLOUD_COVER_MAX",
            "INCLUDE_NON_VEGETATED",
            "ALGORITHM_VERSION",
        ] {
            assert!(fields.contains_key(key), "missing {key}");
        }
        assert_eq!(fields["REDUCER"], "median");
        assert!(!fields.contains_key("MODEL_REGISTRY_VERSION"));
    }

    #[test]
    fn json_values_are_typed() {
        let meta = sample();
        let mut json = convert_metadata_to_json(&extract_metadata_fields(&meta));
        add_special_json_fields(&mut json, &meta);
        assert_eq!(json["year"], serde_json::json!(2019));
        assert_eq!(json["scale_factor"], serde_json::json!(0.01));
        assert_eq!(json["include_non_vegetated"], serde_json::json!(false));
        assert_eq!(json["region"], serde_json::json!("IA"));
        assert_eq!(json["start_millis"], serde_json::json!(1_561_939_200_000i64));
        assert_eq!(json["geotransform"].as_array().map(|a| a.len()), Some(6));
    }

    #[test]
    fn sidecar_is_written_next_to_raster() {
        let dir = tempfile::tempdir().unwrap();
        let raster = dir.path().join("IA_2019_07_LAI.tif");
        let path = create_metadata_sidecar(&raster, &sample()).unwrap();
        assert_eq!(path, dir.path().join("IA_2019_07_LAI.json"));
        let back: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(back["month"], serde_json::json!(7));
    }
}
