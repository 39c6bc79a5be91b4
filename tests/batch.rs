mod common;

use std::path::Path;

use approx::assert_relative_eq;

use laipro::api::mosaic::collect_inputs;
use laipro::io::gdal::GdalRasterReader;
use laipro::io::writers::tiff::create_f32_tiff;
use laipro::{
    merge_to_reference_grid, process_batch, BatchReport, BoundingBox, InMemorySceneSource,
    MosaicOptions, RetrievalAssets, RetrievalParams,
};

use common::*;

const NE: BoundingBox = BoundingBox {
    min_lon: -97.0,
    min_lat: 42.0,
    max_lon: -96.0,
    max_lat: 43.0,
};

fn run(out: &Path) -> BatchReport {
    let registry = registry_with(linear(2.34, 0.0));
    let hulls = full_hulls();
    let landcover = FixedLandCover::uniform(DECIDUOUS);
    let scenes = InMemorySceneSource::new(vec![
        scene(SceneFixture::default()),
        scene(SceneFixture {
            id: "S2A_NE",
            spacecraft: "SENTINEL_2A",
            footprint: NE,
            ..Default::default()
        }),
    ]);
    let assets = RetrievalAssets {
        scenes: &scenes,
        landcover: &landcover,
        registry: &registry,
        hulls: &hulls,
    };
    let params = RetrievalParams {
        gsd: GSD,
        ..RetrievalParams::default()
    };
    let regions = vec![region("IA", BOUNDS), region("NE", NE)];
    process_batch(&regions, 2019, &[7, 8], &assets, &params, out).unwrap()
}

#[test]
fn failed_job_does_not_abort_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let report = run(dir.path());

    assert_eq!(report.processed, 1);
    assert_eq!(report.empty, 2);
    assert_eq!(report.failed, 1);
    let failure = &report.failures[0];
    assert_eq!((failure.region.as_str(), failure.month), ("NE", 7));
    assert!(failure.configuration);

    let jul = dir.path().join("2019").join("Jul");
    assert!(jul.join("IA_2019_07_LAI.tif").is_file());
    assert!(jul.join("IA_2019_07_LAI.json").is_file());
    assert!(!jul.join("NE_2019_07_LAI.tif").exists());
    // empty months still produce an explicit raster
    assert!(dir.path().join("2019/Aug/NE_2019_08_LAI.tif").is_file());
}

#[test]
fn failed_sidecar_write_leaves_no_raster_behind() {
    let dir = tempfile::tempdir().unwrap();
    let jul = dir.path().join("2019").join("Jul");
    // a directory squatting on the sidecar path makes the JSON write fail
    std::fs::create_dir_all(jul.join("IA_2019_07_LAI.json")).unwrap();

    let report = run(dir.path());
    assert_eq!(report.processed, 0);
    assert_eq!(report.failed, 2);
    let failure = report
        .failures
        .iter()
        .find(|f| f.region == "IA" && f.month == 7)
        .unwrap();
    assert!(!failure.configuration);
    assert!(!jul.join("IA_2019_07_LAI.tif").exists());
    assert!(dir.path().join("2019/Aug/IA_2019_08_LAI.tif").is_file());
}

#[test]
fn composite_raster_carries_lai_count_and_metadata() {
    let dir = tempfile::tempdir().unwrap();
    run(dir.path());

    let reader = GdalRasterReader::open(dir.path().join("2019/Jul/IA_2019_07_LAI.tif")).unwrap();
    assert_eq!(reader.metadata.bands, 2);
    assert_eq!((reader.metadata.size_x, reader.metadata.size_y), (2, 2));
    assert_eq!(reader.metadata.projection, "EPSG:4326");
    assert_eq!(reader.metadata.nodata[0], Some(65535.0));
    assert_eq!(reader.metadata.metadata.get("REGION").map(String::as_str), Some("IA"));
    assert_eq!(reader.metadata.metadata.get("SCALE_FACTOR").map(String::as_str), Some("0.01"));

    let lai = reader.read_band(1).unwrap();
    let count = reader.read_band(2).unwrap();
    assert!(lai.iter().all(|&v| v == 234.0));
    assert!(count.iter().all(|&v| v == 1.0));

    let empty = GdalRasterReader::open(dir.path().join("2019/Aug/IA_2019_08_LAI.tif")).unwrap();
    assert!(empty.read_band(1).unwrap().iter().all(|v| v.is_nan()));
    assert!(empty.read_band(2).unwrap().iter().all(|&v| v == 0.0));

    let sidecar = std::fs::read_to_string(dir.path().join("2019/Jul/IA_2019_07_LAI.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&sidecar).unwrap();
    assert_eq!(json["MONTH"], 7);
    assert_eq!(json["SCENES_USED"], 1);
    assert_eq!(json["INCLUDE_NON_VEGETATED"], false);
}

#[test]
fn reruns_produce_identical_rasters() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    run(first.path());
    run(second.path());

    let path = "2019/Jul/IA_2019_07_LAI.tif";
    let a = GdalRasterReader::open(first.path().join(path)).unwrap();
    let b = GdalRasterReader::open(second.path().join(path)).unwrap();
    for band in 1..=2 {
        let (x, y) = (a.read_band(band).unwrap(), b.read_band(band).unwrap());
        assert!(x.iter().zip(y.iter()).all(|(p, q)| p.to_bits() == q.to_bits()));
    }
}

#[test]
fn mosaic_places_region_on_reference_grid() {
    let dir = tempfile::tempdir().unwrap();
    run(dir.path());

    // reference spans NE..IA at the same resolution: 8 x 2
    let reference = dir.path().join("reference.tif");
    let gt = [-97.0, GSD, 0.0, 43.0, 0.0, -GSD];
    let ds = create_f32_tiff(&reference, 8, 2, &gt, "EPSG:4326", -9999.0).unwrap();
    drop(ds);

    let inputs = collect_inputs(&dir.path().join("2019").join("Jul"), true).unwrap();
    assert_eq!(inputs.len(), 1);
    let output = dir.path().join("mosaic").join("2019_07_LAI.tif");
    let options = MosaicOptions {
        overviews: false,
        ..MosaicOptions::default()
    };
    let report = merge_to_reference_grid(&inputs, &reference, &output, &options).unwrap();
    assert_eq!(report.merged, 1);
    assert!(report.skipped.is_empty());
    assert_eq!(report.pixels_written, 4);

    let mosaic = GdalRasterReader::open(&output).unwrap();
    assert_eq!(mosaic.metadata.nodata[0], Some(-9999.0));
    let values = mosaic.read_band(1).unwrap();
    for row in 0..2 {
        for col in 0..8 {
            let v = values[[row, col]];
            if col >= 6 {
                assert_relative_eq!(v, 2.34, epsilon = 1e-5);
            } else {
                assert!(v.is_nan(), "({row}, {col}) = {v}");
            }
        }
    }
}

#[test]
fn mosaic_warps_inputs_onto_a_projected_reference() {
    let dir = tempfile::tempdir().unwrap();
    run(dir.path());

    // Web Mercator grid, 20 km pixels, west edge near -93.7 deg, rows near 42.5 deg
    let reference = dir.path().join("reference_3857.tif");
    let gt = [-10_430_000.0, 20_000.0, 0.0, 5_250_000.0, 0.0, -20_000.0];
    let ds = create_f32_tiff(&reference, 10, 2, &gt, "EPSG:3857", -9999.0).unwrap();
    drop(ds);

    let inputs = collect_inputs(&dir.path().join("2019").join("Jul"), true).unwrap();
    let output = dir.path().join("mosaic").join("2019_07_LAI_3857.tif");
    let options = MosaicOptions {
        overviews: false,
        ..MosaicOptions::default()
    };
    let report = merge_to_reference_grid(&inputs, &reference, &output, &options).unwrap();
    assert_eq!(report.merged, 1);
    assert!(report.skipped.is_empty());
    assert!(report.pixels_written >= 4);

    let mosaic = GdalRasterReader::open(&output).unwrap();
    assert_eq!(mosaic.metadata.projection, "EPSG:3857");
    let values = mosaic.read_band(1).unwrap();
    for row in 0..2 {
        // well inside the region (lon -93.6, -93.4)
        for col in 0..2 {
            assert_relative_eq!(values[[row, col]], 2.34, epsilon = 1e-5);
        }
        // east of the region (lon -92.2, -92.0)
        for col in 8..10 {
            assert!(values[[row, col]].is_nan(), "({row}, {col})");
        }
    }
}
