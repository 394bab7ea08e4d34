//! End-to-end extraction against a shell script standing in for SNAP gpt
#![cfg(unix)]

mod common;

use common::{fake_gpt, gpt_calls, make_safe, EW_NAME, EXPECTED_LOWER_ROW};
use s1_features::config::GptConfig;
use s1_features::core::extract::DRY_RUN_GRAPH_DIR;
use s1_features::core::{BatchPlan, ExtractOptions, FeatureExtractor};
use s1_features::io::raster;
use s1_features::types::{FeatureOutcome, Looks, OutputFormat, Polarization, S1Error, Scale};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

// Writing and executing scripts from parallel test threads can hit ETXTBSY
static GPT_LOCK: Mutex<()> = Mutex::new(());

struct Setup {
    _guard: MutexGuard<'static, ()>,
    dir: tempfile::TempDir,
    safe: PathBuf,
    feat: PathBuf,
    config: GptConfig,
}

fn setup(exit_code: i32) -> Setup {
    common::init_logging();
    let guard = GPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let gpt = fake_gpt(dir.path(), exit_code);
    let safe = make_safe(&dir.path().join("L1"), EW_NAME);
    let feat = dir.path().join("features").join(EW_NAME);
    let config = GptConfig::new(&gpt).expect("Fake gpt should be accepted");
    Setup {
        _guard: guard,
        dir,
        safe,
        feat,
        config,
    }
}

fn extractor(config: &GptConfig, options: ExtractOptions) -> FeatureExtractor {
    FeatureExtractor::with_options(config, options)
}

fn scratch_dirs(feat: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(feat)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect()
}

#[test]
fn test_intensity_linear() {
    let s = setup(0);
    let ex = extractor(&s.config, ExtractOptions::default());

    let outcome = ex
        .intensity(&s.safe, &s.feat, Polarization::HH, Looks::default(), Scale::Linear)
        .expect("Intensity extraction failed");

    let img = s.feat.join("Sigma0_HH.img");
    assert_eq!(outcome, FeatureOutcome::Written { files: vec![img.clone()] });
    assert!(s.feat.join("Sigma0_HH.hdr").is_file());
    assert_eq!(raster::validate_raster(&img).unwrap(), (12, 4));
    assert!(scratch_dirs(&s.feat).is_empty(), "scratch directory left behind");

    let calls = gpt_calls(s.dir.path());
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains("S1_EW_GRDM_NR_Cal_XX.xml"));
    assert!(calls[0].contains(&format!("-PinFile={}", s.safe.display())));
    assert!(calls[0].contains("-Ppolarization=HH"));
    assert!(!calls[0].contains("looks_rg"));
}

#[test]
fn test_intensity_speckle_db() {
    let s = setup(0);
    let ex = extractor(&s.config, ExtractOptions::default());

    let looks: Looks = "3x5".parse().unwrap();
    let outcome = ex
        .intensity(&s.safe, &s.feat, Polarization::HV, looks, Scale::Decibel)
        .unwrap();
    assert!(outcome.is_written());
    assert!(s.feat.join("Sigma0_HV_db.img").is_file());

    let calls = gpt_calls(s.dir.path());
    assert!(calls[0].contains("S1_EW_GRDM_NR_Cal_Spk_dB_XX.xml"));
    assert!(calls[0].contains("-Plooks_rg=3 -Plooks_az=5"));
}

#[test]
fn test_existing_output_skipped() {
    let s = setup(0);
    let ex = extractor(&s.config, ExtractOptions::default());

    ex.incidence_angle(&s.safe, &s.feat).unwrap();
    let second = ex.incidence_angle(&s.safe, &s.feat).unwrap();
    assert!(matches!(second, FeatureOutcome::Skipped { .. }));
    assert_eq!(gpt_calls(s.dir.path()).len(), 1);

    let forced = extractor(
        &s.config,
        ExtractOptions {
            overwrite: true,
            ..ExtractOptions::default()
        },
    );
    assert!(forced.incidence_angle(&s.safe, &s.feat).unwrap().is_written());
    assert_eq!(gpt_calls(s.dir.path()).len(), 2);
}

#[test]
fn test_dry_run_spawns_nothing() {
    let s = setup(0);
    let ex = extractor(
        &s.config,
        ExtractOptions {
            dry_run: true,
            ..ExtractOptions::default()
        },
    );

    let outcome = ex.lat_lon(&s.safe, &s.feat).unwrap();
    match outcome {
        FeatureOutcome::DryRun { commands } => {
            assert_eq!(commands.len(), 2);
            for (command, graph) in commands.iter().zip(["S1_lat.xml", "S1_lon.xml"]) {
                let graph_path = s.feat.join(DRY_RUN_GRAPH_DIR).join(graph);
                assert!(command.contains(&graph_path.display().to_string()));
                assert!(graph_path.is_file(), "{} was not kept", graph_path.display());
            }
        }
        other => panic!("expected dry run, got {:?}", other),
    }
    assert!(gpt_calls(s.dir.path()).is_empty());
    assert!(!s.feat.join("lat.img").exists());
}

#[test]
fn test_swath_mask_dry_run_creates_folder() {
    let s = setup(0);
    let ex = extractor(
        &s.config,
        ExtractOptions {
            dry_run: true,
            ..ExtractOptions::default()
        },
    );

    let outcome = ex.swath_mask(&s.safe, &s.feat).unwrap();
    assert_eq!(outcome, FeatureOutcome::DryRun { commands: Vec::new() });
    assert!(s.feat.is_dir());
    assert!(!s.feat.join("swath_mask.img").exists());
}

#[test]
fn test_lat_lon_geotiff() {
    let s = setup(0);
    let ex = extractor(
        &s.config,
        ExtractOptions {
            output_format: OutputFormat::GeoTiff,
            ..ExtractOptions::default()
        },
    );

    let outcome = ex.lat_lon(&s.safe, &s.feat).unwrap();
    assert_eq!(
        outcome,
        FeatureOutcome::Written {
            files: vec![s.feat.join("lat.tif"), s.feat.join("lon.tif")]
        }
    );
    assert!(!s.feat.join("lat.img").exists());
    assert_eq!(raster::dimensions(s.feat.join("lon.tif")).unwrap(), (12, 4));
    assert_eq!(gpt_calls(s.dir.path()).len(), 2);
}

#[test]
fn test_missing_polarization() {
    let s = setup(0);
    let ex = extractor(&s.config, ExtractOptions::default());

    let result = ex.intensity(&s.safe, &s.feat, Polarization::VV, Looks::default(), Scale::Linear);
    assert!(matches!(
        result,
        Err(S1Error::MissingPolarization {
            requested: Polarization::VV,
            ..
        })
    ));
    assert!(gpt_calls(s.dir.path()).is_empty());
}

#[test]
fn test_gpt_failure_is_reported() {
    let s = setup(1);
    let ex = extractor(&s.config, ExtractOptions::default());

    let result = ex.incidence_angle(&s.safe, &s.feat);
    assert!(matches!(result, Err(S1Error::Gpt { .. })));
    assert!(!s.feat.join("IA.img").exists());
    assert!(scratch_dirs(&s.feat).is_empty());
}

#[test]
fn test_extract_all() {
    let s = setup(0);
    let ex = extractor(&s.config, ExtractOptions::default());

    let outcomes = ex.extract_all(&s.safe, &s.feat, Looks::default()).unwrap();
    let labels: Vec<&str> = outcomes.iter().map(|(l, _)| l.as_str()).collect();
    assert_eq!(
        labels,
        vec![
            "Sigma0_HH",
            "Sigma0_HH_db",
            "Sigma0_HV",
            "Sigma0_HV_db",
            "swath_mask",
            "IA",
            "lat_lon"
        ]
    );
    assert!(outcomes.iter().all(|(_, o)| o.is_written()));

    for stem in ["Sigma0_HH", "Sigma0_HH_db", "Sigma0_HV", "Sigma0_HV_db", "IA", "lat", "lon", "swath_mask"] {
        assert!(s.feat.join(format!("{}.img", stem)).is_file(), "{} missing", stem);
    }

    let mask = raster::read_band_f32(s.feat.join("swath_mask.img"), 1).unwrap();
    let lower: Vec<u8> = mask.row(3).iter().map(|v| *v as u8).collect();
    assert_eq!(lower, EXPECTED_LOWER_ROW.to_vec());

    // 2 polarisations x 2 scales, IA, lat, lon
    assert_eq!(gpt_calls(s.dir.path()).len(), 7);
}

#[test]
fn test_batch_records_failures() {
    let s = setup(0);
    let ex = extractor(&s.config, ExtractOptions::default());

    let missing = "S1B_EW_GRDM_1SDH_20210101T000000_20210101T000100_025000_02F000_ABCD".to_string();
    let mut plan = BatchPlan::new(
        s.dir.path().join("L1"),
        s.dir.path().join("features"),
        vec![EW_NAME.to_string(), missing.clone()],
    );
    plan.jobs = 2;

    let report = plan.run(&ex).unwrap();
    assert_eq!(report.products.len(), 2);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);

    let failed = report.products.iter().find(|p| p.basename == missing).unwrap();
    assert!(failed.error.as_ref().unwrap().contains("Cannot find"));
    assert!(s.feat.join("IA.img").is_file());
}
