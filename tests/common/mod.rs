#![allow(dead_code)]

use ndarray::Array2;
use s1_features::io::raster;
use std::path::{Path, PathBuf};

pub const EW_NAME: &str = "S1A_EW_GRDM_1SDH_20230208T065619_20230208T065723_047141_05A7E5_F291";

pub const HH_ANNOTATION: &str = "s1a-ew-grd-hh-20230208t065619-20230208t065723-047141-05a7e5-001.xml";

/// 4 x 12 image, five EW sub-swaths of two or three columns each
pub const ANNOTATION_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<product>
  <imageAnnotation>
    <imageInformation>
      <numberOfSamples>12</numberOfSamples>
      <numberOfLines>4</numberOfLines>
    </imageInformation>
  </imageAnnotation>
  <swathMerging>
    <swathMergeList count="5">
      <swathMerge><swath>EW1</swath><swathBoundsList count="1"><swathBounds>
        <firstAzimuthLine>0</firstAzimuthLine><firstRangeSample>0</firstRangeSample>
        <lastAzimuthLine>3</lastAzimuthLine><lastRangeSample>2</lastRangeSample>
      </swathBounds></swathBoundsList></swathMerge>
      <swathMerge><swath>EW2</swath><swathBoundsList count="1"><swathBounds>
        <firstAzimuthLine>0</firstAzimuthLine><firstRangeSample>3</firstRangeSample>
        <lastAzimuthLine>3</lastAzimuthLine><lastRangeSample>4</lastRangeSample>
      </swathBounds></swathBoundsList></swathMerge>
      <swathMerge><swath>EW3</swath><swathBoundsList count="2"><swathBounds>
        <firstAzimuthLine>0</firstAzimuthLine><firstRangeSample>5</firstRangeSample>
        <lastAzimuthLine>1</lastAzimuthLine><lastRangeSample>6</lastRangeSample>
      </swathBounds><swathBounds>
        <firstAzimuthLine>2</firstAzimuthLine><firstRangeSample>5</firstRangeSample>
        <lastAzimuthLine>3</lastAzimuthLine><lastRangeSample>7</lastRangeSample>
      </swathBounds></swathBoundsList></swathMerge>
      <swathMerge><swath>EW4</swath><swathBoundsList count="1"><swathBounds>
        <firstAzimuthLine>0</firstAzimuthLine><firstRangeSample>8</firstRangeSample>
        <lastAzimuthLine>3</lastAzimuthLine><lastRangeSample>9</lastRangeSample>
      </swathBounds></swathBoundsList></swathMerge>
      <swathMerge><swath>EW5</swath><swathBoundsList count="1"><swathBounds>
        <firstAzimuthLine>0</firstAzimuthLine><firstRangeSample>10</firstRangeSample>
        <lastAzimuthLine>3</lastAzimuthLine><lastRangeSample>15</lastRangeSample>
      </swathBounds></swathBoundsList></swathMerge>
    </swathMergeList>
  </swathMerging>
</product>"#;

/// Expected label of each column in rows 2 and 3
pub const EXPECTED_LOWER_ROW: [u8; 12] = [1, 1, 1, 2, 2, 3, 3, 3, 4, 4, 5, 5];

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Minimal `.SAFE` folder with an HH annotation file
pub fn make_safe(dir: &Path, name: &str) -> PathBuf {
    let safe = dir.join(format!("{}.SAFE", name));
    let annotation = safe.join("annotation");
    std::fs::create_dir_all(annotation.join("calibration")).expect("Failed to create SAFE folder");
    std::fs::write(safe.join("manifest.safe"), "<manifest/>").expect("Failed to write manifest");
    std::fs::write(annotation.join(HH_ANNOTATION), ANNOTATION_XML).expect("Failed to write annotation");
    std::fs::write(
        annotation.join("calibration").join(format!("calibration-{}", HH_ANNOTATION)),
        "<calibration/>",
    )
    .expect("Failed to write calibration annotation");
    safe
}

/// Write a linear intensity band as ENVI
pub fn write_intensity(path: &Path, data: &Array2<f32>) {
    raster::write_raster(path, "ENVI", std::slice::from_ref(data)).expect("Failed to write ENVI raster");
}

/// Executable shell script standing in for SNAP gpt.
///
/// It copies `template.img/.hdr` into `<outFile>.data/` under every band name
/// the graphs produce and appends its arguments to `gpt.log`.
#[cfg(unix)]
pub fn fake_gpt(dir: &Path, exit_code: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let template = dir.join("template.img");
    write_intensity(&template, &Array2::from_elem((4, 12), 0.5f32));

    let script = dir.join("gpt");
    let body = format!(
        r#"#!/bin/sh
echo "$@" >> "{log}"
out=""
for arg in "$@"; do
  case "$arg" in
    -PoutFile=*) out="${{arg#-PoutFile=}}" ;;
  esac
done
[ -n "$out" ] || exit 2
data="${{out%.dim}}.data"
mkdir -p "$data"
for band in Sigma0_HH Sigma0_HH_db Sigma0_HV Sigma0_HV_db incAngle lat lon; do
  cp "{img}" "$data/$band.img"
  cp "{hdr}" "$data/$band.hdr"
done
exit {code}
"#,
        log = dir.join("gpt.log").display(),
        img = template.display(),
        hdr = template.with_extension("hdr").display(),
        code = exit_code,
    );
    std::fs::write(&script, body).expect("Failed to write fake gpt");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to make fake gpt executable");
    script
}

/// Lines written by the fake gpt, one per invocation
pub fn gpt_calls(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("gpt.log"))
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
