//! Python bindings, for use from notebooks and scripts

use crate::config::{DotenvLocation, GptConfig};
use crate::core::{ExtractOptions, FeatureExtractor, RgbComposer, RgbParams, SwathMaskBuilder};
use crate::io::Sentinel1Product;
use crate::types::{FeatureOutcome, Looks, OutputFormat, Polarization, S1Error, Scale};
use numpy::{IntoPyArray, PyArray2};
use pyo3::prelude::*;

fn to_py_err(e: S1Error) -> PyErr {
    match e {
        S1Error::InvalidParameter(_) | S1Error::MissingPolarization { .. } => {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}", e))
        }
        S1Error::NotFound { .. } => {
            PyErr::new::<pyo3::exceptions::PyFileNotFoundError, _>(format!("{}", e))
        }
        S1Error::Unsupported(_) => {
            PyErr::new::<pyo3::exceptions::PyNotImplementedError, _>(format!("{}", e))
        }
        _ => PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e)),
    }
}

fn parse_pol(pol: &str) -> PyResult<Polarization> {
    pol.parse::<Polarization>().map_err(to_py_err)
}

fn extractor(overwrite: bool, dry_run: bool, tif: bool) -> PyResult<FeatureExtractor> {
    let config = GptConfig::load(DotenvLocation::Installation)
        .map_err(|e| to_py_err(S1Error::Config(e)))?;
    let options = ExtractOptions {
        overwrite,
        dry_run,
        output_format: if tif {
            OutputFormat::GeoTiff
        } else {
            OutputFormat::Envi
        },
    };
    Ok(FeatureExtractor::with_options(&config, options))
}

/// Paths of the files written, or empty when skipped / dry run
fn written_files(outcome: FeatureOutcome) -> Vec<String> {
    match outcome {
        FeatureOutcome::Written { files } => {
            files.iter().map(|p| p.display().to_string()).collect()
        }
        FeatureOutcome::Skipped { .. } | FeatureOutcome::DryRun { .. } => Vec::new(),
    }
}

#[pyfunction]
#[pyo3(signature = (safe_folder, feat_folder, intensity, ml = "1x1", db = false, overwrite = false, dry_run = false, tif = false))]
#[allow(clippy::too_many_arguments)]
fn get_s1_intensity(
    safe_folder: &str,
    feat_folder: &str,
    intensity: &str,
    ml: &str,
    db: bool,
    overwrite: bool,
    dry_run: bool,
    tif: bool,
) -> PyResult<Vec<String>> {
    let pol = parse_pol(intensity)?;
    let looks = ml.parse::<Looks>().map_err(to_py_err)?;
    let scale = if db { Scale::Decibel } else { Scale::Linear };
    let outcome = extractor(overwrite, dry_run, tif)?
        .intensity(safe_folder, feat_folder, pol, looks, scale)
        .map_err(to_py_err)?;
    Ok(written_files(outcome))
}

#[pyfunction]
#[pyo3(signature = (safe_folder, feat_folder, overwrite = false, dry_run = false, tif = false))]
fn get_s1_ia(
    safe_folder: &str,
    feat_folder: &str,
    overwrite: bool,
    dry_run: bool,
    tif: bool,
) -> PyResult<Vec<String>> {
    let outcome = extractor(overwrite, dry_run, tif)?
        .incidence_angle(safe_folder, feat_folder)
        .map_err(to_py_err)?;
    Ok(written_files(outcome))
}

#[pyfunction]
#[pyo3(signature = (safe_folder, feat_folder, overwrite = false, dry_run = false, tif = false))]
fn get_s1_lat_lon(
    safe_folder: &str,
    feat_folder: &str,
    overwrite: bool,
    dry_run: bool,
    tif: bool,
) -> PyResult<Vec<String>> {
    let outcome = extractor(overwrite, dry_run, tif)?
        .lat_lon(safe_folder, feat_folder)
        .map_err(to_py_err)?;
    Ok(written_files(outcome))
}

#[pyfunction]
#[pyo3(signature = (safe_folder, feat_folder, overwrite = false, dry_run = false, tif = false))]
fn get_s1_swath_mask(
    safe_folder: &str,
    feat_folder: &str,
    overwrite: bool,
    dry_run: bool,
    tif: bool,
) -> PyResult<Vec<String>> {
    let outcome = extractor(overwrite, dry_run, tif)?
        .swath_mask(safe_folder, feat_folder)
        .map_err(to_py_err)?;
    Ok(written_files(outcome))
}

/// Swath mask as a (lines, samples) uint8 array, without writing a file
#[pyfunction]
fn swath_mask_array<'py>(py: Python<'py>, safe_folder: &str) -> PyResult<&'py PyArray2<u8>> {
    let product = Sentinel1Product::locate(safe_folder).map_err(to_py_err)?;
    let mask = SwathMaskBuilder::for_product(&product).map_err(to_py_err)?;
    Ok(mask.into_pyarray(py))
}

#[pyfunction]
#[pyo3(signature = (feat_folder, result_folder, hh_min = -30.0, hh_max = 0.0, hv_min = -35.0, hv_max = -5.0, new_min = 0, new_max = 255, red = "HV", green = "HH", blue = "HH", overwrite = false))]
#[allow(clippy::too_many_arguments)]
fn make_s1_rgb(
    feat_folder: &str,
    result_folder: &str,
    hh_min: f32,
    hh_max: f32,
    hv_min: f32,
    hv_max: f32,
    new_min: u8,
    new_max: u8,
    red: &str,
    green: &str,
    blue: &str,
    overwrite: bool,
) -> PyResult<Vec<String>> {
    let params = RgbParams {
        hh_min,
        hh_max,
        hv_min,
        hv_max,
        new_min,
        new_max,
        red: red.parse().map_err(to_py_err)?,
        green: green.parse().map_err(to_py_err)?,
        blue: blue.parse().map_err(to_py_err)?,
    };
    let outcome = RgbComposer::with_params(params)
        .make_rgb(feat_folder, result_folder, overwrite)
        .map_err(to_py_err)?;
    Ok(written_files(outcome))
}

/// Product name information as a JSON string
#[pyfunction]
fn product_info(path: &str) -> PyResult<String> {
    let product = Sentinel1Product::locate(path).map_err(to_py_err)?;
    serde_json::to_string(&product)
        .map_err(|e| PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e)))
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(get_s1_intensity, m)?)?;
    m.add_function(wrap_pyfunction!(get_s1_ia, m)?)?;
    m.add_function(wrap_pyfunction!(get_s1_lat_lon, m)?)?;
    m.add_function(wrap_pyfunction!(get_s1_swath_mask, m)?)?;
    m.add_function(wrap_pyfunction!(swath_mask_array, m)?)?;
    m.add_function(wrap_pyfunction!(make_s1_rgb, m)?)?;
    m.add_function(wrap_pyfunction!(product_info, m)?)?;
    Ok(())
}
