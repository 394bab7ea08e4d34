//! s1-features: Sentinel-1 feature extraction with ESA SNAP and GDAL
//!
//! This library locates Sentinel-1 products, runs SNAP processing graphs through
//! the `gpt` command line tool and turns the results into feature rasters
//! (calibrated intensities, incidence angle, lat/lon, swath masks and RGB composites).

pub mod config;
pub mod core;
pub mod io;
pub mod types;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use config::{ConfigError, DotenvLocation, GptConfig};
pub use types::{
    AcquisitionMode, FeatureOutcome, Looks, OutputFormat, Polarization, ProductType, S1Error,
    S1Result, Scale,
};

pub use crate::core::{
    BatchPlan, BatchReport, ExtractOptions, FeatureExtractor, GptRunner, RgbComposer, RgbParams,
    SwathMaskBuilder,
};
pub use io::{ProductName, Sentinel1Product};
