use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::ConfigError;

/// Real-valued feature raster (lines x samples)
pub type FeatureImage = Array2<f32>;

/// Byte raster, used for masks and 8-bit composites
pub type ByteImage = Array2<u8>;

/// Polarization modes for Sentinel-1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarization {
    VV,
    VH,
    HV,
    HH,
}

impl Polarization {
    /// Lower-case form used in SAFE file names
    pub fn as_lower(&self) -> &'static str {
        match self {
            Polarization::VV => "vv",
            Polarization::VH => "vh",
            Polarization::HV => "hv",
            Polarization::HH => "hh",
        }
    }
}

impl std::fmt::Display for Polarization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarization::VV => write!(f, "VV"),
            Polarization::VH => write!(f, "VH"),
            Polarization::HV => write!(f, "HV"),
            Polarization::HH => write!(f, "HH"),
        }
    }
}

impl FromStr for Polarization {
    type Err = S1Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "VV" => Ok(Polarization::VV),
            "VH" => Ok(Polarization::VH),
            "HV" => Ok(Polarization::HV),
            "HH" => Ok(Polarization::HH),
            _ => Err(S1Error::InvalidParameter(format!(
                "{} is not a valid polarization (HH, HV, VH, VV)",
                s
            ))),
        }
    }
}

/// Sentinel-1 acquisition mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcquisitionMode {
    IW, // Interferometric Wide swath
    EW, // Extra Wide swath
    SM, // StripMap
    WV, // Wave
}

impl AcquisitionMode {
    /// Sub-swath identifiers as they appear in the annotation
    pub fn swath_names(&self) -> Option<&'static [&'static str]> {
        match self {
            AcquisitionMode::EW => Some(&["EW1", "EW2", "EW3", "EW4", "EW5"]),
            AcquisitionMode::IW => Some(&["IW1", "IW2", "IW3"]),
            AcquisitionMode::SM | AcquisitionMode::WV => None,
        }
    }
}

impl std::fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AcquisitionMode::IW => "IW",
            AcquisitionMode::EW => "EW",
            AcquisitionMode::SM => "SM",
            AcquisitionMode::WV => "WV",
        };
        write!(f, "{}", s)
    }
}

/// Product type and resolution class (the `TTTR` block of a product name)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductType {
    SLC,
    GRDF,
    GRDH,
    GRDM,
    RAW,
    OCN,
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProductType::SLC => "SLC",
            ProductType::GRDF => "GRDF",
            ProductType::GRDH => "GRDH",
            ProductType::GRDM => "GRDM",
            ProductType::RAW => "RAW",
            ProductType::OCN => "OCN",
        };
        write!(f, "{}", s)
    }
}

/// Range x azimuth looks of the speckle filter window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Looks {
    pub range: u32,
    pub azimuth: u32,
}

impl Default for Looks {
    fn default() -> Self {
        Self { range: 1, azimuth: 1 }
    }
}

impl Looks {
    /// Both window dimensions must be odd
    pub fn new(range: u32, azimuth: u32) -> S1Result<Self> {
        if range == 0 || azimuth == 0 || range % 2 == 0 || azimuth % 2 == 0 {
            return Err(S1Error::InvalidParameter(format!(
                "looks_rg and looks_az must be odd numbers (got {}x{})",
                range, azimuth
            )));
        }
        Ok(Self { range, azimuth })
    }

    /// True when a speckle filter graph variant is needed
    pub fn is_multilook(&self) -> bool {
        self.range > 1 || self.azimuth > 1
    }
}

impl std::fmt::Display for Looks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.range, self.azimuth)
    }
}

impl FromStr for Looks {
    type Err = S1Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            S1Error::InvalidParameter(format!(
                "Cannot extract looks_rg and looks_az from ML parameter: {} (expected looks_rgxlooks_az)",
                s
            ))
        };
        let (rg, az) = s.split_once(['x', 'X']).ok_or_else(invalid)?;
        let range = rg.trim().parse::<u32>().map_err(|_| invalid())?;
        let azimuth = az.trim().parse::<u32>().map_err(|_| invalid())?;
        Looks::new(range, azimuth)
    }
}

/// Intensity scale of an extracted band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scale {
    Linear,
    Decibel,
}

impl Scale {
    /// Suffix SNAP appends to converted band names
    pub fn suffix(&self) -> &'static str {
        match self {
            Scale::Linear => "",
            Scale::Decibel => "_db",
        }
    }
}

/// File format of finished feature rasters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// ENVI `.img` + `.hdr`, as written by SNAP
    #[default]
    Envi,
    /// Single-file GeoTIFF
    GeoTiff,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Envi => "img",
            OutputFormat::GeoTiff => "tif",
        }
    }

    pub fn driver_name(&self) -> &'static str {
        match self {
            OutputFormat::Envi => "ENVI",
            OutputFormat::GeoTiff => "GTiff",
        }
    }
}

/// Status of a single feature extraction step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeatureOutcome {
    /// Output files written to the feature folder
    Written { files: Vec<PathBuf> },
    /// Outputs were already present and overwrite was not requested
    Skipped { existing: Vec<PathBuf> },
    /// Dry run, nothing executed
    DryRun { commands: Vec<String> },
}

impl FeatureOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, FeatureOutcome::Written { .. })
    }
}

/// Error types for feature extraction
#[derive(Debug, thiserror::Error)]
pub enum S1Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid product name '{name}': {reason}")]
    ProductName { name: String, reason: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Product does not contain {requested} polarisation (available: {available})")]
    MissingPolarization { requested: Polarization, available: String },

    #[error("Cannot find {what}: {path}")]
    NotFound { what: &'static str, path: PathBuf },

    #[error("Not implemented: {0}")]
    Unsupported(String),

    #[error("gpt failed ({status}): {stderr}")]
    Gpt { status: String, stderr: String },

    #[error("Raster error: {0}")]
    Raster(String),
}

impl S1Error {
    pub(crate) fn not_found(what: &'static str, path: impl Into<PathBuf>) -> Self {
        S1Error::NotFound { what, path: path.into() }
    }
}

/// Result type for feature extraction operations
pub type S1Result<T> = Result<T, S1Error>;
