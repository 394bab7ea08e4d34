use crate::io::product::ProductName;
use crate::io::raster;
use crate::types::{ByteImage, FeatureImage, FeatureOutcome, Polarization, S1Error, S1Result};
use ndarray::Array2;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Source of one RGB channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    HH,
    HV,
    Zero,
}

impl FromStr for Channel {
    type Err = S1Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HH" | "hh" => Ok(Channel::HH),
            "HV" | "hv" => Ok(Channel::HV),
            "zero" | "ZERO" | "Zero" => Ok(Channel::Zero),
            _ => Err(S1Error::InvalidParameter(format!(
                "{} is not a valid RGB channel (HH, HV, zero)",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::HH => write!(f, "HH"),
            Channel::HV => write!(f, "HV"),
            Channel::Zero => write!(f, "zero"),
        }
    }
}

/// False-colour composite parameters
#[derive(Debug, Clone)]
pub struct RgbParams {
    /// dB range mapped onto the output range for HH
    pub hh_min: f32,
    pub hh_max: f32,
    /// dB range mapped onto the output range for HV
    pub hv_min: f32,
    pub hv_max: f32,
    /// Output value range
    pub new_min: u8,
    pub new_max: u8,
    pub red: Channel,
    pub green: Channel,
    pub blue: Channel,
}

impl Default for RgbParams {
    fn default() -> Self {
        Self {
            hh_min: -30.0,
            hh_max: 0.0,
            hv_min: -35.0,
            hv_max: -5.0,
            new_min: 0,
            new_max: 255,
            red: Channel::HV,
            green: Channel::HH,
            blue: Channel::HH,
        }
    }
}

impl RgbParams {
    pub fn validate(&self) -> S1Result<()> {
        if !(self.hh_min < self.hh_max) {
            return Err(S1Error::InvalidParameter(format!(
                "hh_min ({}) must be smaller than hh_max ({})",
                self.hh_min, self.hh_max
            )));
        }
        if !(self.hv_min < self.hv_max) {
            return Err(S1Error::InvalidParameter(format!(
                "hv_min ({}) must be smaller than hv_max ({})",
                self.hv_min, self.hv_max
            )));
        }
        if self.new_min >= self.new_max {
            return Err(S1Error::InvalidParameter(format!(
                "new_min ({}) must be smaller than new_max ({})",
                self.new_min, self.new_max
            )));
        }
        Ok(())
    }
}

/// Convert linear intensity to dB, clip to `[min, max]` and stretch to the byte range
pub fn scale_to_byte(linear: &FeatureImage, min: f32, max: f32, new_min: u8, new_max: u8) -> ByteImage {
    let (lo, hi) = (new_min as f32, new_max as f32);
    let factor = (hi - lo) / (max - min);

    let stretch = move |x: f32| {
        let db = 10.0 * x.log10();
        if db.is_nan() {
            return 0.0;
        }
        ((db.clamp(min, max) - min) * factor + lo).round().clamp(lo, hi)
    };

    let mut scaled = linear.to_owned();

    #[cfg(feature = "parallel")]
    scaled.par_mapv_inplace(stretch);

    #[cfg(not(feature = "parallel"))]
    scaled.mapv_inplace(stretch);

    scaled.mapv(|v| v as u8)
}

/// Stacks scaled Sigma0 HH/HV into an 8-bit RGB GeoTIFF
pub struct RgbComposer {
    params: RgbParams,
}

impl RgbComposer {
    pub fn new() -> Self {
        Self {
            params: RgbParams::default(),
        }
    }

    pub fn with_params(params: RgbParams) -> Self {
        Self { params }
    }

    /// Composite output path: `<result_folder>/<feature folder name>_rgb.tif`
    pub fn output_path(feat_folder: &Path, result_folder: &Path) -> PathBuf {
        let name = feat_folder
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        result_folder.join(format!("{}_rgb.tif", name))
    }

    /// Red, green and blue bands from linear HH and HV
    pub fn compose(&self, hh: &FeatureImage, hv: &FeatureImage) -> S1Result<[ByteImage; 3]> {
        self.params.validate()?;

        if hh.dim() != hv.dim() {
            log::error!("Intensity channels must have the same array shape");
            return Err(S1Error::InvalidParameter(format!(
                "intensity channels must have the same array shape ({:?} vs {:?})",
                hh.dim(),
                hv.dim()
            )));
        }

        let p = &self.params;
        log::info!("Scaling HH and HV channel individually");
        let hh_scaled = scale_to_byte(hh, p.hh_min, p.hh_max, p.new_min, p.new_max);
        let hv_scaled = scale_to_byte(hv, p.hv_min, p.hv_max, p.new_min, p.new_max);

        let pick = |channel: Channel| match channel {
            Channel::HH => hh_scaled.clone(),
            Channel::HV => hv_scaled.clone(),
            Channel::Zero => Array2::zeros(hh.dim()),
        };

        log::info!(
            "Stacking to RGB: red:{}, green:{}, blue:{}",
            p.red,
            p.green,
            p.blue
        );
        Ok([pick(p.red), pick(p.green), pick(p.blue)])
    }

    /// Read `Sigma0_HH.img` and `Sigma0_HV.img` from a feature folder and write the composite
    pub fn make_rgb<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        feat_folder: P,
        result_folder: Q,
        overwrite: bool,
    ) -> S1Result<FeatureOutcome> {
        log::info!("Stacking to false-color RGB 8bit");
        self.params.validate()?;

        let feat_folder = std::path::absolute(feat_folder.as_ref())?;
        let result_folder = std::path::absolute(result_folder.as_ref())?;
        log::debug!("feat_folder:   {}", feat_folder.display());
        log::debug!("result_folder: {}", result_folder.display());

        if !feat_folder.is_dir() {
            log::error!("Cannot find feat_folder: {}", feat_folder.display());
            return Err(S1Error::not_found("feature folder", feat_folder));
        }

        if let Some(name) = feat_folder.file_name().and_then(|n| n.to_str()) {
            match ProductName::parse(name) {
                Ok(info) => log::debug!("datestring: {}", info.datestring()),
                Err(_) => log::warn!("Feature folder {} is not named after a product", name),
            }
        }

        let img_path = Self::output_path(&feat_folder, &result_folder);
        log::debug!("img_path: {}", img_path.display());

        if img_path.is_file() && !overwrite {
            log::info!("Output file already exists, use `--overwrite` to force");
            return Ok(FeatureOutcome::Skipped {
                existing: vec![img_path],
            });
        }

        let band_path = |pol: Polarization| feat_folder.join(format!("Sigma0_{}.img", pol));
        let hh_path = band_path(Polarization::HH);
        let hv_path = band_path(Polarization::HV);
        for path in [&hh_path, &hv_path] {
            if !path.is_file() {
                log::error!("Cannot find intensity image: {}", path.display());
                return Err(S1Error::not_found("intensity image", path.clone()));
            }
        }

        log::info!("Loading HH and HV images");
        let hh = raster::read_band_f32(&hh_path, 1)?;
        let hv = raster::read_band_f32(&hv_path, 1)?;

        let bands = self.compose(&hh, &hv)?;

        std::fs::create_dir_all(&result_folder)?;
        if img_path.is_file() {
            std::fs::remove_file(&img_path)?;
        }
        raster::write_geotiff_u8_bands(&img_path, &bands)?;
        log::info!("RGB composite written to {}", img_path.display());

        Ok(FeatureOutcome::Written {
            files: vec![img_path],
        })
    }
}

impl Default for RgbComposer {
    fn default() -> Self {
        Self::new()
    }
}
