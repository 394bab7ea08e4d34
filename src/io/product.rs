use crate::types::{AcquisitionMode, Polarization, ProductType, S1Error, S1Result};
use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use zip::ZipArchive;

const TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// ESA product naming convention:
/// `MMM_BB_TTTR_LFPP_YYYYMMDDTHHMMSS_YYYYMMDDTHHMMSS_OOOOOO_DDDDDD_CCCC`
fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<mission>S1[ABCD])_(?P<mode>IW|EW|WV|S[1-6])_(?P<ptype>SLC_|GRD[FHM]|RAW_|OCN_)_(?P<level>[012])(?P<class>[SA])(?P<pol>SH|SV|DH|DV|HH|VV|HV|VH)_(?P<start>\d{8}T\d{6})_(?P<stop>\d{8}T\d{6})_(?P<orbit>\d{6})_(?P<datatake>[0-9A-F]{6})_(?P<uid>[0-9A-F]{4})$",
        )
        .expect("product name regex is valid")
    })
}

/// Information encoded in a Sentinel-1 product basename
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductName {
    pub basename: String,
    pub mission: String,
    pub mode: AcquisitionMode,
    pub product_type: ProductType,
    pub level: u8,
    pub class: char,
    /// Polarisation block as written in the name, e.g. `1SDH`
    pub polarisation_code: String,
    /// Co-polarisation first
    pub polarizations: Vec<Polarization>,
    pub start_time: NaiveDateTime,
    pub stop_time: NaiveDateTime,
    pub absolute_orbit: u32,
    pub datatake_id: String,
    pub unique_id: String,
}

impl ProductName {
    /// Parse a product basename (no `.SAFE` / `.zip` suffix)
    pub fn parse(basename: &str) -> S1Result<Self> {
        let invalid = |reason: &str| S1Error::ProductName {
            name: basename.to_string(),
            reason: reason.to_string(),
        };

        let caps = name_regex().captures(basename).ok_or_else(|| {
            log::error!("Unable to extract product info from '{}'. Use S1 naming conventions.", basename);
            invalid("does not follow the Sentinel-1 naming convention")
        })?;

        let mode = match &caps["mode"] {
            "IW" => AcquisitionMode::IW,
            "EW" => AcquisitionMode::EW,
            "WV" => AcquisitionMode::WV,
            _ => AcquisitionMode::SM,
        };

        let product_type = match &caps["ptype"] {
            "SLC_" => ProductType::SLC,
            "GRDF" => ProductType::GRDF,
            "GRDH" => ProductType::GRDH,
            "GRDM" => ProductType::GRDM,
            "RAW_" => ProductType::RAW,
            _ => ProductType::OCN,
        };

        let pol = &caps["pol"];
        let polarizations = match pol {
            "DH" => vec![Polarization::HH, Polarization::HV],
            "SH" | "HH" => vec![Polarization::HH],
            "DV" => vec![Polarization::VV, Polarization::VH],
            "SV" | "VV" => vec![Polarization::VV],
            "HV" => vec![Polarization::HV],
            "VH" => vec![Polarization::VH],
            other => {
                log::error!("Unknown polarization string: {}", other);
                return Err(invalid("unknown polarisation code"));
            }
        };

        let start_time = NaiveDateTime::parse_from_str(&caps["start"], TIME_FORMAT)
            .map_err(|_| invalid("invalid start time"))?;
        let stop_time = NaiveDateTime::parse_from_str(&caps["stop"], TIME_FORMAT)
            .map_err(|_| invalid("invalid stop time"))?;

        let absolute_orbit = caps["orbit"]
            .parse::<u32>()
            .map_err(|_| invalid("invalid absolute orbit"))?;

        let level = caps["level"].parse::<u8>().map_err(|_| invalid("invalid level"))?;
        let class = caps["class"].chars().next().unwrap_or('S');

        let name = Self {
            basename: basename.to_string(),
            mission: caps["mission"].to_string(),
            mode,
            product_type,
            level,
            class,
            polarisation_code: format!("{}{}{}", level, class, pol),
            polarizations,
            start_time,
            stop_time,
            absolute_orbit,
            datatake_id: caps["datatake"].to_string(),
            unique_id: caps["uid"].to_string(),
        };

        log::debug!("product_mode: {}", name.mode);
        log::debug!("product_type: {}", name.product_type);
        log::debug!("product_pol:  {}", name.polarisation_code);

        Ok(name)
    }

    /// Sensing start date, `YYYYMMDD`
    pub fn date(&self) -> String {
        self.start_time.format("%Y%m%d").to_string()
    }

    /// Sensing start, `YYYYMMDDTHHMMSS`
    pub fn datetime(&self) -> String {
        self.start_time.format(TIME_FORMAT).to_string()
    }

    /// Label for figures, `YYYY/MM/DD, HH:MM`
    pub fn datestring(&self) -> String {
        self.start_time.format("%Y/%m/%d, %H:%M").to_string()
    }

    pub fn zip_file_name(&self) -> String {
        format!("{}.zip", self.basename)
    }

    /// `manifest.safe` path relative to the product's parent directory
    pub fn manifest_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.SAFE", self.basename)).join("manifest.safe")
    }

    pub fn co_polarization(&self) -> Polarization {
        self.polarizations[0]
    }

    pub fn has_polarization(&self, pol: Polarization) -> bool {
        self.polarizations.contains(&pol)
    }
}

/// Strip `.SAFE` / `.zip` from a product file or folder name
pub fn basename_of<P: AsRef<Path>>(path: P) -> Option<String> {
    let name = path.as_ref().file_name()?.to_str()?;
    let name = name.trim_end_matches('/');
    let stem = name
        .strip_suffix(".SAFE")
        .or_else(|| name.strip_suffix(".zip"))
        .unwrap_or(name);
    Some(stem.to_string())
}

/// How the product is stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProductContainer {
    SafeDirectory,
    ZipArchive,
}

/// A Sentinel-1 product located on disk
#[derive(Debug, Clone, Serialize)]
pub struct Sentinel1Product {
    pub path: PathBuf,
    pub container: ProductContainer,
    pub name: ProductName,
}

impl Sentinel1Product {
    /// Resolve a `.SAFE` directory or `.zip` archive and parse its name
    pub fn locate<P: AsRef<Path>>(path: P) -> S1Result<Self> {
        let path = std::path::absolute(path.as_ref())?;
        log::debug!("Locating Sentinel-1 product: {}", path.display());

        if !path.exists() {
            log::error!("Cannot find Sentinel-1 product: {}", path.display());
            return Err(S1Error::not_found("Sentinel-1 product", path));
        }

        let is_zip = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);

        let container = if is_zip && path.is_file() {
            ProductContainer::ZipArchive
        } else if path.is_dir() {
            ProductContainer::SafeDirectory
        } else {
            log::error!("Cannot find Sentinel-1 SAFE folder: {}", path.display());
            return Err(S1Error::not_found("Sentinel-1 SAFE folder", path));
        };

        let basename = basename_of(&path).ok_or_else(|| S1Error::ProductName {
            name: path.display().to_string(),
            reason: "path has no file name".to_string(),
        })?;
        let name = ProductName::parse(&basename)?;

        Ok(Self {
            path,
            container,
            name,
        })
    }

    /// Name of the annotation file for a polarisation (first match, sorted)
    fn pick_annotation<'a, I>(names: I, pol: Polarization) -> Option<String>
    where
        I: Iterator<Item = &'a str>,
    {
        let mut matches: Vec<&str> = names
            .filter(|name| {
                name.starts_with("s1") && name.ends_with(".xml") && name.contains(pol.as_lower())
            })
            .collect();
        matches.sort_unstable();
        matches.first().map(|s| s.to_string())
    }

    /// Read the annotation XML for a polarisation from the SAFE folder or zip
    pub fn annotation_xml(&self, pol: Polarization) -> S1Result<String> {
        match self.container {
            ProductContainer::SafeDirectory => {
                let dir = self.path.join("annotation");
                if !dir.is_dir() {
                    return Err(S1Error::not_found("annotation folder", dir));
                }
                let mut names = Vec::new();
                for entry in std::fs::read_dir(&dir)? {
                    let entry = entry?;
                    if entry.file_type()?.is_file() {
                        if let Some(name) = entry.file_name().to_str() {
                            names.push(name.to_string());
                        }
                    }
                }
                let file = Self::pick_annotation(names.iter().map(String::as_str), pol)
                    .ok_or_else(|| S1Error::not_found("annotation file", dir.join(format!("s1*{}*.xml", pol.as_lower()))))?;
                log::debug!("annotation_path: {}", dir.join(&file).display());
                Ok(std::fs::read_to_string(dir.join(file))?)
            }
            ProductContainer::ZipArchive => {
                let mut archive = ZipArchive::new(File::open(&self.path)?)?;

                // Entries directly inside `<name>.SAFE/annotation/`
                let entries: Vec<String> = archive.file_names().map(str::to_string).collect();
                let in_annotation: Vec<(&str, &str)> = entries
                    .iter()
                    .filter_map(|entry| {
                        let (parent, file) = entry.rsplit_once('/')?;
                        parent.ends_with(".SAFE/annotation").then_some((entry.as_str(), file))
                    })
                    .collect();

                let file = Self::pick_annotation(in_annotation.iter().map(|(_, f)| *f), pol)
                    .ok_or_else(|| S1Error::not_found("annotation file in archive", self.path.clone()))?;
                let entry = in_annotation
                    .iter()
                    .find(|(_, f)| *f == file)
                    .map(|(e, _)| e.to_string())
                    .ok_or_else(|| S1Error::not_found("annotation file in archive", self.path.clone()))?;

                log::debug!("annotation entry: {}", entry);
                let mut xml = String::new();
                archive.by_name(&entry)?.read_to_string(&mut xml)?;
                Ok(xml)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EW_NAME: &str = "S1A_EW_GRDM_1SDH_20230208T065619_20230208T065723_047141_05A7E5_F291";

    #[test]
    fn test_parse_ew_grdm() {
        let name = ProductName::parse(EW_NAME).unwrap();
        assert_eq!(name.mission, "S1A");
        assert_eq!(name.mode, AcquisitionMode::EW);
        assert_eq!(name.product_type, ProductType::GRDM);
        assert_eq!(name.polarisation_code, "1SDH");
        assert_eq!(name.polarizations, vec![Polarization::HH, Polarization::HV]);
        assert_eq!(name.absolute_orbit, 47141);
        assert_eq!(name.datatake_id, "05A7E5");
        assert_eq!(name.unique_id, "F291");
    }

    #[test]
    fn test_datestrings() {
        let name = ProductName::parse(EW_NAME).unwrap();
        assert_eq!(name.date(), "20230208");
        assert_eq!(name.datetime(), "20230208T065619");
        assert_eq!(name.datestring(), "2023/02/08, 06:56");
    }

    #[test]
    fn test_zip_and_manifest_names() {
        let name = ProductName::parse(EW_NAME).unwrap();
        assert_eq!(name.zip_file_name(), format!("{}.zip", EW_NAME));
        assert_eq!(
            name.manifest_path(),
            PathBuf::from(format!("{}.SAFE/manifest.safe", EW_NAME))
        );
    }

    #[test]
    fn test_slc_name_with_padding() {
        let name = ProductName::parse(
            "S1A_IW_SLC__1SDV_20200103T170815_20200103T170842_030639_0382D5_DADE",
        )
        .unwrap();
        assert_eq!(name.product_type, ProductType::SLC);
        assert_eq!(name.polarizations, vec![Polarization::VV, Polarization::VH]);
        assert_eq!(name.co_polarization(), Polarization::VV);
    }

    #[test]
    fn test_invalid_names() {
        assert!(ProductName::parse("not_a_product").is_err());
        assert!(ProductName::parse(
            "S1A_XX_GRDM_1SDH_20230208T065619_20230208T065723_047141_05A7E5_F291"
        )
        .is_err());
        assert!(ProductName::parse(
            "S1A_EW_GRDM_1SXX_20230208T065619_20230208T065723_047141_05A7E5_F291"
        )
        .is_err());
    }

    #[test]
    fn test_basename_of() {
        assert_eq!(basename_of("/data/L1/ABC.SAFE").unwrap(), "ABC");
        assert_eq!(basename_of("ABC.zip").unwrap(), "ABC");
        assert_eq!(basename_of("/features/ABC").unwrap(), "ABC");
    }

    #[test]
    fn test_pick_annotation() {
        let names = [
            "s1a-ew-grd-hv-20230208t065619-047141-05a7e5-002.xml",
            "s1a-ew-grd-hh-20230208t065619-047141-05a7e5-001.xml",
            "readme.txt",
        ];
        let picked = Sentinel1Product::pick_annotation(names.iter().copied(), Polarization::HH);
        assert_eq!(
            picked.unwrap(),
            "s1a-ew-grd-hh-20230208t065619-047141-05a7e5-001.xml"
        );
        assert!(Sentinel1Product::pick_annotation(names.iter().copied(), Polarization::VV).is_none());
    }
}
