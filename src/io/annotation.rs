use crate::types::{S1Error, S1Result};
use quick_xml::de::from_str;
use serde::Deserialize;

/// Subset of the Sentinel-1 product annotation needed for swath masks.
/// This represents the root <product> element directly
#[derive(Debug, Deserialize)]
pub struct AnnotationRoot {
    #[serde(rename = "imageAnnotation")]
    pub image_annotation: ImageAnnotation,
    #[serde(rename = "swathMerging", default)]
    pub swath_merging: Option<SwathMerging>,
}

#[derive(Debug, Deserialize)]
pub struct ImageAnnotation {
    #[serde(rename = "imageInformation")]
    pub image_information: ImageInformation,
}

#[derive(Debug, Deserialize)]
pub struct ImageInformation {
    #[serde(rename = "numberOfSamples")]
    pub number_of_samples: usize,
    #[serde(rename = "numberOfLines")]
    pub number_of_lines: usize,
}

#[derive(Debug, Deserialize)]
pub struct SwathMerging {
    #[serde(rename = "swathMergeList")]
    pub swath_merge_list: SwathMergeList,
}

#[derive(Debug, Deserialize)]
pub struct SwathMergeList {
    #[serde(rename = "swathMerge", default)]
    pub swath_merges: Vec<SwathMerge>,
}

#[derive(Debug, Deserialize)]
pub struct SwathMerge {
    #[serde(rename = "swath")]
    pub swath: String,
    #[serde(rename = "swathBoundsList")]
    pub swath_bounds_list: SwathBoundsList,
}

#[derive(Debug, Deserialize)]
pub struct SwathBoundsList {
    #[serde(rename = "swathBounds", default)]
    pub swath_bounds: Vec<SwathBounds>,
}

/// Inclusive pixel bounds of one block of a sub-swath
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SwathBounds {
    #[serde(rename = "firstAzimuthLine")]
    pub first_azimuth_line: usize,
    #[serde(rename = "firstRangeSample")]
    pub first_range_sample: usize,
    #[serde(rename = "lastAzimuthLine")]
    pub last_azimuth_line: usize,
    #[serde(rename = "lastRangeSample")]
    pub last_range_sample: usize,
}

/// Parser for Sentinel-1 annotation XML files
pub struct AnnotationParser;

impl AnnotationParser {
    /// Parse annotation XML
    pub fn parse_annotation(xml_content: &str) -> S1Result<AnnotationRoot> {
        from_str::<AnnotationRoot>(xml_content)
            .map_err(|e| S1Error::XmlParsing(format!("Failed to parse annotation XML: {}", e)))
    }

    /// Image size as (lines, samples)
    pub fn image_shape(annotation: &AnnotationRoot) -> (usize, usize) {
        let info = &annotation.image_annotation.image_information;
        (info.number_of_lines, info.number_of_samples)
    }

    /// All bound blocks listed for a sub-swath, empty when the swath is absent
    pub fn swath_bounds<'a>(annotation: &'a AnnotationRoot, swath: &str) -> Vec<&'a SwathBounds> {
        annotation
            .swath_merging
            .iter()
            .flat_map(|m| m.swath_merge_list.swath_merges.iter())
            .filter(|m| m.swath.trim() == swath)
            .flat_map(|m| m.swath_bounds_list.swath_bounds.iter())
            .collect()
    }
}
