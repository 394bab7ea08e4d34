use crate::io::annotation::{AnnotationParser, AnnotationRoot};
use crate::io::product::Sentinel1Product;
use crate::types::{AcquisitionMode, ByteImage, S1Error, S1Result};
use ndarray::{s, Array2};

/// File stem of the written mask
pub const SWATH_MASK_NAME: &str = "swath_mask";

/// Builds sub-swath label masks from product annotation
pub struct SwathMaskBuilder;

impl SwathMaskBuilder {
    /// Sub-swath names for an acquisition mode
    pub fn swaths_for(mode: AcquisitionMode) -> S1Result<&'static [&'static str]> {
        mode.swath_names().ok_or_else(|| {
            log::error!("Swath mask not implemented for acquisition mode {}", mode);
            S1Error::Unsupported(format!("swath mask for {} products", mode))
        })
    }

    /// Label every pixel with the 1-based number of the sub-swath covering it.
    ///
    /// Bound blocks are inclusive in both directions; blocks reaching past the
    /// image edge are clamped. Where different sub-swaths overlap, their labels add up.
    pub fn compute(annotation: &AnnotationRoot, swaths: &[&str]) -> ByteImage {
        let (lines, samples) = AnnotationParser::image_shape(annotation);
        log::debug!("Swath mask size: {} x {}", lines, samples);

        let mut mask: ByteImage = Array2::zeros((lines, samples));

        for (index, swath) in swaths.iter().enumerate() {
            let label = (index + 1) as u8;
            let covered = Self::coverage(annotation, swath, (lines, samples));
            log::debug!("Extracting swath {}/{}: {}", index + 1, swaths.len(), swath);

            ndarray::Zip::from(&mut mask)
                .and(&covered)
                .for_each(|m, &c| {
                    if c {
                        *m = m.saturating_add(label);
                    }
                });
        }

        mask
    }

    /// Pixels covered by any bound block of one sub-swath
    fn coverage(annotation: &AnnotationRoot, swath: &str, shape: (usize, usize)) -> Array2<bool> {
        let (lines, samples) = shape;
        let mut covered = Array2::from_elem(shape, false);

        for b in AnnotationParser::swath_bounds(annotation, swath) {
            let row_end = (b.last_azimuth_line + 1).min(lines);
            let col_end = (b.last_range_sample + 1).min(samples);
            if b.first_azimuth_line >= row_end || b.first_range_sample >= col_end {
                continue;
            }
            covered
                .slice_mut(s![b.first_azimuth_line..row_end, b.first_range_sample..col_end])
                .fill(true);
        }

        covered
    }

    /// Mask for a located product, from its co-polarisation annotation
    pub fn for_product(product: &Sentinel1Product) -> S1Result<ByteImage> {
        let swaths = Self::swaths_for(product.name.mode)?;
        let pol = product.name.co_polarization();
        log::debug!("Reading {} annotation for swath bounds", pol);

        let xml = product.annotation_xml(pol)?;
        let annotation = AnnotationParser::parse_annotation(&xml)?;
        Ok(Self::compute(&annotation, swaths))
    }
}
