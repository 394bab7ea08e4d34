//! I/O modules for Sentinel-1 products and feature rasters

pub mod annotation;
pub mod product;
pub mod raster;

pub use annotation::{AnnotationParser, AnnotationRoot, SwathBounds};
pub use product::{basename_of, ProductContainer, ProductName, Sentinel1Product};
