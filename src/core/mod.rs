//! Processing orchestration: SNAP graphs, gpt runs and derived features

pub mod batch;
pub mod extract;
pub mod gpt;
pub mod graph;
pub mod rgb;
pub mod swath_mask;

// Re-export main types
pub use batch::{read_image_list, BatchPlan, BatchReport, ProductReport};
pub use extract::{ExtractOptions, FeatureExtractor};
pub use gpt::{GptCommand, GptRunner};
pub use graph::{GraphCatalog, GraphKind, SnapGraph};
pub use rgb::{Channel, RgbComposer, RgbParams};
pub use swath_mask::SwathMaskBuilder;
