//! Image quality assessment: brightness, contrast, sharpness, saturation and
//! a reference-object heuristic folded into one weighted score.
pub mod assessor;
pub mod preprocessing;

pub use assessor::{QualityAssessor, load_image};
