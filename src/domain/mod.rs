//! Domain-level structures shared across the classifier.
//!
//! These types describe what the system reasons about (classes, predictions,
//! confidence and saliency) independently of how a model is executed.

pub mod label_map;
pub mod prediction;
pub mod saliency;

pub use label_map::LabelMap;
pub use prediction::{ConfidenceBand, ConfidenceThresholds, PredictionResult};
pub use saliency::SaliencyMap;
