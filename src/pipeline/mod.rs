//! High-level classification pipeline.
//!
//! [`ImageClassifier`] ties together model loading, preprocessing, prediction
//! and saliency; [`ClassificationReport`] formats the outcome.

pub mod image_classifier;
pub mod report;

pub use image_classifier::{Explanation, ImageClassifier, ImageClassifierBuilder};
pub use report::{ClassificationReport, RankedClass, SaliencySummary, format_report};
