//! # Photo Classifier
//!
//! Classifies photos with a pretrained convolutional network and explains the
//! decision with a Grad-CAM heatmap.
//!
//! ## Features
//!
//! - Upload → preprocess → predict → report pipeline
//! - Confidence bands and ranked per-class probabilities
//! - Grad-CAM saliency composited over the source photo
//! - ONNX Runtime models (forward only) and safetensors CNNs executed with
//!   candle (forward and backward)
//! - Process-wide model and label map caches
//!
//! ## Modules
//!
//! * [`core`] - Configuration, errors, tensor types and inference engines
//! * [`domain`] - Label maps, predictions, confidence bands and saliency maps
//! * [`models`] - Model and label map loading with caching
//! * [`predictor`] - Prediction and Grad-CAM explanation
//! * [`pipeline`] - The [`ImageClassifier`](pipeline::ImageClassifier) facade and reports
//! * [`processors`] - Decoding, resizing, normalization and Grad-CAM math
//! * [`utils`] - Image I/O, heatmap rendering and logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use photo_classifier::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let classifier = ImageClassifier::builder()
//!     .model_path("models/cnn.safetensors")
//!     .label_map_path("models/class_indices.json")
//!     .input_size(150, 150)
//!     .build()?;
//!
//! let image = load_image(Path::new("photo.jpg"))?;
//! let prediction = classifier.classify_image(&image)?;
//! let explanation = classifier.explain(&image, None)?;
//!
//! println!("{}", classifier.report(&prediction, Some(&explanation)).render_text());
//! explanation.overlay.save("photo_saliency.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### JSON Configuration
//!
//! ```rust,no_run
//! use photo_classifier::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClassifierConfig::from_path("classifier.json")?;
//! let classifier = ImageClassifier::from_config(config)?;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod domain;
pub mod models;
pub mod pipeline;
pub mod predictor;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// ```rust
/// use photo_classifier::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{
        ClassifierConfig, ClassifierError, ClassifierModel, ClassifierResult, ConfigValidator,
        init_tracing,
    };
    pub use crate::domain::{
        ConfidenceBand, ConfidenceThresholds, LabelMap, PredictionResult, SaliencyMap,
    };
    pub use crate::models::{ModelHandle, load_label_map, load_model};
    pub use crate::pipeline::{
        ClassificationReport, Explanation, ImageClassifier, ImageClassifierBuilder,
    };
    pub use crate::processors::{ResizeFilter, decode_image, preprocess};
    pub use crate::utils::{load_image, overlay};
}
