//! Error type definitions for the classification pipeline.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::config::ConfigError;

/// Stage of the pipeline in which a processing error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Error occurred during pixel normalization.
    Normalization,
    /// Error occurred while computing a saliency map.
    Saliency,
    /// Error occurred while rendering a report or overlay.
    Rendering,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::Normalization => write!(f, "normalization"),
            ProcessingStage::Saliency => write!(f, "saliency"),
            ProcessingStage::Rendering => write!(f, "rendering"),
        }
    }
}

/// A plain message error, used as the `source` of wrapped errors that have no
/// underlying library error.
#[derive(Debug, Clone)]
pub struct SimpleError {
    message: String,
}

impl SimpleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SimpleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SimpleError {}

/// Errors produced by model loading, preprocessing, prediction, saliency and
/// report rendering.
///
/// Every variant is terminal for the request that raised it. None of them is
/// retried internally.
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// The model file does not exist.
    #[error("model not found at '{}'", .path.display())]
    ModelNotFound { path: PathBuf },

    /// The model file exists but could not be loaded.
    #[error("failed to load model '{model_path}': {reason}{suggestion}")]
    ModelLoad {
        model_path: String,
        reason: String,
        suggestion: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The label map file does not exist.
    #[error("label map not found at '{}'", .path.display())]
    LabelMapNotFound { path: PathBuf },

    /// The label map could not be parsed as a name to index mapping.
    #[error("malformed label map '{}': {reason}", .path.display())]
    MalformedLabelMap { path: PathBuf, reason: String },

    /// The input could not be decoded or converted to 3-channel color.
    #[error("unsupported image: {reason}")]
    UnsupportedImageMode {
        reason: String,
        #[source]
        source: Option<image::ImageError>,
    },

    /// A class index has no entry in the label map or the model output.
    #[error("class index {index} out of range for {num_classes} classes")]
    ClassIndexOutOfRange { index: usize, num_classes: usize },

    /// The requested layer does not exist in the model.
    #[error("layer '{layer}' not found in model '{model_name}' (available: {})", .available.join(", "))]
    LayerNotFound {
        layer: String,
        model_name: String,
        available: Vec<String>,
    },

    /// The execution engine cannot differentiate through the model.
    #[error("model '{model_name}' does not support gradient computation: {reason}")]
    GradientUnsupported { model_name: String, reason: String },

    /// Error raised by an inference engine.
    #[error("inference failed in model '{model_name}': {context}")]
    Inference {
        model_name: String,
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error raised while transforming data between pipeline stages.
    #[error("{kind} failed: {context}")]
    Processing {
        kind: ProcessingStage,
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Invalid caller input.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Invalid configuration value.
    #[error("configuration: {message}")]
    ConfigError { message: String },

    /// Configuration validation failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from ndarray shape operations.
    #[error("tensor shape error: {0}")]
    Tensor(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
