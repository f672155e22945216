//! Top-level configuration of the classification pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::errors::{ConfigError, ConfigValidator};
use crate::core::constants::{
    DEFAULT_INPUT_SIZE, DEFAULT_LABEL_MAP_PATH, DEFAULT_MODEL_PATH, DEFAULT_SALIENCY_LAYER,
};
use crate::domain::ConfidenceThresholds;
use crate::processors::ResizeFilter;
use crate::utils::visualization::OverlayConfig;

/// Configuration for [`ImageClassifier`](crate::pipeline::ImageClassifier).
///
/// Every field has a default, so a JSON file only needs to name the values it
/// changes:
///
/// ```rust
/// use photo_classifier::core::config::ClassifierConfig;
///
/// let config: ClassifierConfig = serde_json::from_str(r#"
/// {
///   "model_path": "models/cnn.safetensors",
///   "input_size": [224, 224],
///   "confidence": { "very_confident": 0.95, "confident": 0.8, "uncertain": 0.5 }
/// }
/// "#).unwrap();
///
/// assert_eq!(config.input_size, [224, 224]);
/// assert_eq!(config.saliency_layer, "last_conv");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Serialized model, `.onnx` or `.safetensors`.
    pub model_path: PathBuf,
    /// JSON object mapping class names to output indices.
    pub label_map_path: PathBuf,
    /// Model input size as `[height, width]`.
    pub input_size: [u32; 2],
    /// Resampling filter used when resizing inputs.
    pub resize_filter: ResizeFilter,
    /// Convolutional layer used as the saliency source.
    pub saliency_layer: String,
    /// Thresholds for the confidence bands.
    pub confidence: ConfidenceThresholds,
    /// Heatmap overlay settings.
    pub overlay: OverlayConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            label_map_path: PathBuf::from(DEFAULT_LABEL_MAP_PATH),
            input_size: [DEFAULT_INPUT_SIZE.0, DEFAULT_INPUT_SIZE.1],
            resize_filter: ResizeFilter::default(),
            saliency_layer: DEFAULT_SALIENCY_LAYER.to_string(),
            confidence: ConfidenceThresholds::default(),
            overlay: OverlayConfig::default(),
        }
    }
}

impl ClassifierConfig {
    /// Loads a configuration from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Returns the input size as `(height, width)`.
    pub fn input_size(&self) -> (u32, u32) {
        (self.input_size[0], self.input_size[1])
    }
}

impl ConfigValidator for ClassifierConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_image_dimensions(self.input_size[0], self.input_size[1])?;

        if self.saliency_layer.trim().is_empty() {
            return Err(ConfigError::InvalidConfig {
                message: "saliency_layer must not be empty".to_string(),
            });
        }

        let thresholds = &self.confidence;
        self.validate_unit_interval("confidence.very_confident", thresholds.very_confident)?;
        self.validate_unit_interval("confidence.confident", thresholds.confident)?;
        self.validate_unit_interval("confidence.uncertain", thresholds.uncertain)?;
        if !(thresholds.very_confident > thresholds.confident
            && thresholds.confident > thresholds.uncertain)
        {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "confidence thresholds must be strictly descending, got {} / {} / {}",
                    thresholds.very_confident, thresholds.confident, thresholds.uncertain
                ),
            });
        }

        self.validate_unit_interval("overlay.alpha", self.overlay.alpha)?;
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}
