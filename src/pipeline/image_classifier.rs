//! The upload → preprocess → predict → report pipeline.

use super::report::{ClassificationReport, SaliencySummary};
use crate::core::config::{ClassifierConfig, ConfigValidator};
use crate::core::errors::{ClassifierError, ClassifierResult};
use crate::domain::{ConfidenceBand, ConfidenceThresholds, LabelMap, PredictionResult, SaliencyMap};
use crate::models::{ModelHandle, load_label_map, load_model};
use crate::predictor::{explain, interpret, predict};
use crate::processors::{ImagePreprocessor, ResizeFilter, decode_image};
use crate::utils::image::{dynamic_to_rgb, load_image};
use crate::utils::visualization::{OverlayConfig, overlay};
use image::{DynamicImage, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Saliency for one class on one photo.
#[derive(Debug, Clone)]
pub struct Explanation {
    /// Prediction for the photo, independent of the explained class.
    pub prediction: PredictionResult,
    pub class_index: usize,
    pub class_name: String,
    /// Layer the saliency was taken from.
    pub layer: String,
    /// Saliency at the layer's resolution.
    pub saliency: SaliencyMap,
    /// Heatmap blended over the photo at its original size.
    pub overlay: RgbImage,
}

impl Explanation {
    pub fn summary(&self) -> SaliencySummary {
        SaliencySummary::new(&self.layer, &self.saliency)
    }
}

/// A loaded model and its label map, ready to classify photos.
///
/// Instances are immutable; the model and label map are shared with every
/// other classifier built from the same paths.
#[derive(Debug, Clone)]
pub struct ImageClassifier {
    model: ModelHandle,
    labels: Arc<LabelMap>,
    preprocessor: ImagePreprocessor,
    saliency_layer: String,
    thresholds: ConfidenceThresholds,
    overlay: OverlayConfig,
}

impl ImageClassifier {
    pub fn builder() -> ImageClassifierBuilder {
        ImageClassifierBuilder::new()
    }

    /// Loads (or reuses) the configured model and label map.
    pub fn from_config(config: ClassifierConfig) -> ClassifierResult<Self> {
        config.validate()?;
        let model = load_model(&config.model_path)?;
        let labels = load_label_map(&config.label_map_path)?;
        Self::from_parts(model, labels, config)
    }

    /// Assembles a classifier from already loaded parts.
    pub fn from_parts(
        model: ModelHandle,
        labels: Arc<LabelMap>,
        config: ClassifierConfig,
    ) -> ClassifierResult<Self> {
        config.validate()?;
        let input_size = config.input_size();
        if let Some(expected) = model.expected_input_size().filter(|s| *s != input_size) {
            return Err(ClassifierError::config_error(format!(
                "model '{}' expects {}x{} inputs but input_size is {}x{}",
                model.model_name(),
                expected.0,
                expected.1,
                input_size.0,
                input_size.1
            )));
        }

        info!(
            model = model.model_name(),
            classes = labels.len(),
            height = input_size.0,
            width = input_size.1,
            "image classifier ready"
        );
        Ok(Self {
            model,
            labels,
            preprocessor: ImagePreprocessor::new(input_size, config.resize_filter),
            saliency_layer: config.saliency_layer,
            thresholds: config.confidence,
            overlay: config.overlay,
        })
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    pub fn labels(&self) -> &Arc<LabelMap> {
        &self.labels
    }

    pub fn saliency_layer(&self) -> &str {
        &self.saliency_layer
    }

    pub fn thresholds(&self) -> &ConfidenceThresholds {
        &self.thresholds
    }

    pub fn band(&self, prediction: &PredictionResult) -> ConfidenceBand {
        self.thresholds.band(prediction.confidence)
    }

    /// Classifies an encoded upload. Undecodable bytes never reach the model.
    pub fn classify_bytes(&self, bytes: &[u8]) -> ClassifierResult<PredictionResult> {
        let image = decode_image(bytes)?;
        self.classify_image(&image)
    }

    pub fn classify_path(&self, path: &Path) -> ClassifierResult<PredictionResult> {
        let image = load_image(path)?;
        self.classify_image(&image)
    }

    pub fn classify_image(&self, image: &DynamicImage) -> ClassifierResult<PredictionResult> {
        let input = self.preprocessor.preprocess(image)?;
        let probabilities = predict(self.model.as_ref(), &input)?;
        let result = interpret(&probabilities, &self.labels)?;
        debug!(
            class = %result.predicted_class,
            confidence = result.confidence,
            "classified image"
        );
        Ok(result)
    }

    /// Explains the decision for `class`, or for the predicted class when `None`.
    pub fn explain(
        &self,
        image: &DynamicImage,
        class: Option<&str>,
    ) -> ClassifierResult<Explanation> {
        let input = self.preprocessor.preprocess(image)?;
        let probabilities = predict(self.model.as_ref(), &input)?;
        let prediction = interpret(&probabilities, &self.labels)?;

        let (class_index, class_name) = match class {
            Some(name) => {
                let index = self.labels.index_of(name).ok_or_else(|| {
                    ClassifierError::invalid_input(format!(
                        "unknown class '{}'; known classes: {}",
                        name,
                        self.labels
                            .iter()
                            .map(|(_, n)| n)
                            .collect::<Vec<_>>()
                            .join(", ")
                    ))
                })?;
                (index, name.to_string())
            }
            None => (
                prediction.predicted_index,
                prediction.predicted_class.clone(),
            ),
        };

        let saliency = explain(
            self.model.as_ref(),
            &input,
            class_index,
            &self.saliency_layer,
        )?;
        let photo = dynamic_to_rgb(image.clone());
        let overlay = overlay(&photo, &saliency, &self.overlay);

        Ok(Explanation {
            prediction,
            class_index,
            class_name,
            layer: self.saliency_layer.clone(),
            saliency,
            overlay,
        })
    }

    /// Builds a report for a prediction, with the saliency summary when given.
    pub fn report(
        &self,
        prediction: &PredictionResult,
        explanation: Option<&Explanation>,
    ) -> ClassificationReport {
        ClassificationReport::new(
            prediction,
            explanation.map(Explanation::summary),
            &self.thresholds,
        )
    }
}

/// Builder for [`ImageClassifier`].
///
/// Starts from [`ClassifierConfig::default`]; setters override single fields.
#[derive(Debug, Clone, Default)]
pub struct ImageClassifierBuilder {
    config: ClassifierConfig,
}

impl ImageClassifierBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder from an existing configuration.
    pub fn from_config(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.model_path = path.into();
        self
    }

    pub fn label_map_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.label_map_path = path.into();
        self
    }

    /// Sets the model input size as `(height, width)`.
    pub fn input_size(mut self, height: u32, width: u32) -> Self {
        self.config.input_size = [height, width];
        self
    }

    pub fn resize_filter(mut self, filter: ResizeFilter) -> Self {
        self.config.resize_filter = filter;
        self
    }

    pub fn saliency_layer(mut self, layer: impl Into<String>) -> Self {
        self.config.saliency_layer = layer.into();
        self
    }

    pub fn confidence_thresholds(mut self, thresholds: ConfidenceThresholds) -> Self {
        self.config.confidence = thresholds;
        self
    }

    pub fn overlay_alpha(mut self, alpha: f32) -> Self {
        self.config.overlay.alpha = alpha;
        self
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn build(self) -> ClassifierResult<ImageClassifier> {
        ImageClassifier::from_config(self.config)
    }
}
