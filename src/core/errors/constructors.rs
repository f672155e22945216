//! Helper constructors for [`ClassifierError`].
//!
//! These keep call sites short and make sure the diagnostic context (model name,
//! path, layer, index) is always attached the same way.

use super::types::{ClassifierError, ProcessingStage, SimpleError};
use std::path::Path;

impl ClassifierError {
    #[inline]
    fn processing_with_context(
        kind: ProcessingStage,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates an inference error for the named model.
    pub fn inference(
        model_name: impl Into<String>,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Inference {
            model_name: model_name.into(),
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates an inference error that has no underlying library error.
    pub fn inference_message(model_name: impl Into<String>, context: impl Into<String>) -> Self {
        let context = context.into();
        Self::inference(model_name, context.clone(), SimpleError::new(context))
    }

    /// Creates a model loading error.
    ///
    /// `suggestion` is appended to the message to tell the operator what to check.
    pub fn model_load_error(
        model_path: impl AsRef<Path>,
        reason: impl Into<String>,
        suggestion: Option<&str>,
        source: Option<impl std::error::Error + Send + Sync + 'static>,
    ) -> Self {
        let suggestion = suggestion
            .map(|s| format!("; suggested fix: {}", s))
            .unwrap_or_default();
        Self::ModelLoad {
            model_path: model_path.as_ref().display().to_string(),
            reason: reason.into(),
            suggestion,
            source: source.map(|e| Box::new(e) as _),
        }
    }

    /// Creates an error for bytes that do not decode as an image.
    pub fn undecodable_image(error: image::ImageError) -> Self {
        Self::UnsupportedImageMode {
            reason: format!("could not decode image: {}", error),
            source: Some(error),
        }
    }

    /// Creates an error for an image that cannot be used as 3-channel color input.
    pub fn unsupported_image(reason: impl Into<String>) -> Self {
        Self::UnsupportedImageMode {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn layer_not_found(
        layer: impl Into<String>,
        model_name: impl Into<String>,
        available: Vec<String>,
    ) -> Self {
        Self::LayerNotFound {
            layer: layer.into(),
            model_name: model_name.into(),
            available,
        }
    }

    pub fn gradient_unsupported(model_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::GradientUnsupported {
            model_name: model_name.into(),
            reason: reason.into(),
        }
    }

    pub fn class_index_out_of_range(index: usize, num_classes: usize) -> Self {
        Self::ClassIndexOutOfRange { index, num_classes }
    }

    /// Creates a normalization error.
    pub fn normalization(
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(ProcessingStage::Normalization, context, error)
    }

    /// Creates a saliency computation error.
    pub fn saliency(
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(ProcessingStage::Saliency, context, error)
    }

    /// Creates a rendering error for reports and overlays.
    pub fn rendering(
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(ProcessingStage::Rendering, context, error)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}
