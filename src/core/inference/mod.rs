//! Inference engines for pretrained classifiers.
//!
//! Both engines implement [`ClassifierModel`], the opaque callable the rest of
//! the pipeline works against:
//!
//! - [`OrtClassifier`] runs ONNX graphs through ONNX Runtime. It performs forward
//!   passes only, so saliency requests fail with `GradientUnsupported`.
//! - [`CandleClassifier`] runs a sequential CNN described by a JSON architecture
//!   file with safetensors weights. It supports reverse-mode differentiation and
//!   therefore Grad-CAM.

pub mod candle_cnn;
pub mod ort_infer;

pub use candle_cnn::{Activation, CandleClassifier, CnnArchitecture, LayerSpec};
pub use ort_infer::OrtClassifier;

use crate::core::errors::{ClassifierError, ClassifierResult};
use crate::core::tensor::{Tensor2D, Tensor3D, Tensor4D};

/// Name and kind of a layer that can be introspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInfo {
    pub name: String,
    pub kind: String,
}

impl LayerInfo {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }
}

/// Activations of a layer and the gradient of a class score with respect to
/// them, both for the first item of the batch.
#[derive(Debug, Clone)]
pub struct LayerGradients {
    /// Layer output, `(height, width, channels)`.
    pub activations: Tensor3D,
    /// Gradient of the class score, same shape as `activations`.
    pub gradients: Tensor3D,
    /// Class probabilities produced by the same forward pass.
    pub probabilities: Vec<f32>,
}

/// A trained classifier treated as a black box.
///
/// Implementations are immutable after construction and safe to share across
/// threads.
pub trait ClassifierModel: Send + Sync + std::fmt::Debug {
    /// Human readable model name used in logs and errors.
    fn model_name(&self) -> &str;

    /// Layers available for introspection, in execution order.
    fn layers(&self) -> Vec<LayerInfo>;

    /// Whether a layer with the given name exists.
    fn has_layer(&self, name: &str) -> bool {
        self.layers().iter().any(|layer| layer.name == name)
    }

    /// The `(height, width)` the model requires, when it declares one.
    fn expected_input_size(&self) -> Option<(u32, u32)> {
        None
    }

    /// Runs a forward pass on a `(batch, height, width, 3)` tensor and returns
    /// `(batch, classes)` probabilities.
    fn forward(&self, input: &Tensor4D) -> ClassifierResult<Tensor2D>;

    /// Runs a forward and a backward pass, returning the activations of `layer`
    /// and the gradient of the probability of `class_index` with respect to them.
    fn layer_gradients(
        &self,
        _input: &Tensor4D,
        _layer: &str,
        _class_index: usize,
    ) -> ClassifierResult<LayerGradients> {
        Err(ClassifierError::gradient_unsupported(
            self.model_name(),
            "the execution engine does not expose reverse-mode differentiation",
        ))
    }
}
