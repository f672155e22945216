//! ONNX Runtime classifier engine.

use super::{ClassifierModel, LayerGradients, LayerInfo};
use crate::core::errors::{ClassifierError, ClassifierResult};
use crate::core::tensor::{Tensor2D, Tensor4D};
use ndarray::ArrayView2;
use ort::logging::LogLevel;
use ort::session::Session;
use ort::value::{TensorRef, ValueType};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Classifier backed by an ONNX Runtime session.
///
/// The first graph output is read as the class-probability vector. Every graph
/// output is reported as an introspectable layer, which is how exported models
/// expose intermediate feature maps. ONNX Runtime has no reverse-mode
/// differentiation, so saliency requests fail with `GradientUnsupported`.
pub struct OrtClassifier {
    session: Mutex<Session>,
    input_name: String,
    output_names: Vec<String>,
    input_shape: Option<Vec<i64>>,
    model_path: PathBuf,
    model_name: String,
}

impl std::fmt::Debug for OrtClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtClassifier")
            .field("input_name", &self.input_name)
            .field("output_names", &self.output_names)
            .field("model_path", &self.model_path)
            .field("model_name", &self.model_name)
            .finish()
    }
}

impl OrtClassifier {
    /// Creates a session for the ONNX model at `model_path`.
    pub fn from_path(model_path: impl AsRef<Path>) -> ClassifierResult<Self> {
        let path = model_path.as_ref();
        let session = Session::builder()?
            .with_log_level(LogLevel::Error)?
            .commit_from_file(path)
            .map_err(|e| {
                ClassifierError::model_load_error(
                    path,
                    "failed to create ONNX session",
                    Some("verify the model file is a valid ONNX graph"),
                    Some(e),
                )
            })?;

        let input = session.inputs.first().ok_or_else(|| {
            ClassifierError::model_load_error(
                path,
                "model declares no inputs",
                None,
                None::<ClassifierError>,
            )
        })?;
        let input_name = input.name.clone();
        let input_shape = match &input.input_type {
            ValueType::Tensor { shape, .. } => Some(shape.iter().copied().collect()),
            _ => None,
        };

        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        if output_names.is_empty() {
            return Err(ClassifierError::model_load_error(
                path,
                "model declares no outputs",
                None,
                None::<ClassifierError>,
            ));
        }

        let model_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown_model")
            .to_string();

        debug!(
            model = %model_name,
            input = %input_name,
            outputs = ?output_names,
            "created ONNX session"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_names,
            input_shape,
            model_path: path.to_path_buf(),
            model_name,
        })
    }

    /// Returns the model path associated with this engine.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn probability_output(&self) -> &str {
        // Non-empty, checked at construction.
        &self.output_names[0]
    }
}

impl ClassifierModel for OrtClassifier {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn layers(&self) -> Vec<LayerInfo> {
        self.output_names
            .iter()
            .map(|name| LayerInfo::new(name.clone(), "graph_output"))
            .collect()
    }

    fn expected_input_size(&self) -> Option<(u32, u32)> {
        // NHWC input: [batch, height, width, channels]; dynamic axes are negative.
        let shape = self.input_shape.as_ref()?;
        match shape.as_slice() {
            [_, h, w, _] if *h > 0 && *w > 0 => Some((*h as u32, *w as u32)),
            _ => None,
        }
    }

    fn forward(&self, input: &Tensor4D) -> ClassifierResult<Tensor2D> {
        let input_shape = input.shape().to_vec();
        let output_name = self.probability_output();

        let input_tensor = TensorRef::from_array_view(input.view()).map_err(|e| {
            ClassifierError::inference(
                &self.model_name,
                format!("failed to convert input tensor with shape {:?}", input_shape),
                e,
            )
        })?;
        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];

        let mut session = self.session.lock().map_err(|_| {
            ClassifierError::inference_message(&self.model_name, "session lock poisoned")
        })?;
        let outputs = session.run(inputs).map_err(|e| {
            ClassifierError::inference(
                &self.model_name,
                format!(
                    "forward pass failed for input '{}' with shape {:?}",
                    self.input_name, input_shape
                ),
                e,
            )
        })?;

        let (output_shape, output_data) = outputs[output_name]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                ClassifierError::inference(
                    &self.model_name,
                    format!("failed to extract output '{}' as f32", output_name),
                    e,
                )
            })?;

        if output_shape.len() != 2 {
            return Err(ClassifierError::inference_message(
                &self.model_name,
                format!(
                    "expected a 2D probability output, got shape {:?}",
                    output_shape.iter().collect::<Vec<_>>()
                ),
            ));
        }
        let batch = output_shape[0] as usize;
        let classes = output_shape[1] as usize;
        let view = ArrayView2::from_shape((batch, classes), output_data)?;
        Ok(view.to_owned())
    }

    fn layer_gradients(
        &self,
        _input: &Tensor4D,
        layer: &str,
        _class_index: usize,
    ) -> ClassifierResult<LayerGradients> {
        if !self.has_layer(layer) {
            return Err(ClassifierError::layer_not_found(
                layer,
                &self.model_name,
                self.output_names.clone(),
            ));
        }
        Err(ClassifierError::gradient_unsupported(
            &self.model_name,
            "ONNX Runtime executes forward passes only",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_fails_for_invalid_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.onnx");
        std::fs::write(&path, b"not an onnx graph").unwrap();

        let result = OrtClassifier::from_path(&path);
        assert!(result.is_err());
    }
}
