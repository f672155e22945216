//! Sequential CNN classifier executed with Candle.
//!
//! Unlike the ONNX engine, Candle records the operations applied to variables,
//! so the classifier can differentiate a class probability with respect to any
//! intermediate feature map. That is what Grad-CAM needs.

mod architecture;

pub use architecture::{Activation, CnnArchitecture, LayerSpec};

use candle_core::{D, DType, Device, IndexOp, Module, Tensor, Var};
use candle_nn::{Conv2d, Conv2dConfig, Linear, VarBuilder};
use ndarray::Array3;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use super::{ClassifierModel, LayerGradients, LayerInfo};
use crate::core::errors::{ClassifierError, ClassifierResult};
use crate::core::tensor::{Tensor2D, Tensor3D, Tensor4D};

impl Activation {
    fn apply(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            Activation::Linear => Ok(xs.clone()),
            Activation::Relu => xs.relu(),
            Activation::Sigmoid => candle_nn::ops::sigmoid(xs),
            Activation::Tanh => xs.tanh(),
            // The composed softmax keeps the backward graph; the fused
            // `softmax_last_dim` kernel has no gradient.
            Activation::Softmax => candle_nn::ops::softmax(xs, D::Minus1),
        }
    }
}

#[derive(Debug)]
enum Layer {
    Conv2d {
        conv: Conv2d,
        activation: Activation,
    },
    MaxPool2d {
        kernel_size: usize,
        stride: usize,
    },
    GlobalAvgPool,
    Flatten,
    Identity,
    Dense {
        linear: Linear,
        activation: Activation,
    },
}

impl Layer {
    fn load(spec: &LayerSpec, vb: VarBuilder) -> candle_core::Result<Self> {
        let layer = match spec {
            LayerSpec::Conv2d {
                name,
                in_channels,
                out_channels,
                kernel_size,
                stride,
                padding,
                activation,
            } => {
                let cfg = Conv2dConfig {
                    padding: *padding,
                    stride: *stride,
                    ..Default::default()
                };
                let conv =
                    candle_nn::conv2d(*in_channels, *out_channels, *kernel_size, cfg, vb.pp(name))?;
                Layer::Conv2d {
                    conv,
                    activation: *activation,
                }
            }
            LayerSpec::MaxPool2d {
                kernel_size,
                stride,
                ..
            } => Layer::MaxPool2d {
                kernel_size: *kernel_size,
                stride: stride.unwrap_or(*kernel_size),
            },
            LayerSpec::GlobalAvgPool { .. } => Layer::GlobalAvgPool,
            LayerSpec::Flatten { .. } => Layer::Flatten,
            LayerSpec::Dropout { .. } => Layer::Identity,
            LayerSpec::Dense {
                name,
                in_features,
                out_features,
                activation,
            } => Layer::Dense {
                linear: candle_nn::linear(*in_features, *out_features, vb.pp(name))?,
                activation: *activation,
            },
        };
        Ok(layer)
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            Layer::Conv2d { conv, activation } => activation.apply(&conv.forward(xs)?),
            Layer::MaxPool2d {
                kernel_size,
                stride,
            } => xs.max_pool2d_with_stride(*kernel_size, *stride),
            Layer::GlobalAvgPool => xs.mean(3)?.mean(2),
            Layer::Flatten => xs.flatten_from(1),
            Layer::Identity => Ok(xs.clone()),
            Layer::Dense { linear, activation } => activation.apply(&linear.forward(xs)?),
        }
    }
}

/// Sequential CNN classifier with gradient support.
///
/// A model on disk is a pair of files sharing a stem: `name.safetensors` holds
/// the weights and `name.json` the [`CnnArchitecture`].
#[derive(Debug)]
pub struct CandleClassifier {
    model_name: String,
    architecture: CnnArchitecture,
    layers: Vec<Layer>,
    device: Device,
}

impl CandleClassifier {
    /// Loads `weights_path` and its sibling architecture file.
    pub fn from_path(weights_path: impl AsRef<Path>) -> ClassifierResult<Self> {
        let weights_path = weights_path.as_ref();
        let architecture_path = weights_path.with_extension("json");
        let architecture = CnnArchitecture::from_path(&architecture_path)?;

        let device = Device::Cpu;
        // SAFETY: the weights file is memory-mapped read-only and must not be
        // modified while the model is alive.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device).map_err(
                |e| {
                    ClassifierError::model_load_error(
                        weights_path,
                        "failed to map safetensors weights",
                        None,
                        Some(e),
                    )
                },
            )?
        };

        let model_name = architecture.name.clone().unwrap_or_else(|| {
            weights_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown_model")
                .to_string()
        });

        Self::new(architecture, vb, model_name).map_err(|e| {
            ClassifierError::model_load_error(
                weights_path,
                "weights do not match the architecture",
                Some("check tensor names and shapes against the layer list"),
                Some(e),
            )
        })
    }

    /// Builds a classifier from in-memory weights.
    pub fn from_tensors(
        architecture: CnnArchitecture,
        tensors: HashMap<String, Tensor>,
        model_name: impl Into<String>,
    ) -> ClassifierResult<Self> {
        let model_name = model_name.into();
        architecture.validate().map_err(|reason| {
            ClassifierError::model_load_error(&model_name, reason, None, None::<ClassifierError>)
        })?;
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &Device::Cpu);
        Self::new(architecture, vb, model_name.clone()).map_err(|e| {
            ClassifierError::model_load_error(
                &model_name,
                "weights do not match the architecture",
                None,
                Some(e),
            )
        })
    }

    fn new(
        architecture: CnnArchitecture,
        vb: VarBuilder,
        model_name: String,
    ) -> candle_core::Result<Self> {
        let layers = architecture
            .layers
            .iter()
            .map(|spec| Layer::load(spec, vb.clone()))
            .collect::<candle_core::Result<Vec<_>>>()?;
        debug!(model = %model_name, layers = layers.len(), "built candle classifier");
        Ok(Self {
            model_name,
            device: vb.device().clone(),
            architecture,
            layers,
        })
    }

    pub fn architecture(&self) -> &CnnArchitecture {
        &self.architecture
    }

    fn engine_error<'a>(
        &'a self,
        context: &'a str,
    ) -> impl FnOnce(candle_core::Error) -> ClassifierError + 'a {
        move |e| ClassifierError::inference(&self.model_name, context, e)
    }

    /// Converts an NHWC ndarray batch into an NCHW Candle tensor.
    fn input_tensor(&self, input: &Tensor4D) -> ClassifierResult<Tensor> {
        let (n, h, w, c) = input.dim();
        if c != self.architecture.input_channels {
            return Err(ClassifierError::invalid_input(format!(
                "model '{}' expects {} input channels, got {}",
                self.model_name, self.architecture.input_channels, c
            )));
        }
        let data: Vec<f32> = input.iter().copied().collect();
        Tensor::from_vec(data, (n, h, w, c), &self.device)
            .and_then(|t| t.permute((0, 3, 1, 2)))
            .and_then(|t| t.contiguous())
            .map_err(self.engine_error("failed to build input tensor"))
    }

    fn run(&self, xs: Tensor, layers: &[Layer]) -> ClassifierResult<Tensor> {
        let mut xs = xs;
        for layer in layers {
            xs = layer
                .forward(&xs)
                .map_err(self.engine_error("layer forward failed"))?;
        }
        Ok(xs)
    }

    /// Converts the first item of an NCHW feature map into `(height, width, channels)`.
    fn feature_map(&self, xs: &Tensor) -> ClassifierResult<Tensor3D> {
        let hwc = xs
            .i(0)
            .and_then(|t| t.permute((1, 2, 0)))
            .and_then(|t| t.contiguous())
            .map_err(self.engine_error("failed to reorder feature map"))?;
        let (h, w, c) = hwc
            .dims3()
            .map_err(self.engine_error("feature map is not 3D"))?;
        let data = hwc
            .flatten_all()
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(self.engine_error("failed to read feature map"))?;
        Ok(Array3::from_shape_vec((h, w, c), data)?)
    }
}

impl ClassifierModel for CandleClassifier {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn layers(&self) -> Vec<LayerInfo> {
        self.architecture
            .layers
            .iter()
            .map(|spec| LayerInfo::new(spec.name(), spec.kind()))
            .collect()
    }

    fn expected_input_size(&self) -> Option<(u32, u32)> {
        self.architecture.input_size.map(|[h, w]| (h, w))
    }

    fn forward(&self, input: &Tensor4D) -> ClassifierResult<Tensor2D> {
        let xs = self.input_tensor(input)?;
        let probabilities = self.run(xs, &self.layers)?;
        let rows = probabilities
            .to_vec2::<f32>()
            .map_err(self.engine_error("failed to read probabilities"))?;
        let batch = rows.len();
        let classes = rows.first().map_or(0, Vec::len);
        Ok(Tensor2D::from_shape_vec(
            (batch, classes),
            rows.into_iter().flatten().collect(),
        )?)
    }

    fn layer_gradients(
        &self,
        input: &Tensor4D,
        layer: &str,
        class_index: usize,
    ) -> ClassifierResult<LayerGradients> {
        let position = self.architecture.position(layer).ok_or_else(|| {
            ClassifierError::layer_not_found(
                layer,
                &self.model_name,
                self.layers().into_iter().map(|l| l.name).collect(),
            )
        })?;

        // Candle's max-pool backward only routes gradients correctly when the
        // pooling windows do not overlap.
        let overlapping_pool = self.architecture.layers[position + 1..]
            .iter()
            .find_map(|spec| match spec {
                LayerSpec::MaxPool2d {
                    name,
                    kernel_size,
                    stride,
                } if stride.unwrap_or(*kernel_size) != *kernel_size => Some(name),
                _ => None,
            });
        if let Some(pool) = overlapping_pool {
            return Err(ClassifierError::gradient_unsupported(
                &self.model_name,
                format!(
                    "max_pool2d layer '{}' with stride != kernel_size has no gradient",
                    pool
                ),
            ));
        }

        let xs = self.input_tensor(input)?;
        let features = self.run(xs, &self.layers[..=position])?;
        if features.rank() != 4 {
            return Err(ClassifierError::invalid_input(format!(
                "layer '{}' produces a {}D output; saliency needs a spatial feature map",
                layer,
                features.rank()
            )));
        }

        // Re-rooting the feature map as a variable makes the head differentiable
        // with respect to it without tracking the frozen backbone.
        let features = Var::from_tensor(&features)
            .map_err(self.engine_error("failed to track feature map"))?;
        let probabilities = self.run(features.as_tensor().clone(), &self.layers[position + 1..])?;

        let num_classes = probabilities
            .dim(D::Minus1)
            .map_err(self.engine_error("probability output has no class axis"))?;
        if class_index >= num_classes {
            return Err(ClassifierError::class_index_out_of_range(
                class_index,
                num_classes,
            ));
        }

        let score = probabilities
            .i((0, class_index))
            .map_err(self.engine_error("failed to select class score"))?;
        let grads = score
            .backward()
            .map_err(self.engine_error("backward pass failed"))?;
        let gradient = grads.get(features.as_tensor()).ok_or_else(|| {
            ClassifierError::gradient_unsupported(
                &self.model_name,
                format!("class score does not depend on layer '{}'", layer),
            )
        })?;

        let probabilities = probabilities
            .i(0)
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(self.engine_error("failed to read probabilities"))?;

        debug!(
            model = %self.model_name,
            layer,
            class_index,
            "computed layer gradients"
        );

        Ok(LayerGradients {
            activations: self.feature_map(features.as_tensor())?,
            gradients: self.feature_map(gradient)?,
            probabilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    /// 1x1 conv copying R and G into two channels, global pooling and a dense
    /// head scoring `mean(R) - mean(G)` for class 0 and the opposite for class 1.
    fn contrast_model() -> CandleClassifier {
        let architecture: CnnArchitecture = serde_json::from_str(
            r#"{
                "input_size": [4, 4],
                "layers": [
                    { "type": "conv2d", "name": "last_conv", "in_channels": 3,
                      "out_channels": 2, "kernel_size": 1 },
                    { "type": "global_avg_pool", "name": "gap" },
                    { "type": "dense", "name": "fc", "in_features": 2, "out_features": 2,
                      "activation": "softmax" }
                ]
            }"#,
        )
        .unwrap();

        let device = Device::Cpu;
        let mut tensors = HashMap::new();
        tensors.insert(
            "last_conv.weight".to_string(),
            Tensor::from_vec(vec![1f32, 0., 0., 0., 1., 0.], (2, 3, 1, 1), &device).unwrap(),
        );
        tensors.insert(
            "last_conv.bias".to_string(),
            Tensor::zeros(2, DType::F32, &device).unwrap(),
        );
        tensors.insert(
            "fc.weight".to_string(),
            Tensor::from_vec(vec![1f32, -1., -1., 1.], (2, 2), &device).unwrap(),
        );
        tensors.insert(
            "fc.bias".to_string(),
            Tensor::zeros(2, DType::F32, &device).unwrap(),
        );
        CandleClassifier::from_tensors(architecture, tensors, "contrast").unwrap()
    }

    fn uniform_input(r: f32, g: f32, b: f32) -> Tensor4D {
        let mut input = Array4::<f32>::zeros((1, 4, 4, 3));
        for mut pixel in input.rows_mut() {
            pixel[0] = r;
            pixel[1] = g;
            pixel[2] = b;
        }
        input
    }

    #[test]
    fn test_forward_matches_analytic_softmax() {
        let model = contrast_model();
        let output = model.forward(&uniform_input(0.8, 0.2, 0.5)).unwrap();
        assert_eq!(output.dim(), (1, 2));

        // z = [0.6, -0.6] => p0 = sigmoid(1.2)
        let expected = 1.0 / (1.0 + (-1.2f32).exp());
        assert!((output[[0, 0]] - expected).abs() < 1e-5);
        assert!((output[[0, 0]] + output[[0, 1]] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_layer_gradients_match_analytic_values() {
        let model = contrast_model();
        let result = model
            .layer_gradients(&uniform_input(0.8, 0.2, 0.5), "last_conv", 0)
            .unwrap();

        assert_eq!(result.activations.dim(), (4, 4, 2));
        assert_eq!(result.gradients.dim(), (4, 4, 2));
        assert!((result.activations[[1, 2, 0]] - 0.8).abs() < 1e-6);
        assert!((result.activations[[3, 0, 1]] - 0.2).abs() < 1e-6);

        // d p0 / d A[c, i, j] = p0 * p1 * (W[0, c] - W[1, c]) / (H * W)
        let p0 = result.probabilities[0];
        let p1 = result.probabilities[1];
        let expected = p0 * p1 * 2.0 / 16.0;
        for g in result.gradients.slice(ndarray::s![.., .., 0]).iter() {
            assert!((g - expected).abs() < 1e-5);
        }
        for g in result.gradients.slice(ndarray::s![.., .., 1]).iter() {
            assert!((g + expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_layer_gradients_unknown_layer() {
        let model = contrast_model();
        let err = model
            .layer_gradients(&uniform_input(0.5, 0.5, 0.5), "block5_conv", 0)
            .unwrap_err();
        match err {
            ClassifierError::LayerNotFound {
                layer, available, ..
            } => {
                assert_eq!(layer, "block5_conv");
                assert_eq!(available, vec!["last_conv", "gap", "fc"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_layer_gradients_class_out_of_range() {
        let model = contrast_model();
        let err = model
            .layer_gradients(&uniform_input(0.5, 0.5, 0.5), "last_conv", 2)
            .unwrap_err();
        assert!(matches!(
            err,
            ClassifierError::ClassIndexOutOfRange {
                index: 2,
                num_classes: 2
            }
        ));
    }

    #[test]
    fn test_overlapping_max_pool_blocks_gradients() {
        let architecture: CnnArchitecture = serde_json::from_str(
            r#"{
                "input_size": [4, 4],
                "layers": [
                    { "type": "conv2d", "name": "last_conv", "in_channels": 3,
                      "out_channels": 2, "kernel_size": 1 },
                    { "type": "max_pool2d", "name": "pool", "kernel_size": 2, "stride": 1 },
                    { "type": "global_avg_pool", "name": "gap" },
                    { "type": "dense", "name": "fc", "in_features": 2, "out_features": 2,
                      "activation": "softmax" }
                ]
            }"#,
        )
        .unwrap();
        let device = Device::Cpu;
        let mut tensors = HashMap::new();
        tensors.insert(
            "last_conv.weight".to_string(),
            Tensor::from_vec(vec![1f32, 0., 0., 0., 1., 0.], (2, 3, 1, 1), &device).unwrap(),
        );
        tensors.insert(
            "last_conv.bias".to_string(),
            Tensor::zeros(2, DType::F32, &device).unwrap(),
        );
        tensors.insert(
            "fc.weight".to_string(),
            Tensor::from_vec(vec![1f32, -1., -1., 1.], (2, 2), &device).unwrap(),
        );
        tensors.insert(
            "fc.bias".to_string(),
            Tensor::zeros(2, DType::F32, &device).unwrap(),
        );
        let model = CandleClassifier::from_tensors(architecture, tensors, "overlap").unwrap();
        let input = uniform_input(0.8, 0.2, 0.5);

        // Forward passes are unaffected.
        let output = model.forward(&input).unwrap();
        assert_eq!(output.dim(), (1, 2));
        assert!((output[[0, 0]] + output[[0, 1]] - 1.0).abs() < 1e-5);

        match model.layer_gradients(&input, "last_conv", 0).unwrap_err() {
            ClassifierError::GradientUnsupported { model_name, reason } => {
                assert_eq!(model_name, "overlap");
                assert!(reason.contains("'pool'"), "{}", reason);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_layer_gradients_rejects_flat_layer() {
        let model = contrast_model();
        let err = model
            .layer_gradients(&uniform_input(0.5, 0.5, 0.5), "gap", 0)
            .unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidInput { .. }));
    }

    #[test]
    fn test_rejects_wrong_channel_count() {
        let model = contrast_model();
        let input = Array4::<f32>::zeros((1, 4, 4, 1));
        assert!(matches!(
            model.forward(&input),
            Err(ClassifierError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_missing_weights_fail_to_load() {
        let architecture: CnnArchitecture = serde_json::from_str(
            r#"{ "layers": [ { "type": "global_avg_pool", "name": "gap" },
                 { "type": "dense", "name": "fc", "in_features": 3, "out_features": 2,
                   "activation": "softmax" } ] }"#,
        )
        .unwrap();
        let result = CandleClassifier::from_tensors(architecture, HashMap::new(), "empty");
        assert!(matches!(result, Err(ClassifierError::ModelLoad { .. })));
    }
}
