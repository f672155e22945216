//! JSON description of a sequential convolutional classifier.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::core::errors::{ClassifierError, ClassifierResult};

fn default_stride() -> usize {
    1
}

fn default_input_channels() -> usize {
    3
}

/// Activation applied to the output of a convolution or dense layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
}

/// One layer of a [`CnnArchitecture`].
///
/// Weights are looked up in the safetensors file under `"{name}.weight"` and
/// `"{name}.bias"`. Convolution weights are `(out, in, k, k)` and dense weights
/// `(out, in)`. Feature maps are channel-major (NCHW), so `flatten` orders
/// features as `channel, row, column`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Conv2d {
        name: String,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        #[serde(default = "default_stride")]
        stride: usize,
        #[serde(default)]
        padding: usize,
        #[serde(default)]
        activation: Activation,
    },
    MaxPool2d {
        name: String,
        kernel_size: usize,
        /// Defaults to `kernel_size`.
        #[serde(default)]
        stride: Option<usize>,
    },
    GlobalAvgPool {
        name: String,
    },
    Flatten {
        name: String,
    },
    /// Identity at inference time.
    Dropout {
        name: String,
    },
    Dense {
        name: String,
        in_features: usize,
        out_features: usize,
        #[serde(default)]
        activation: Activation,
    },
}

impl LayerSpec {
    pub fn name(&self) -> &str {
        match self {
            LayerSpec::Conv2d { name, .. }
            | LayerSpec::MaxPool2d { name, .. }
            | LayerSpec::GlobalAvgPool { name }
            | LayerSpec::Flatten { name }
            | LayerSpec::Dropout { name }
            | LayerSpec::Dense { name, .. } => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LayerSpec::Conv2d { .. } => "conv2d",
            LayerSpec::MaxPool2d { .. } => "max_pool2d",
            LayerSpec::GlobalAvgPool { .. } => "global_avg_pool",
            LayerSpec::Flatten { .. } => "flatten",
            LayerSpec::Dropout { .. } => "dropout",
            LayerSpec::Dense { .. } => "dense",
        }
    }
}

/// Shape of the activations flowing between layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlowShape {
    /// `(channels, height, width)`; spatial dims unknown when no input size is declared.
    Spatial {
        channels: usize,
        size: Option<(usize, usize)>,
    },
    Flat(Option<usize>),
}

/// A sequential CNN: the layer list plus the input it expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CnnArchitecture {
    /// Optional display name; the file stem is used otherwise.
    #[serde(default)]
    pub name: Option<String>,
    /// Input size `[height, width]`, when fixed.
    #[serde(default)]
    pub input_size: Option<[u32; 2]>,
    #[serde(default = "default_input_channels")]
    pub input_channels: usize,
    pub layers: Vec<LayerSpec>,
}

impl CnnArchitecture {
    /// Reads and validates an architecture file.
    pub fn from_path(path: impl AsRef<Path>) -> ClassifierResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClassifierError::model_load_error(
                path,
                "failed to read architecture file",
                Some("place the architecture JSON next to the weights with the same file stem"),
                Some(e),
            )
        })?;
        let architecture: Self = serde_json::from_str(&content).map_err(|e| {
            ClassifierError::model_load_error(path, "invalid architecture JSON", None, Some(e))
        })?;
        architecture.validate().map_err(|reason| {
            ClassifierError::model_load_error(path, reason, None, None::<ClassifierError>)
        })?;
        Ok(architecture)
    }

    /// Number of output classes of the final dense layer.
    pub fn num_classes(&self) -> Option<usize> {
        match self.layers.last()? {
            LayerSpec::Dense { out_features, .. } => Some(*out_features),
            _ => None,
        }
    }

    /// Position of the layer with the given name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|layer| layer.name() == name)
    }

    /// Checks names, channel counts and (when the input size is declared) the
    /// feature count reaching each dense layer.
    pub fn validate(&self) -> Result<(), String> {
        if self.layers.is_empty() {
            return Err("architecture has no layers".to_string());
        }

        let mut seen = HashSet::new();
        for layer in &self.layers {
            let name = layer.name();
            if name.is_empty() || name.contains('.') {
                return Err(format!(
                    "layer name '{}' must be non-empty and contain no '.'",
                    name
                ));
            }
            if !seen.insert(name) {
                return Err(format!("duplicate layer name '{}'", name));
            }
        }

        match self.layers.last() {
            Some(LayerSpec::Dense {
                activation: Activation::Softmax,
                ..
            }) => {}
            _ => {
                return Err(
                    "the final layer must be a dense layer with softmax activation".to_string(),
                );
            }
        }

        let mut shape = FlowShape::Spatial {
            channels: self.input_channels,
            size: self.input_size.map(|[h, w]| (h as usize, w as usize)),
        };
        for layer in &self.layers {
            shape = Self::propagate(layer, shape)?;
        }
        Ok(())
    }

    fn propagate(layer: &LayerSpec, shape: FlowShape) -> Result<FlowShape, String> {
        match (layer, shape) {
            (
                LayerSpec::Conv2d {
                    name,
                    in_channels,
                    out_channels,
                    kernel_size,
                    stride,
                    padding,
                    ..
                },
                FlowShape::Spatial { channels, size },
            ) => {
                if *in_channels != channels {
                    return Err(format!(
                        "layer '{}' expects {} input channels but receives {}",
                        name, in_channels, channels
                    ));
                }
                if *kernel_size == 0 || *stride == 0 {
                    return Err(format!("layer '{}' has a zero kernel or stride", name));
                }
                let size = match size {
                    Some((h, w)) => {
                        let out = |d: usize| (d + 2 * padding).checked_sub(*kernel_size);
                        match (out(h), out(w)) {
                            (Some(h), Some(w)) => Some((h / stride + 1, w / stride + 1)),
                            _ => {
                                return Err(format!(
                                    "layer '{}' kernel is larger than its {}x{} input",
                                    name, h, w
                                ));
                            }
                        }
                    }
                    None => None,
                };
                Ok(FlowShape::Spatial {
                    channels: *out_channels,
                    size,
                })
            }
            (
                LayerSpec::MaxPool2d {
                    name,
                    kernel_size,
                    stride,
                },
                FlowShape::Spatial { channels, size },
            ) => {
                let stride = stride.unwrap_or(*kernel_size);
                if *kernel_size == 0 || stride == 0 {
                    return Err(format!("layer '{}' has a zero kernel or stride", name));
                }
                let size = match size {
                    Some((h, w)) if h >= *kernel_size && w >= *kernel_size => Some((
                        (h - kernel_size) / stride + 1,
                        (w - kernel_size) / stride + 1,
                    )),
                    Some((h, w)) => {
                        return Err(format!(
                            "layer '{}' pool is larger than its {}x{} input",
                            name, h, w
                        ));
                    }
                    None => None,
                };
                Ok(FlowShape::Spatial { channels, size })
            }
            (LayerSpec::GlobalAvgPool { .. }, FlowShape::Spatial { channels, .. }) => {
                Ok(FlowShape::Flat(Some(channels)))
            }
            (LayerSpec::Flatten { .. }, FlowShape::Spatial { channels, size }) => Ok(
                FlowShape::Flat(size.map(|(h, w)| channels * h * w)),
            ),
            (LayerSpec::Flatten { .. }, flat @ FlowShape::Flat(_)) => Ok(flat),
            (LayerSpec::Dropout { .. }, shape) => Ok(shape),
            (
                LayerSpec::Dense {
                    name,
                    in_features,
                    out_features,
                    ..
                },
                FlowShape::Flat(features),
            ) => {
                match features {
                    Some(features) if features != *in_features => {
                        return Err(format!(
                            "layer '{}' expects {} input features but receives {}",
                            name, in_features, features
                        ));
                    }
                    _ => {}
                }
                Ok(FlowShape::Flat(Some(*out_features)))
            }
            (layer, FlowShape::Flat(_)) => Err(format!(
                "layer '{}' ({}) needs a spatial input but follows a flattening layer",
                layer.name(),
                layer.kind()
            )),
            (layer, FlowShape::Spatial { .. }) => Err(format!(
                "layer '{}' ({}) needs a flat input; add flatten or global_avg_pool first",
                layer.name(),
                layer.kind()
            )),
        }
    }
}
