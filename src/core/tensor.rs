//! Tensor aliases shared by the preprocessing, inference and saliency stages.

/// 2D f32 tensor, `(batch, classes)` for model outputs.
pub type Tensor2D = ndarray::Array2<f32>;

/// 3D f32 tensor, `(height, width, channels)` for feature maps.
pub type Tensor3D = ndarray::Array3<f32>;

/// 4D f32 tensor, `(batch, height, width, channels)` for model inputs.
pub type Tensor4D = ndarray::Array4<f32>;
