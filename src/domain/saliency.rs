use crate::core::tensor::Tensor2D;

/// A class-activation heatmap at the resolution of the layer it was taken from.
///
/// Values are non-negative with a maximum of 1, or all zero when no location
/// supported the class.
#[derive(Debug, Clone, PartialEq)]
pub struct SaliencyMap {
    values: Tensor2D,
}

impl SaliencyMap {
    pub fn new(values: Tensor2D) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &Tensor2D {
        &self.values
    }

    /// `(height, width)`.
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(0.0, f32::max)
    }

    pub fn mean(&self) -> f32 {
        self.values.mean().unwrap_or(0.0)
    }

    pub fn is_all_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }
}
