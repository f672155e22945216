//! Gradient-weighted class activation mapping.
//!
//! Given the feature maps `A` of a convolutional layer and the gradient `G` of a
//! class score with respect to them (both `(height, width, channels)`):
//!
//! 1. each channel weight is the spatial mean of its gradient,
//! 2. the map is the weight-wise sum of the feature maps,
//! 3. negative values are clipped to zero,
//! 4. the map is divided by its maximum so it lies in `[0, 1]`.
//!
//! When no location contributes positively the map is all zeros instead of a
//! division by zero.

use crate::core::errors::{ClassifierError, ClassifierResult, SimpleError};
use crate::domain::SaliencyMap;
use ndarray::{ArrayView3, Axis};

/// Computes a normalized Grad-CAM map at the layer's spatial resolution.
pub fn grad_cam(
    activations: ArrayView3<'_, f32>,
    gradients: ArrayView3<'_, f32>,
) -> ClassifierResult<SaliencyMap> {
    if activations.shape() != gradients.shape() {
        return Err(ClassifierError::saliency(
            "activation and gradient shapes differ",
            SimpleError::new(format!(
                "{:?} vs {:?}",
                activations.shape(),
                gradients.shape()
            )),
        ));
    }
    let (height, width, channels) = activations.dim();
    if height == 0 || width == 0 || channels == 0 {
        return Err(ClassifierError::saliency(
            "empty feature map",
            SimpleError::new(format!("shape {:?}", activations.shape())),
        ));
    }

    let weights = gradients
        .mean_axis(Axis(0))
        .and_then(|g| g.mean_axis(Axis(0)))
        .ok_or_else(|| {
            ClassifierError::saliency("gradient pooling", SimpleError::new("no spatial positions"))
        })?;

    let flat = activations
        .to_owned()
        .into_shape_with_order((height * width, channels))
        .map_err(|e| ClassifierError::saliency("flattening feature maps", e))?;
    let weighted = flat.dot(&weights).mapv(|v| v.max(0.0));

    let max = weighted.iter().copied().fold(0.0f32, f32::max);
    let normalized = if max > 0.0 && max.is_finite() {
        weighted.mapv(|v| v / max)
    } else {
        weighted.mapv(|_| 0.0)
    };

    let values = normalized
        .into_shape_with_order((height, width))
        .map_err(|e| ClassifierError::saliency("reshaping heatmap", e))?;
    Ok(SaliencyMap::new(values))
}
