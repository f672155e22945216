//! Grad-CAM saliency for a classifier decision.

use crate::core::errors::{ClassifierError, ClassifierResult};
use crate::core::inference::{ClassifierModel, LayerInfo};
use crate::core::tensor::Tensor4D;
use crate::domain::SaliencyMap;
use crate::processors::grad_cam;
use tracing::{debug, info};

/// Computes the saliency of `class_index` at `layer` for one input image.
///
/// The layer must exist in the model and produce a spatial feature map. The
/// engine has to support reverse-mode differentiation; ONNX models report
/// `GradientUnsupported`.
pub fn explain(
    model: &dyn ClassifierModel,
    input: &Tensor4D,
    class_index: usize,
    layer: &str,
) -> ClassifierResult<SaliencyMap> {
    if !model.has_layer(layer) {
        return Err(ClassifierError::layer_not_found(
            layer,
            model.model_name(),
            model.layers().into_iter().map(|l| l.name).collect(),
        ));
    }

    let captured = model.layer_gradients(input, layer, class_index)?;
    debug!(
        model = model.model_name(),
        layer,
        class_index,
        feature_map = ?captured.activations.shape(),
        "captured layer gradients"
    );

    let saliency = grad_cam(captured.activations.view(), captured.gradients.view())?;
    if saliency.is_all_zero() {
        info!(
            model = model.model_name(),
            layer, class_index, "no region contributes positively to the class"
        );
    }
    Ok(saliency)
}

/// Lists the layers that can be targeted by [`explain`], in execution order.
pub fn inspect_layers(model: &dyn ClassifierModel) -> Vec<LayerInfo> {
    model.layers()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::classifier::tests::FixedModel;

    #[test]
    fn test_unknown_layer_lists_available_layers() {
        let model = FixedModel::new(vec![0.5, 0.5]);
        let input = Tensor4D::zeros((1, 4, 4, 3));
        let err = explain(&model, &input, 0, "does_not_exist").unwrap_err();
        match err {
            ClassifierError::LayerNotFound {
                layer, available, ..
            } => {
                assert_eq!(layer, "does_not_exist");
                assert_eq!(available, vec!["last_conv".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(model.calls(), 0);
    }

    #[test]
    fn test_forward_only_model_reports_gradient_unsupported() {
        let model = FixedModel::new(vec![0.5, 0.5]);
        let input = Tensor4D::zeros((1, 4, 4, 3));
        let err = explain(&model, &input, 0, "last_conv").unwrap_err();
        assert!(matches!(err, ClassifierError::GradientUnsupported { .. }));
    }

    #[test]
    fn test_inspect_layers() {
        let model = FixedModel::new(vec![1.0]);
        let layers = inspect_layers(&model);
        assert_eq!(layers, vec![LayerInfo::new("last_conv", "conv2d")]);
    }
}
