//! Running a classifier and interpreting its output.

use crate::core::constants::PROBABILITY_SUM_TOLERANCE;
use crate::core::errors::{ClassifierError, ClassifierResult};
use crate::core::inference::ClassifierModel;
use crate::core::tensor::Tensor4D;
use crate::domain::{LabelMap, PredictionResult};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Runs one forward pass over a single-image batch and returns its class
/// probabilities.
pub fn predict(model: &dyn ClassifierModel, input: &Tensor4D) -> ClassifierResult<Vec<f32>> {
    if input.shape()[0] != 1 {
        return Err(ClassifierError::invalid_input(format!(
            "expected a batch of one image, got shape {:?}",
            input.shape()
        )));
    }

    let output = model.forward(input)?;
    if output.nrows() != 1 || output.ncols() == 0 {
        return Err(ClassifierError::inference_message(
            model.model_name(),
            format!(
                "expected a (1, classes) probability output, got {:?}",
                output.shape()
            ),
        ));
    }

    let probabilities = output.row(0).to_vec();
    let sum: f32 = probabilities.iter().sum();
    if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
        warn!(
            model = model.model_name(),
            sum, "output does not sum to 1; is the final activation a softmax?"
        );
    }
    debug!(
        model = model.model_name(),
        classes = probabilities.len(),
        "forward pass complete"
    );
    Ok(probabilities)
}

/// Index of the largest probability; the lowest index wins ties.
pub fn argmax(probabilities: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &p) in probabilities.iter().enumerate() {
        match best {
            Some((_, best_p)) if p <= best_p => {}
            _ => best = Some((index, p)),
        }
    }
    best.map(|(index, _)| index)
}

/// Maps a probability vector onto class names.
///
/// Every label map entry must index into `probabilities`, and the winning
/// index must have a label.
pub fn interpret(probabilities: &[f32], labels: &LabelMap) -> ClassifierResult<PredictionResult> {
    let num_classes = probabilities.len();
    if let Some(max_index) = labels.max_index().filter(|i| *i >= num_classes) {
        return Err(ClassifierError::class_index_out_of_range(
            max_index,
            num_classes,
        ));
    }

    let predicted_index = argmax(probabilities)
        .ok_or_else(|| ClassifierError::invalid_input("probability vector is empty"))?;
    let predicted_class = labels
        .name(predicted_index)
        .ok_or_else(|| ClassifierError::class_index_out_of_range(predicted_index, labels.len()))?
        .to_string();

    let distribution: BTreeMap<String, f32> = labels
        .iter()
        .map(|(index, name)| (name.to_string(), probabilities[index]))
        .collect();

    Ok(PredictionResult {
        predicted_index,
        predicted_class,
        confidence: probabilities[predicted_index],
        distribution,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::inference::LayerInfo;
    use crate::core::tensor::Tensor2D;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns fixed probabilities and counts forward passes.
    #[derive(Debug)]
    pub(crate) struct FixedModel {
        pub probabilities: Vec<f32>,
        pub calls: AtomicUsize,
    }

    impl FixedModel {
        pub(crate) fn new(probabilities: Vec<f32>) -> Self {
            Self {
                probabilities,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ClassifierModel for FixedModel {
        fn model_name(&self) -> &str {
            "fixed"
        }

        fn layers(&self) -> Vec<LayerInfo> {
            vec![LayerInfo::new("last_conv", "conv2d")]
        }

        fn forward(&self, input: &Tensor4D) -> ClassifierResult<Tensor2D> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let batch = input.shape()[0];
            let row = ndarray::Array1::from(self.probabilities.clone());
            Ok(ndarray::stack(ndarray::Axis(0), &vec![row.view(); batch])?)
        }
    }

    fn labels() -> LabelMap {
        LabelMap::from_json_str(r#"{"A": 0, "B": 1, "C": 2}"#).unwrap()
    }

    #[test]
    fn test_interpret_picks_highest_probability() {
        let result = interpret(&[0.1, 0.7, 0.2], &labels()).unwrap();
        assert_eq!(result.predicted_class, "B");
        assert_eq!(result.predicted_index, 1);
        assert!((result.confidence - 0.7).abs() < 1e-6);
        assert_eq!(result.distribution.len(), 3);
        assert!((result.distribution["A"] - 0.1).abs() < 1e-6);
        assert!((result.distribution["C"] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_interpret_tie_resolves_to_lowest_index() {
        let result = interpret(&[0.5, 0.5, 0.0], &labels()).unwrap();
        assert_eq!(result.predicted_class, "A");
        assert!((result.confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_interpret_is_idempotent() {
        let probabilities = [0.3, 0.3, 0.4];
        let labels = labels();
        assert_eq!(
            interpret(&probabilities, &labels).unwrap(),
            interpret(&probabilities, &labels).unwrap()
        );
    }

    #[test]
    fn test_label_index_beyond_output_is_rejected() {
        let labels = LabelMap::from_json_str(r#"{"A": 0, "B": 3}"#).unwrap();
        let err = interpret(&[0.2, 0.8], &labels).unwrap_err();
        assert!(matches!(
            err,
            ClassifierError::ClassIndexOutOfRange {
                index: 3,
                num_classes: 2
            }
        ));
    }

    #[test]
    fn test_unlabeled_winner_is_rejected() {
        let labels = LabelMap::from_json_str(r#"{"A": 0, "C": 2}"#).unwrap();
        let err = interpret(&[0.1, 0.8, 0.1], &labels).unwrap_err();
        assert!(matches!(
            err,
            ClassifierError::ClassIndexOutOfRange { index: 1, .. }
        ));
    }

    #[test]
    fn test_predict_runs_one_forward_pass() {
        let model = FixedModel::new(vec![0.25, 0.75]);
        let input = Tensor4D::zeros((1, 4, 4, 3));
        let probabilities = predict(&model, &input).unwrap();
        assert_eq!(probabilities, vec![0.25, 0.75]);
        assert_eq!(model.calls(), 1);
        assert!((probabilities.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_predict_rejects_batches() {
        let model = FixedModel::new(vec![1.0]);
        let input = Tensor4D::zeros((2, 4, 4, 3));
        assert!(predict(&model, &input).is_err());
        assert_eq!(model.calls(), 0);
    }

    #[test]
    fn test_predict_rejects_empty_output() {
        let model = FixedModel::new(vec![]);
        let input = Tensor4D::zeros((1, 4, 4, 3));
        assert!(matches!(
            predict(&model, &input).unwrap_err(),
            ClassifierError::Inference { .. }
        ));
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[]), None);
        assert_eq!(argmax(&[0.1, 0.9, 0.9]), Some(1));
        assert_eq!(argmax(&[0.0, 0.0]), Some(0));
    }
}
