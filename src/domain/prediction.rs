//! Classification results and confidence banding.

use crate::core::constants::{
    DEFAULT_CONFIDENT_THRESHOLD, DEFAULT_UNCERTAIN_THRESHOLD, DEFAULT_VERY_CONFIDENT_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The outcome of classifying one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    /// Output index of the winning class.
    pub predicted_index: usize,
    /// Name of the winning class.
    pub predicted_class: String,
    /// Probability of the winning class.
    pub confidence: f32,
    /// Probability of every class in the label map, keyed by name.
    pub distribution: BTreeMap<String, f32>,
}

impl PredictionResult {
    /// Classes sorted by probability (highest first), ties by name.
    pub fn ranked(&self) -> Vec<(&str, f32)> {
        let mut ranked: Vec<(&str, f32)> = self
            .distribution
            .iter()
            .map(|(name, p)| (name.as_str(), *p))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

/// Coarse description of how sure the model is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    VeryConfident,
    Confident,
    Uncertain,
    NotConfident,
}

impl ConfidenceBand {
    pub fn label(self) -> &'static str {
        match self {
            ConfidenceBand::VeryConfident => "very confident",
            ConfidenceBand::Confident => "confident",
            ConfidenceBand::Uncertain => "uncertain",
            ConfidenceBand::NotConfident => "not confident",
        }
    }
}

impl fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lower bounds (exclusive) of each confidence band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceThresholds {
    pub very_confident: f32,
    pub confident: f32,
    pub uncertain: f32,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            very_confident: DEFAULT_VERY_CONFIDENT_THRESHOLD,
            confident: DEFAULT_CONFIDENT_THRESHOLD,
            uncertain: DEFAULT_UNCERTAIN_THRESHOLD,
        }
    }
}

impl ConfidenceThresholds {
    pub fn band(&self, confidence: f32) -> ConfidenceBand {
        if confidence > self.very_confident {
            ConfidenceBand::VeryConfident
        } else if confidence > self.confident {
            ConfidenceBand::Confident
        } else if confidence > self.uncertain {
            ConfidenceBand::Uncertain
        } else {
            ConfidenceBand::NotConfident
        }
    }
}
