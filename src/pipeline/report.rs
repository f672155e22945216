//! Human-readable and JSON classification reports.

use crate::core::constants::{REPORT_FILE_TIMESTAMP_FORMAT, REPORT_TIMESTAMP_FORMAT};
use crate::core::errors::{ClassifierError, ClassifierResult};
use crate::domain::{ConfidenceBand, ConfidenceThresholds, PredictionResult, SaliencyMap};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// One entry of the ranked class list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedClass {
    pub name: String,
    pub probability: f32,
}

/// Shape and mean activation of the saliency map included in a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaliencySummary {
    pub layer: String,
    pub height: usize,
    pub width: usize,
    pub mean_activation: f32,
}

impl SaliencySummary {
    pub fn new(layer: impl Into<String>, saliency: &SaliencyMap) -> Self {
        let (height, width) = saliency.shape();
        Self {
            layer: layer.into(),
            height,
            width,
            mean_activation: saliency.mean(),
        }
    }
}

/// A classification outcome stamped with the local time it was produced.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationReport {
    pub predicted_class: String,
    pub confidence: f32,
    pub band: ConfidenceBand,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Local>,
    /// Classes sorted by probability, highest first.
    pub ranking: Vec<RankedClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saliency: Option<SaliencySummary>,
}

fn serialize_timestamp<S: serde::Serializer>(
    timestamp: &DateTime<Local>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&timestamp.format(REPORT_TIMESTAMP_FORMAT).to_string())
}

impl ClassificationReport {
    /// Builds a report stamped with the current local time.
    pub fn new(
        prediction: &PredictionResult,
        saliency: Option<SaliencySummary>,
        thresholds: &ConfidenceThresholds,
    ) -> Self {
        Self::at(prediction, saliency, thresholds, Local::now())
    }

    /// Builds a report with an explicit timestamp.
    pub fn at(
        prediction: &PredictionResult,
        saliency: Option<SaliencySummary>,
        thresholds: &ConfidenceThresholds,
        timestamp: DateTime<Local>,
    ) -> Self {
        let ranking = prediction
            .ranked()
            .into_iter()
            .map(|(name, probability)| RankedClass {
                name: name.to_string(),
                probability,
            })
            .collect();
        Self {
            predicted_class: prediction.predicted_class.clone(),
            confidence: prediction.confidence,
            band: thresholds.band(prediction.confidence),
            timestamp,
            ranking,
            saliency,
        }
    }

    /// Plain-text rendering, one fact per line.
    pub fn render_text(&self) -> String {
        self.to_string()
    }

    pub fn to_json(&self) -> ClassifierResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ClassifierError::rendering("failed to serialize report", e))
    }

    /// `classification_<timestamp>.txt`.
    pub fn default_file_name(&self) -> String {
        format!(
            "classification_{}.txt",
            self.timestamp.format(REPORT_FILE_TIMESTAMP_FORMAT)
        )
    }

    /// Writes the text report into `dir` under [`default_file_name`](Self::default_file_name).
    pub fn write_to(&self, dir: &Path) -> ClassifierResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.default_file_name());
        std::fs::write(&path, self.render_text())?;
        Ok(path)
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Classification report")?;
        writeln!(
            f,
            "Timestamp: {}",
            self.timestamp.format(REPORT_TIMESTAMP_FORMAT)
        )?;
        writeln!(f, "Predicted class: {}", self.predicted_class)?;
        writeln!(f, "Confidence: {:.2}%", self.confidence * 100.0)?;
        writeln!(f, "Assessment: {}", self.band)?;
        writeln!(f)?;
        writeln!(f, "Class probabilities:")?;
        for class in &self.ranking {
            writeln!(f, "- {}: {:.2}%", class.name, class.probability * 100.0)?;
        }
        if let Some(saliency) = &self.saliency {
            writeln!(f)?;
            writeln!(f, "Saliency ({}):", saliency.layer)?;
            writeln!(f, "- map size: {}x{}", saliency.height, saliency.width)?;
            writeln!(f, "- mean activation: {:.4}", saliency.mean_activation)?;
        }
        Ok(())
    }
}

/// Renders a prediction as a text report stamped with the current time.
pub fn format_report(
    prediction: &PredictionResult,
    saliency: Option<SaliencySummary>,
    thresholds: &ConfidenceThresholds,
) -> String {
    ClassificationReport::new(prediction, saliency, thresholds).render_text()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ndarray::Array2;
    use std::collections::BTreeMap;

    fn prediction() -> PredictionResult {
        PredictionResult {
            predicted_index: 1,
            predicted_class: "dog".to_string(),
            confidence: 0.8125,
            distribution: BTreeMap::from([
                ("cat".to_string(), 0.125),
                ("dog".to_string(), 0.8125),
                ("fox".to_string(), 0.0625),
            ]),
        }
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).single().unwrap()
    }

    #[test]
    fn test_render_text() {
        let report = ClassificationReport::at(
            &prediction(),
            None,
            &ConfidenceThresholds::default(),
            fixed_time(),
        );
        let text = report.render_text();

        assert!(text.contains("Timestamp: 2024-03-09 14:05:07"));
        assert!(text.contains("Predicted class: dog"));
        assert!(text.contains("Confidence: 81.25%"));
        assert!(text.contains("Assessment: confident"));
        let dog = text.find("- dog: 81.25%").unwrap();
        let cat = text.find("- cat: 12.50%").unwrap();
        let fox = text.find("- fox: 6.25%").unwrap();
        assert!(dog < cat && cat < fox);
        assert!(!text.contains("Saliency"));
    }

    #[test]
    fn test_display_matches_render_text() {
        let report = ClassificationReport::at(
            &prediction(),
            None,
            &ConfidenceThresholds::default(),
            fixed_time(),
        );
        let mut buffer = String::new();
        std::fmt::Write::write_fmt(&mut buffer, format_args!("{report}")).unwrap();
        assert_eq!(buffer, report.render_text());
        assert!(buffer.starts_with("Classification report\nTimestamp: 2024-03-09 14:05:07\n"));
        assert!(buffer.ends_with("- fox: 6.25%\n"));
    }

    #[test]
    fn test_saliency_summary_is_rendered() {
        let saliency = SaliencyMap::new(Array2::from_elem((4, 6), 0.5));
        let report = ClassificationReport::at(
            &prediction(),
            Some(SaliencySummary::new("last_conv", &saliency)),
            &ConfidenceThresholds::default(),
            fixed_time(),
        );
        let text = report.render_text();
        assert!(text.contains("Saliency (last_conv):"));
        assert!(text.contains("- map size: 4x6"));
        assert!(text.contains("- mean activation: 0.5000"));
    }

    #[test]
    fn test_file_name_and_json() {
        let report = ClassificationReport::at(
            &prediction(),
            None,
            &ConfidenceThresholds::default(),
            fixed_time(),
        );
        assert_eq!(report.default_file_name(), "classification_20240309_140507.txt");

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["predicted_class"], "dog");
        assert_eq!(json["band"], "confident");
        assert_eq!(json["timestamp"], "2024-03-09 14:05:07");
        assert_eq!(json["ranking"][0]["name"], "dog");
        assert!(json.get("saliency").is_none());
    }

    #[test]
    fn test_write_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let report = ClassificationReport::at(
            &prediction(),
            None,
            &ConfidenceThresholds::default(),
            fixed_time(),
        );
        let path = report.write_to(&dir.path().join("reports")).unwrap();
        assert!(path.ends_with("classification_20240309_140507.txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), report.render_text());
    }
}
