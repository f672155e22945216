//! Constants used throughout the classification pipeline.
//!
//! Default values for model locations, preprocessing, confidence bands and
//! report formatting. Every one of them can be overridden through
//! [`ClassifierConfig`](crate::core::config::ClassifierConfig).

/// The default input size `(height, width)` the model was trained on.
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (150, 150);

/// The default model location.
pub const DEFAULT_MODEL_PATH: &str = "model.safetensors";

/// The default label map location.
pub const DEFAULT_LABEL_MAP_PATH: &str = "class_indices.json";

/// The default name of the convolutional layer used for saliency maps.
pub const DEFAULT_SALIENCY_LAYER: &str = "last_conv";

/// Scale applied to 8-bit pixel values so that they land in `[0, 1]`.
pub const PIXEL_SCALE: f32 = 1.0 / 255.0;

/// Confidence above which a prediction is reported as "very confident".
pub const DEFAULT_VERY_CONFIDENT_THRESHOLD: f32 = 0.9;

/// Confidence above which a prediction is reported as "confident".
pub const DEFAULT_CONFIDENT_THRESHOLD: f32 = 0.7;

/// Confidence above which a prediction is reported as "uncertain".
/// Anything at or below it is "not confident".
pub const DEFAULT_UNCERTAIN_THRESHOLD: f32 = 0.5;

/// Weight of the heatmap when blended over the source image.
pub const DEFAULT_OVERLAY_ALPHA: f32 = 0.4;

/// Allowed deviation of a probability vector's sum from 1.
pub const PROBABILITY_SUM_TOLERANCE: f32 = 1e-3;

/// Timestamp format used inside rendered reports.
pub const REPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format used in exported report file names.
pub const REPORT_FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
