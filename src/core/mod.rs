//! The core module of the classifier.
//!
//! This module contains the fundamental components, including:
//! - Configuration management
//! - Constants used throughout the pipeline
//! - Error handling
//! - Inference engine integration
//! - Tensor type aliases
//!
//! It also provides re-exports of commonly used types and functions for convenience.

pub mod config;
pub mod constants;
pub mod errors;
pub mod inference;
pub mod tensor;

pub use crate::utils::init_tracing;
pub use config::{ClassifierConfig, ConfigError, ConfigValidator};
pub use constants::*;
pub use errors::{ClassifierError, ClassifierResult, ProcessingStage};
pub use inference::{
    CandleClassifier, ClassifierModel, LayerGradients, LayerInfo, OrtClassifier,
};
pub use tensor::{Tensor2D, Tensor3D, Tensor4D};
