//! Configuration for the classification pipeline.

pub mod classifier;
pub mod errors;

pub use classifier::ClassifierConfig;
pub use errors::{ConfigError, ConfigValidator};
