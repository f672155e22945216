//! Prediction and explanation over a loaded classifier.

pub mod classifier;
pub mod explainer;

pub use classifier::{argmax, interpret, predict};
pub use explainer::{explain, inspect_layers};
