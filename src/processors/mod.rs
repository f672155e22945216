//! Image and tensor processing.
//!
//! - [`preprocess`]: decoding uploads and producing `(1, H, W, 3)` input tensors
//! - [`normalization`]: pixel scaling into `[0, 1]`
//! - [`grad_cam`]: reducing layer activations and gradients to a saliency map

pub mod grad_cam;
pub mod normalization;
pub mod preprocess;
pub mod types;

pub use grad_cam::grad_cam;
pub use normalization::NormalizeImage;
pub use preprocess::{ImagePreprocessor, decode_image, preprocess};
pub use types::ResizeFilter;
