//! Error types for the classification pipeline.
//!
//! All fallible operations return [`ClassifierResult`]. The variants mirror the
//! failure taxonomy of the pipeline: missing or malformed resources, images that
//! cannot be decoded, inconsistent model/label pairs, and saliency requests the
//! model cannot serve.
//!
//! # Usage
//!
//! ```rust
//! use photo_classifier::core::errors::ClassifierError;
//!
//! let err = ClassifierError::class_index_out_of_range(7, 3);
//! assert_eq!(err.to_string(), "class index 7 out of range for 3 classes");
//! ```

pub mod constructors;
pub mod types;

pub use types::{ClassifierError, ProcessingStage, SimpleError};

/// Convenient result alias for classifier operations.
pub type ClassifierResult<T> = Result<T, ClassifierError>;
