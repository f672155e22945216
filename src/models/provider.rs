//! Loading models and label maps from disk.
//!
//! The `load_*` functions go through process-wide caches so every caller that
//! names the same path shares one instance. The `open_*`/`read_*` functions
//! bypass the caches.

use super::cache::ResourceCache;
use crate::core::errors::{ClassifierError, ClassifierResult};
use crate::core::inference::{CandleClassifier, ClassifierModel, OrtClassifier};
use crate::domain::LabelMap;
use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Shared, immutable handle to a loaded classifier.
pub type ModelHandle = Arc<dyn ClassifierModel>;

static MODEL_CACHE: Lazy<ResourceCache<ModelHandle>> = Lazy::new(|| ResourceCache::new("model"));
static LABEL_MAP_CACHE: Lazy<ResourceCache<Arc<LabelMap>>> =
    Lazy::new(|| ResourceCache::new("label_map"));

/// Model formats recognized by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// ONNX graph executed by ONNX Runtime.
    Onnx,
    /// Safetensors weights with a sibling architecture JSON.
    Safetensors,
}

impl ModelFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "onnx" => Some(ModelFormat::Onnx),
            "safetensors" => Some(ModelFormat::Safetensors),
            _ => None,
        }
    }
}

/// Returns the cached model for `path`, loading it on first use.
pub fn load_model(path: impl AsRef<Path>) -> ClassifierResult<ModelHandle> {
    let path = path.as_ref();
    MODEL_CACHE.get_or_try_load(path, open_model)
}

/// Loads a model without consulting the cache.
pub fn open_model(path: &Path) -> ClassifierResult<ModelHandle> {
    if !path.is_file() {
        return Err(ClassifierError::ModelNotFound {
            path: path.to_path_buf(),
        });
    }

    let model: ModelHandle = match ModelFormat::from_path(path) {
        Some(ModelFormat::Onnx) => Arc::new(OrtClassifier::from_path(path)?),
        Some(ModelFormat::Safetensors) => Arc::new(CandleClassifier::from_path(path)?),
        None => {
            return Err(ClassifierError::config_error(format!(
                "unrecognized model format for '{}': expected a .onnx or .safetensors file",
                path.display()
            )));
        }
    };

    info!(
        model = model.model_name(),
        path = %path.display(),
        layers = model.layers().len(),
        "model loaded"
    );
    Ok(model)
}

/// Returns the cached label map for `path`, loading it on first use.
pub fn load_label_map(path: impl AsRef<Path>) -> ClassifierResult<Arc<LabelMap>> {
    let path = path.as_ref();
    LABEL_MAP_CACHE.get_or_try_load(path, |p| read_label_map(p).map(Arc::new))
}

/// Reads and parses a label map without consulting the cache.
pub fn read_label_map(path: &Path) -> ClassifierResult<LabelMap> {
    if !path.is_file() {
        return Err(ClassifierError::LabelMapNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read(path)?;
    let labels =
        LabelMap::from_json_slice(&content).map_err(|reason| ClassifierError::MalformedLabelMap {
            path: path.to_path_buf(),
            reason,
        })?;
    info!(path = %path.display(), classes = labels.len(), "label map loaded");
    Ok(labels)
}
