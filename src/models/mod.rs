//! Model and label map loading.

pub mod cache;
pub mod provider;

pub use cache::ResourceCache;
pub use provider::{
    ModelFormat, ModelHandle, load_label_map, load_model, open_model, read_label_map,
};
