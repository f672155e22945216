//! Utility functions for the classifier.
//!
//! This module provides image I/O helpers, saliency rendering and logging setup.

pub mod image;
pub mod visualization;

pub use self::image::{dynamic_to_rgb, load_image, save_rgb_image};
pub use visualization::{OverlayConfig, heatmap_image, jet, overlay};

/// Initializes the tracing subscriber for logging.
///
/// This function sets up the tracing subscriber with environment filter and formatting layer.
/// It's typically called at the start of an application to enable logging.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
