//! Saliency heatmap rendering.
//!
//! A [`SaliencyMap`] is upsampled bilinearly to the photo's size, colored with
//! the JET colormap and alpha-blended over the photo:
//!
//! ```text
//! out = alpha * heat + (1 - alpha) * photo
//! ```

use crate::core::constants::DEFAULT_OVERLAY_ALPHA;
use crate::domain::SaliencyMap;
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Settings for compositing a heatmap over a photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Weight of the heatmap in the blend, in `[0, 1]`.
    pub alpha: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_OVERLAY_ALPHA,
        }
    }
}

/// JET colormap: dark blue at 0 through cyan, yellow and red to dark red at 1.
pub fn jet(value: f32) -> Rgb<u8> {
    let v = if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let channel = |offset: f32| {
        let c = (1.5 - (4.0 * v - offset).abs()).clamp(0.0, 1.0);
        (c * 255.0).round() as u8
    };
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}

/// Resizes the saliency values to `width x height` with bilinear filtering.
fn upsample(saliency: &SaliencyMap, width: u32, height: u32) -> ImageBuffer<Luma<f32>, Vec<f32>> {
    let (h, w) = saliency.shape();
    let values: Vec<f32> = saliency.values().iter().copied().collect();
    // Row-major (h, w) values match the buffer layout.
    let small: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_raw(w as u32, h as u32, values)
            .unwrap_or_else(|| ImageBuffer::new(w as u32, h as u32));
    if (w as u32, h as u32) == (width, height) {
        return small;
    }
    imageops::resize(&small, width, height, FilterType::Triangle)
}

/// Renders the saliency map alone as a JET-colored image of the given size.
pub fn heatmap_image(saliency: &SaliencyMap, width: u32, height: u32) -> RgbImage {
    let upsampled = upsample(saliency, width, height);
    RgbImage::from_fn(width, height, |x, y| jet(upsampled.get_pixel(x, y)[0]))
}

/// Blends the colored saliency map over `image`.
pub fn overlay(image: &RgbImage, saliency: &SaliencyMap, config: &OverlayConfig) -> RgbImage {
    let (width, height) = image.dimensions();
    let alpha = config.alpha.clamp(0.0, 1.0);
    let heat = heatmap_image(saliency, width, height);
    debug!(
        width,
        height,
        saliency = ?saliency.shape(),
        alpha,
        "compositing saliency overlay"
    );

    RgbImage::from_fn(width, height, |x, y| {
        let photo = image.get_pixel(x, y);
        let heat = heat.get_pixel(x, y);
        let mut out = [0u8; 3];
        for c in 0..3 {
            let blended = alpha * heat[c] as f32 + (1.0 - alpha) * photo[c] as f32;
            out[c] = blended.round().clamp(0.0, 255.0) as u8;
        }
        Rgb(out)
    })
}
