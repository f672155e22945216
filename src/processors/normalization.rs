//! Pixel normalization for classifier inputs.
//!
//! Each channel value `x` is mapped to `x * scale`. With the default scale of
//! 1/255 this is the plain rescaling into `[0, 1]` the classifiers were
//! trained with.

use crate::core::constants::PIXEL_SCALE;
use crate::core::errors::{ClassifierError, ClassifierResult};
use crate::core::tensor::Tensor4D;
use image::RgbImage;

/// Normalizes RGB images into `(1, H, W, 3)` model input tensors.
#[derive(Debug, Clone)]
pub struct NormalizeImage {
    /// Factor applied to every 8-bit channel value.
    pub scale: f32,
}

impl Default for NormalizeImage {
    fn default() -> Self {
        Self { scale: PIXEL_SCALE }
    }
}

impl NormalizeImage {
    /// Normalizes a single image into a `(1, H, W, 3)` tensor.
    pub fn normalize_to(&self, img: &RgbImage) -> ClassifierResult<Tensor4D> {
        let (width, height) = img.dimensions();
        let (w, h) = (width as usize, height as usize);
        let channels = 3usize;
        let mut result = vec![0.0f32; channels * h * w];

        for (dst, src) in result.chunks_exact_mut(channels).zip(img.pixels()) {
            for c in 0..channels {
                dst[c] = src[c] as f32 * self.scale;
            }
        }

        Tensor4D::from_shape_vec((1, h, w, channels), result).map_err(|e| {
            ClassifierError::normalization(
                format!("failed to create tensor for {}x{} image", width, height),
                e,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient_image() -> RgbImage {
        RgbImage::from_fn(3, 2, |x, y| Rgb([(x * 100) as u8, (y * 255) as u8, 17]))
    }

    #[test]
    fn test_default_scales_into_unit_range_hwc() {
        let tensor = NormalizeImage::default()
            .normalize_to(&gradient_image())
            .unwrap();
        assert_eq!(tensor.shape(), &[1, 2, 3, 3]);
        assert!((tensor[[0, 0, 2, 0]] - 200.0 / 255.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 0, 1]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 1, 2]] - 17.0 / 255.0).abs() < 1e-6);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_custom_scale() {
        let tensor = NormalizeImage { scale: 1.0 }
            .normalize_to(&gradient_image())
            .unwrap();
        assert_eq!(tensor[[0, 0, 1, 0]], 100.0);
        assert_eq!(tensor[[0, 1, 2, 1]], 255.0);
    }
}
