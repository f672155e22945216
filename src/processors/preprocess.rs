//! Turning uploaded images into model input tensors.

use crate::core::constants::DEFAULT_INPUT_SIZE;
use crate::core::errors::{ClassifierError, ClassifierResult};
use crate::core::tensor::Tensor4D;
use crate::processors::normalization::NormalizeImage;
use crate::processors::types::ResizeFilter;
use image::{DynamicImage, RgbImage};
use tracing::debug;

/// Decodes an encoded image (JPEG, PNG, ...) from raw bytes.
///
/// The format is guessed from the content, never from a file name.
pub fn decode_image(bytes: &[u8]) -> ClassifierResult<DynamicImage> {
    if bytes.is_empty() {
        return Err(ClassifierError::unsupported_image("image data is empty"));
    }
    image::load_from_memory(bytes).map_err(ClassifierError::undecodable_image)
}

/// Resizes and normalizes images to the geometry a classifier expects.
///
/// Any color mode is accepted: grayscale, alpha and 16-bit images are
/// converted to 8-bit RGB before resizing. The aspect ratio is not preserved.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    input_size: (u32, u32),
    filter: ResizeFilter,
    normalizer: NormalizeImage,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_SIZE, ResizeFilter::default())
    }
}

impl ImagePreprocessor {
    /// Creates a preprocessor producing `(1, height, width, 3)` tensors in `[0, 1]`.
    pub fn new(input_size: (u32, u32), filter: ResizeFilter) -> Self {
        Self {
            input_size,
            filter,
            normalizer: NormalizeImage::default(),
        }
    }

    /// Target size as `(height, width)`.
    pub fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    pub fn filter(&self) -> ResizeFilter {
        self.filter
    }

    /// Converts the image to RGB and resizes it to the target size.
    pub fn resize(&self, image: &DynamicImage) -> ClassifierResult<RgbImage> {
        let (height, width) = self.input_size;
        if height == 0 || width == 0 {
            return Err(ClassifierError::config_error(format!(
                "target size must be non-zero, got {}x{}",
                height, width
            )));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(ClassifierError::unsupported_image(format!(
                "image has no pixels ({}x{})",
                image.width(),
                image.height()
            )));
        }

        let rgb = image.to_rgb8();
        if rgb.dimensions() == (width, height) {
            return Ok(rgb);
        }
        debug!(
            from_width = rgb.width(),
            from_height = rgb.height(),
            width,
            height,
            filter = ?self.filter,
            "resizing image"
        );
        Ok(image::imageops::resize(
            &rgb,
            width,
            height,
            self.filter.filter_type(),
        ))
    }

    /// Produces the model input tensor for one image.
    pub fn preprocess(&self, image: &DynamicImage) -> ClassifierResult<Tensor4D> {
        let resized = self.resize(image)?;
        self.normalizer.normalize_to(&resized)
    }
}

/// Preprocesses an image to `target_size` (`(height, width)`) with the default
/// bicubic filter and `[0, 1]` scaling.
pub fn preprocess(image: &DynamicImage, target_size: (u32, u32)) -> ClassifierResult<Tensor4D> {
    ImagePreprocessor::new(target_size, ResizeFilter::default()).preprocess(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageFormat, Luma, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode_png(image: &DynamicImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_output_shape_and_range() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(40, 25, |x, y| {
            image::Rgb([(x * 6) as u8, (y * 10) as u8, 255])
        }));
        let tensor = preprocess(&image, (150, 150)).unwrap();
        assert_eq!(tensor.shape(), &[1, 150, 150, 3]);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_non_square_target_is_height_by_width() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(10, 10));
        let tensor = ImagePreprocessor::new((20, 30), ResizeFilter::Triangle)
            .preprocess(&image)
            .unwrap();
        assert_eq!(tensor.shape(), &[1, 20, 30, 3]);
    }

    #[test]
    fn test_grayscale_is_expanded_to_three_channels() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([51])));
        let tensor = preprocess(&gray, (8, 8)).unwrap();
        assert_eq!(tensor.shape(), &[1, 8, 8, 3]);
        for c in 0..3 {
            assert!((tensor[[0, 3, 3, c]] - 0.2).abs() < 1e-6);
        }
    }

    #[test]
    fn test_alpha_channel_is_dropped() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 10])));
        let tensor = preprocess(&rgba, (4, 4)).unwrap();
        assert_eq!(tensor.shape(), &[1, 4, 4, 3]);
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_decode_round_trips_png() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(5, 3, image::Rgb([1, 2, 3])));
        let decoded = decode_image(&encode_png(&image)).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (5, 3));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ClassifierError::UnsupportedImageMode { .. }));
        let err = decode_image(&[]).unwrap_err();
        assert!(matches!(err, ClassifierError::UnsupportedImageMode { .. }));
    }

    #[test]
    fn test_zero_target_size_is_rejected() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let err = preprocess(&image, (0, 4)).unwrap_err();
        assert!(matches!(err, ClassifierError::ConfigError { .. }));
    }
}
