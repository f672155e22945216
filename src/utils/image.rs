//! Reading and writing images.

use crate::core::errors::{ClassifierError, ClassifierResult};
use crate::processors::decode_image;
use image::{DynamicImage, RgbImage};
use std::path::Path;

/// Loads an image from a file.
///
/// The bytes are decoded by content, so a misnamed extension does not matter.
/// A missing file surfaces as an I/O error.
pub fn load_image(path: &Path) -> ClassifierResult<DynamicImage> {
    let bytes = std::fs::read(path)?;
    decode_image(&bytes)
}

/// Converts a DynamicImage to an 8-bit RGB image.
pub fn dynamic_to_rgb(img: DynamicImage) -> RgbImage {
    match img {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    }
}

/// Saves an RGB image, choosing the encoding from the file extension.
pub fn save_rgb_image(image: &RgbImage, path: &Path) -> ClassifierResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    image.save(path).map_err(|e| {
        ClassifierError::rendering(format!("failed to write image '{}'", path.display()), e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_save_then_load_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.png");
        let image = RgbImage::from_pixel(3, 2, Rgb([9, 8, 7]));

        save_rgb_image(&image, &path).unwrap();
        let loaded = dynamic_to_rgb(load_image(&path).unwrap());
        assert_eq!(loaded, image);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_image(&dir.path().join("missing.jpg")).unwrap_err();
        assert!(matches!(err, ClassifierError::Io(_)));
    }

    #[test]
    fn test_unknown_extension_fails_to_save() {
        let dir = tempfile::tempdir().unwrap();
        let image = RgbImage::new(1, 1);
        assert!(save_rgb_image(&image, &dir.path().join("out.unknown")).is_err());
    }
}
