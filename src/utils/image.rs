//! Image loading helpers.
//!
//! Every loader returns 8-bit RGB: grayscale, palette and alpha images are
//! converted so the model always sees three channels.

use crate::core::VisionError;
use image::{DynamicImage, RgbImage};
use std::path::Path;

/// Converts a DynamicImage to an RgbImage, dropping alpha.
pub fn dynamic_to_rgb(img: DynamicImage) -> RgbImage {
    img.to_rgb8()
}

/// Loads an image from a file path and converts it to RgbImage.
///
/// # Errors
///
/// Returns [`VisionError::ImageLoad`] if the file cannot be opened or decoded.
pub fn load_image(path: &Path) -> Result<RgbImage, VisionError> {
    let img = image::open(path).map_err(VisionError::ImageLoad)?;
    Ok(dynamic_to_rgb(img))
}

/// Decodes an encoded image (PNG, JPEG, ...) held in memory, such as an upload body.
pub fn load_image_from_memory(bytes: &[u8]) -> Result<RgbImage, VisionError> {
    let img = image::load_from_memory(bytes).map_err(VisionError::ImageLoad)?;
    Ok(dynamic_to_rgb(img))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, LumaA, Rgba};
    use std::io::Cursor;

    #[test]
    fn test_load_image_converts_rgba_to_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgba.png");
        image::RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 40]))
            .save(&path)
            .unwrap();

        let img = load_image(&path).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_load_image_from_memory_expands_grayscale() {
        let gray = image::ImageBuffer::from_pixel(2, 2, LumaA([200u8, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageLumaA8(gray)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let img = load_image_from_memory(&bytes).unwrap();
        assert_eq!(img.get_pixel(1, 1).0, [200, 200, 200]);
    }

    #[test]
    fn test_non_image_file_is_image_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.jpg");
        std::fs::write(&path, b"plain text").unwrap();

        assert!(matches!(load_image(&path), Err(VisionError::ImageLoad(_))));
        assert!(matches!(
            load_image(&dir.path().join("missing.jpg")),
            Err(VisionError::ImageLoad(_))
        ));
    }
}
