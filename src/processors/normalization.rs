//! Per-channel image normalization.
//!
//! Pixel values are scaled (by default to `[0, 1]`) and then standardized per
//! channel: `out = (pixel * scale - mean) / std`. The two steps are folded into
//! one multiply-add per value with `alpha = scale / std` and `beta = -mean / std`.

use crate::core::{Tensor4D, VisionError};
use crate::processors::types::ChannelOrder;
use image::{DynamicImage, RgbImage};
use rayon::prelude::*;

/// ImageNet channel means (RGB).
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations (RGB).
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Normalizes RGB images into model input tensors.
#[derive(Debug, Clone)]
pub struct NormalizeImage {
    /// Scaling factors for each channel (alpha = scale / std)
    pub alpha: Vec<f32>,
    /// Offset values for each channel (beta = -mean / std)
    pub beta: Vec<f32>,
    /// Channel ordering (CHW or HWC)
    pub order: ChannelOrder,
}

impl NormalizeImage {
    /// Creates a new normalizer.
    ///
    /// # Arguments
    ///
    /// * `scale` - Optional scaling factor (defaults to 1.0/255.0)
    /// * `mean` - Optional mean values for each channel (defaults to ImageNet means)
    /// * `std` - Optional standard deviation values for each channel (defaults to ImageNet stds)
    /// * `order` - Optional channel ordering (defaults to CHW)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * Scale is less than or equal to 0
    /// * Mean or std vectors don't have exactly 3 elements
    /// * Any standard deviation value is less than or equal to 0
    pub fn new(
        scale: Option<f32>,
        mean: Option<Vec<f32>>,
        std: Option<Vec<f32>>,
        order: Option<ChannelOrder>,
    ) -> Result<Self, VisionError> {
        let scale = scale.unwrap_or(1.0 / 255.0);
        let mean = mean.unwrap_or_else(|| IMAGENET_MEAN.to_vec());
        let std = std.unwrap_or_else(|| IMAGENET_STD.to_vec());
        let order = order.unwrap_or(ChannelOrder::CHW);

        if scale <= 0.0 {
            return Err(VisionError::config_error("Scale must be greater than 0"));
        }
        if mean.len() != 3 {
            return Err(VisionError::config_error(
                "Mean must have exactly 3 elements for RGB",
            ));
        }
        if std.len() != 3 {
            return Err(VisionError::config_error(
                "Std must have exactly 3 elements for RGB",
            ));
        }
        for (i, &s) in std.iter().enumerate() {
            if s <= 0.0 {
                return Err(VisionError::config_error(format!(
                    "Standard deviation at index {i} must be greater than 0, got {s}"
                )));
            }
        }

        let alpha: Vec<f32> = std.iter().map(|s| scale / s).collect();
        let beta: Vec<f32> = mean.iter().zip(&std).map(|(m, s)| -m / s).collect();

        Ok(Self { alpha, beta, order })
    }

    /// Normalizer with ImageNet statistics, `[0, 1]` scaling and CHW layout.
    pub fn imagenet() -> Result<Self, VisionError> {
        Self::new(
            Some(1.0 / 255.0),
            Some(IMAGENET_MEAN.to_vec()),
            Some(IMAGENET_STD.to_vec()),
            Some(ChannelOrder::CHW),
        )
    }

    /// Writes one normalized image into `dst`, which must hold `3 * h * w` values.
    fn fill(&self, img: &RgbImage, dst: &mut [f32]) {
        let (width, height) = img.dimensions();
        let (w, h) = (width as usize, height as usize);

        for (x, y, pixel) in img.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                let value = pixel[c] as f32 * self.alpha[c] + self.beta[c];
                let idx = match self.order {
                    ChannelOrder::CHW => c * h * w + y * w + x,
                    ChannelOrder::HWC => y * w * 3 + x * 3 + c,
                };
                dst[idx] = value;
            }
        }
    }

    fn tensor_dims(&self, batch: usize, height: u32, width: u32) -> (usize, usize, usize, usize) {
        match self.order {
            ChannelOrder::CHW => (batch, 3, height as usize, width as usize),
            ChannelOrder::HWC => (batch, height as usize, width as usize, 3),
        }
    }

    /// Normalizes a single image and returns it as a batch-of-one tensor.
    pub fn normalize_to(&self, img: &RgbImage) -> Result<Tensor4D, VisionError> {
        let (width, height) = img.dimensions();
        let mut result = vec![0.0f32; 3 * height as usize * width as usize];
        self.fill(img, &mut result);

        Tensor4D::from_shape_vec(self.tensor_dims(1, height, width), result).map_err(|e| {
            VisionError::normalization(
                &format!("Failed to create normalization tensor for {width}x{height} image"),
                e,
            )
        })
    }

    /// Normalizes a batch of images and returns them as a 4D tensor.
    ///
    /// # Errors
    ///
    /// Returns an error if the images in the batch don't all have the same dimensions.
    pub fn normalize_batch_to(&self, imgs: Vec<DynamicImage>) -> Result<Tensor4D, VisionError> {
        if imgs.is_empty() {
            return Ok(Tensor4D::zeros((0, 0, 0, 0)));
        }

        let rgb_imgs: Vec<RgbImage> = imgs.into_iter().map(|img| img.to_rgb8()).collect();
        let (width, height) = rgb_imgs[0].dimensions();
        for (i, img) in rgb_imgs.iter().enumerate() {
            if img.dimensions() != (width, height) {
                let (w, h) = img.dimensions();
                return Err(VisionError::invalid_input(format!(
                    "All images in batch must have the same dimensions. Image 0: {width}x{height}, Image {i}: {w}x{h}"
                )));
            }
        }

        let batch_size = rgb_imgs.len();
        let img_size = 3 * height as usize * width as usize;
        let mut result = vec![0.0f32; batch_size * img_size];

        if batch_size == 1 {
            // Avoid rayon overhead for single-image batches
            self.fill(&rgb_imgs[0], &mut result);
        } else {
            result
                .par_chunks_mut(img_size)
                .zip(rgb_imgs.par_iter())
                .for_each(|(dst, img)| self.fill(img, dst));
        }

        Tensor4D::from_shape_vec(self.tensor_dims(batch_size, height, width), result)
            .map_err(|e| VisionError::tensor_operation("Failed to create batch tensor", e))
    }
}
