//! Two-head fruit classifier.
//!
//! A vision backbone feeds the same feature vector into two linear heads: one
//! scores the fruit type, the other scores its quality. This module wraps the
//! exported graph with the fixed preprocessing it was trained with and turns
//! both heads' logits into labelled predictions.

use crate::core::config::{
    ClassifierConfig, ConfigError, ConfigValidator, DEFAULT_INPUT_SHAPE, OrtSessionConfig,
};
use crate::core::inference::{HeadBinding, HeadLogits, TwoHeadInfer};
use crate::core::{SimpleError, Tensor2D, Tensor4D, VisionError, VisionResult};
use crate::domain::{FruitPrediction, HeadLabels, HeadPrediction, LabelSet};
use crate::processors::{NormalizeImage, Topk, TopkResult, softmax_rows};
use crate::utils::{load_image, load_image_from_memory};
use image::{DynamicImage, RgbImage, imageops::FilterType};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Classifier over a backbone with fruit and quality heads.
///
/// Construction loads and verifies the weights once; afterwards the classifier
/// is read-only and can be shared across threads behind an `Arc`.
#[derive(Debug)]
pub struct TwoHeadClassifier {
    inference: TwoHeadInfer,
    normalizer: NormalizeImage,
    topk: Topk,
    labels: HeadLabels,
    input_shape: (u32, u32),
    resize_filter: FilterType,
}

impl TwoHeadClassifier {
    /// Builds a classifier from runtime configuration.
    pub fn from_config(config: &ClassifierConfig) -> VisionResult<Self> {
        TwoHeadClassifierBuilder::from_config(config)?.build(&config.model_path)
    }

    /// Label sets in use.
    pub fn labels(&self) -> &HeadLabels {
        &self.labels
    }

    /// Model input resolution as (height, width).
    pub fn input_shape(&self) -> (u32, u32) {
        self.input_shape
    }

    /// Name of the loaded model.
    pub fn model_name(&self) -> &str {
        self.inference.model_name()
    }

    /// Resizes and normalizes images into a `[batch, 3, H, W]` tensor.
    pub fn preprocess(&self, images: &[RgbImage]) -> VisionResult<Tensor4D> {
        preprocess_images(images, self.input_shape, self.resize_filter, &self.normalizer)
    }

    /// Runs the forward pass.
    pub fn infer(&self, batch_tensor: &Tensor4D) -> VisionResult<HeadLogits> {
        self.inference.infer(batch_tensor)
    }

    /// Turns logits into labelled predictions, one per batch row.
    pub fn postprocess(&self, logits: &HeadLogits) -> VisionResult<Vec<FruitPrediction>> {
        decode_heads(logits, &self.labels, self.topk)
    }

    /// Classifies a batch of images with a single forward pass.
    pub fn predict_batch(&self, images: &[RgbImage]) -> VisionResult<Vec<FruitPrediction>> {
        if images.is_empty() {
            return Err(VisionError::invalid_input("no images to classify"));
        }
        let batch_tensor = self.preprocess(images)?;
        let logits = self.infer(&batch_tensor)?;
        let predictions = self.postprocess(&logits)?;
        debug!(
            batch = images.len(),
            model = self.inference.model_name(),
            "classified batch"
        );
        Ok(predictions)
    }

    /// Classifies one decoded image.
    pub fn predict_image(&self, image: &RgbImage) -> VisionResult<FruitPrediction> {
        let mut predictions = self.predict_batch(std::slice::from_ref(image))?;
        predictions.pop().ok_or_else(|| {
            VisionError::post_processing(
                "model returned no prediction",
                SimpleError::new("empty batch output"),
            )
        })
    }

    /// Loads an image file and classifies it.
    ///
    /// # Errors
    ///
    /// [`VisionError::ImageLoad`] if the file cannot be opened as an image; any
    /// inference error otherwise. Nothing is retried.
    pub fn predict_path(&self, path: &Path) -> VisionResult<FruitPrediction> {
        let image = load_image(path)?;
        let prediction = self.predict_image(&image)?;
        debug!(
            image = %path.display(),
            prediction = %prediction.display_label(),
            "classified image"
        );
        Ok(prediction)
    }

    /// Decodes an encoded image held in memory and classifies it.
    pub fn predict_bytes(&self, bytes: &[u8]) -> VisionResult<FruitPrediction> {
        let image = load_image_from_memory(bytes)?;
        self.predict_image(&image)
    }
}

/// Resizes every image to exactly `input_shape` (aspect ratio is not kept) and
/// normalizes the batch.
pub fn preprocess_images(
    images: &[RgbImage],
    input_shape: (u32, u32),
    filter: FilterType,
    normalizer: &NormalizeImage,
) -> VisionResult<Tensor4D> {
    let (height, width) = input_shape;
    if height == 0 || width == 0 {
        return Err(VisionError::resize_error(
            "input shape must be positive",
            SimpleError::new(format!("got {height}x{width}")),
        ));
    }

    let resized: Vec<DynamicImage> = images
        .iter()
        .map(|img| {
            if img.dimensions() == (width, height) {
                DynamicImage::ImageRgb8(img.clone())
            } else {
                DynamicImage::ImageRgb8(image::imageops::resize(img, width, height, filter))
            }
        })
        .collect();

    normalizer.normalize_batch_to(resized)
}

/// Converts both heads' logits into predictions.
///
/// Each head is handled on its own: softmax over its logits, arg-max, and a
/// label lookup through its label set.
pub fn decode_heads(
    logits: &HeadLogits,
    labels: &HeadLabels,
    topk: Topk,
) -> VisionResult<Vec<FruitPrediction>> {
    let (fruit_rows, quality_rows) = (logits.fruit.nrows(), logits.quality.nrows());
    if fruit_rows != quality_rows {
        return Err(VisionError::post_processing(
            &format!("fruit head returned {fruit_rows} rows, quality head returned {quality_rows}"),
            SimpleError::new("batch size mismatch between heads"),
        ));
    }

    let fruit = decode_head("fruit", &logits.fruit, &labels.fruit, topk)?;
    let quality = decode_head("quality", &logits.quality, &labels.quality, topk)?;
    Ok(fruit
        .into_iter()
        .zip(quality)
        .map(|(fruit, quality)| FruitPrediction { fruit, quality })
        .collect())
}

fn decode_head(
    head: &str,
    logits: &Tensor2D,
    labels: &LabelSet,
    topk: Topk,
) -> VisionResult<Vec<HeadPrediction>> {
    if logits.ncols() != labels.len() {
        return Err(VisionError::label_mismatch(
            head,
            format!("{} labels", logits.ncols()),
            format!("{} labels", labels.len()),
        ));
    }

    let rows: Vec<Vec<f32>> = softmax_rows(logits)
        .outer_iter()
        .map(|row| row.to_vec())
        .collect();
    if let Some(bad) = rows.iter().position(|row| row.iter().any(|p| !p.is_finite())) {
        return Err(VisionError::post_processing(
            &format!("{head} head produced non-finite probabilities"),
            SimpleError::new(format!("logits: {:?}", logits.row(bad))),
        ));
    }

    let TopkResult { indexes, scores } = topk.process(&rows).map_err(|e| {
        VisionError::post_processing(&format!("{head} top-k failed"), SimpleError::new(e))
    })?;

    let label_for = |idx: usize| {
        labels.get(idx).map(str::to_string).ok_or_else(|| {
            VisionError::label_mismatch(
                head,
                format!("a label for class {idx}"),
                format!("{} labels", labels.len()),
            )
        })
    };
    let to_percent = |p: f32| (p * 100.0).clamp(0.0, 100.0);

    indexes
        .into_iter()
        .zip(scores)
        .map(|(row_indexes, row_scores)| {
            let top_k = if topk.k() > 1 {
                row_indexes
                    .iter()
                    .zip(&row_scores)
                    .map(|(&idx, &p)| Ok((label_for(idx)?, to_percent(p))))
                    .collect::<VisionResult<Vec<_>>>()?
            } else {
                Vec::new()
            };

            Ok(HeadPrediction {
                class_id: row_indexes[0],
                label: label_for(row_indexes[0])?,
                confidence: to_percent(row_scores[0]),
                top_k,
            })
        })
        .collect()
}

/// Builder for [`TwoHeadClassifier`].
#[derive(Debug)]
pub struct TwoHeadClassifierBuilder {
    input_shape: (u32, u32),
    resize_filter: FilterType,
    session_pool_size: usize,
    ort_config: Option<OrtSessionConfig>,
    labels: Option<HeadLabels>,
    labels_file: Option<PathBuf>,
    binding: HeadBinding,
    topk: usize,
}

impl Default for TwoHeadClassifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TwoHeadClassifierBuilder {
    /// Creates a builder with 224x224 bilinear preprocessing and one session.
    pub fn new() -> Self {
        Self {
            input_shape: DEFAULT_INPUT_SHAPE,
            // Bilinear, as torchvision's Resize uses by default
            resize_filter: FilterType::Triangle,
            session_pool_size: 1,
            ort_config: None,
            labels: None,
            labels_file: None,
            binding: HeadBinding::default(),
            topk: 1,
        }
    }

    /// Creates a builder preloaded from runtime configuration.
    ///
    /// The configuration is validated first; a missing weights file is reported
    /// as [`VisionError::ModelLoad`].
    pub fn from_config(config: &ClassifierConfig) -> VisionResult<Self> {
        match config.validate() {
            Err(ConfigError::ModelPathNotFound { path }) => {
                return Err(VisionError::model_load_error(
                    &path,
                    "weights file not found",
                    Some("set FRUIT_VISION_MODEL or model_path to an exported .onnx file"),
                    None::<SimpleError>,
                ));
            }
            other => other?,
        }

        let mut builder = Self::new()
            .input_shape(config.input_shape)
            .session_pool_size(config.session_pool_size)
            .head_binding(HeadBinding {
                fruit_output: config.fruit_output.clone(),
                quality_output: config.quality_output.clone(),
                ..HeadBinding::default()
            });
        if let Some(path) = &config.labels_path {
            builder = builder.labels_file(path);
        }
        if let Some(ort) = &config.ort_session {
            builder = builder.with_ort_config(ort.clone());
        }
        Ok(builder)
    }

    /// Sets the model input resolution as (height, width).
    pub fn input_shape(mut self, shape: (u32, u32)) -> Self {
        self.input_shape = shape;
        self
    }

    /// Sets the resizing filter.
    pub fn resize_filter(mut self, filter: FilterType) -> Self {
        self.resize_filter = filter;
        self
    }

    /// Sets the session pool size for ONNX Runtime.
    pub fn session_pool_size(mut self, size: usize) -> Self {
        self.session_pool_size = size;
        self
    }

    /// Sets the ONNX Runtime session configuration.
    pub fn with_ort_config(mut self, config: OrtSessionConfig) -> Self {
        self.ort_config = Some(config);
        self
    }

    /// Uses these label sets instead of metadata or defaults.
    pub fn labels(mut self, labels: HeadLabels) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Reads label sets from a JSON sidecar file at build time.
    pub fn labels_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.labels_file = Some(path.into());
        self
    }

    /// Sets how the heads are located among the graph outputs.
    pub fn head_binding(mut self, binding: HeadBinding) -> Self {
        self.binding = binding;
        self
    }

    /// Number of alternatives to report per head (1 reports only the arg-max).
    pub fn topk(mut self, k: usize) -> Self {
        self.topk = k;
        self
    }

    /// Loads the weights and builds the classifier.
    ///
    /// # Errors
    ///
    /// * [`VisionError::ModelLoad`] if the weights file is missing or unreadable.
    /// * [`VisionError::ModelStructure`] if the graph does not expose heads of
    ///   the declared widths, or cannot run a `[1, 3, H, W]` input of the
    ///   configured shape.
    /// * [`VisionError::LabelMismatch`] if the label sets do not fit the heads or
    ///   disagree with labels embedded in the graph.
    pub fn build(self, model_path: &Path) -> VisionResult<TwoHeadClassifier> {
        let topk = Topk::new(self.topk).map_err(VisionError::config_error)?;
        let (height, width) = self.input_shape;
        if height == 0 || width == 0 {
            return Err(VisionError::config_error(format!(
                "input shape must be non-zero, got {height}x{width}"
            )));
        }
        let normalizer = NormalizeImage::imagenet()?;

        let explicit = match (self.labels, &self.labels_file) {
            (Some(labels), _) => Some(labels),
            (None, Some(path)) => Some(HeadLabels::from_json_file(path)?),
            (None, None) => None,
        };

        let inference = TwoHeadInfer::new(
            model_path,
            &self.binding,
            self.session_pool_size,
            self.ort_config.as_ref(),
        )?;
        inference.verify(height, width)?;

        let embedded = HeadLabels::from_model_metadata(&inference)?;
        let labels = HeadLabels::resolve(
            explicit,
            embedded,
            self.binding.fruit_classes,
            self.binding.quality_classes,
        )?;

        info!(
            model = inference.model_name(),
            fruit_labels = %labels.fruit,
            quality_labels = %labels.quality,
            input = ?self.input_shape,
            "classifier loaded"
        );

        Ok(TwoHeadClassifier {
            inference,
            normalizer,
            topk,
            labels,
            input_shape: self.input_shape,
            resize_filter: self.resize_filter,
        })
    }
}
