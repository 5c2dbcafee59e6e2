//! Core building blocks: errors, configuration and the inference engine.

pub mod config;
pub mod errors;
pub mod inference;

pub use errors::{ProcessingStage, SimpleError, VisionError, VisionResult};

/// A 2D tensor of `f32` values, `[batch, classes]` for logits and probabilities.
pub type Tensor2D = ndarray::Array2<f32>;

/// A 4D tensor of `f32` values, `[batch, channels, height, width]` for model input.
pub type Tensor4D = ndarray::Array4<f32>;
