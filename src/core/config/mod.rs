//! Configuration types for the classifier.
//!
//! * [`ClassifierConfig`] - where the weights and labels live and how to run them
//! * [`OrtSessionConfig`] - ONNX Runtime session tuning
//! * [`ConfigValidator`] - shared validation helpers

pub mod classifier;
pub mod errors;
pub mod onnx;

pub use classifier::{
    ClassifierConfig, DEFAULT_INPUT_SHAPE, ENV_LABELS_PATH, ENV_MODEL_PATH, ENV_POOL_SIZE,
};
pub use errors::{ConfigError, ConfigValidator};
pub use onnx::{OrtExecutionProvider, OrtGraphOptimizationLevel, OrtLogLevel, OrtSessionConfig};
