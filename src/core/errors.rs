//! Error types for the classifier.
//!
//! This module defines the errors that can occur while loading a two-head model,
//! preparing an image for it, running the forward pass, and turning the logits
//! into labels. Helper constructors attach context so that failures read well in
//! logs without every call site formatting its own message.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Stage of the preprocessing/postprocessing chain an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Building or reshaping a tensor.
    TensorOperation,
    /// Per-channel mean/std normalization.
    Normalization,
    /// Resizing to the model input resolution.
    Resize,
    /// Softmax, arg-max and label lookup.
    PostProcessing,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::TensorOperation => write!(f, "tensor operation"),
            ProcessingStage::Normalization => write!(f, "normalization"),
            ProcessingStage::Resize => write!(f, "resize"),
            ProcessingStage::PostProcessing => write!(f, "post-processing"),
        }
    }
}

/// Errors produced by the fruit classifier.
#[derive(Error, Debug)]
pub enum VisionError {
    /// The file could not be opened or decoded as an image.
    #[error("image load")]
    ImageLoad(#[source] image::ImageError),

    /// A preprocessing or postprocessing step failed.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The weights file could not be turned into an ONNX Runtime session.
    #[error(
        "failed to load model '{}': {reason}{}",
        .model_path.display(),
        .suggestion.as_deref().map(|s| format!(" ({s})")).unwrap_or_default()
    )]
    ModelLoad {
        /// Path of the weights file.
        model_path: PathBuf,
        /// What went wrong.
        reason: String,
        /// Optional hint for the operator.
        suggestion: Option<String>,
        /// The underlying error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The graph loaded but does not have the backbone-plus-two-heads shape.
    #[error("model '{}' is incompatible with the two-head layout: {message}", .model_path.display())]
    ModelStructure {
        /// Path of the weights file.
        model_path: PathBuf,
        /// Description of the mismatch.
        message: String,
    },

    /// The forward pass failed.
    #[error("inference with model '{model_name}' failed: {context}")]
    Inference {
        /// Name of the model that failed.
        model_name: String,
        /// Additional context about the failure.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A label ordering does not agree with the head it is bound to.
    #[error("label mismatch for {head} head: expected {expected}, got {actual}")]
    LabelMismatch {
        /// Head name (`fruit` or `quality`).
        head: String,
        /// What was expected.
        expected: String,
        /// What was found.
        actual: String,
    },

    /// Invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Invalid configuration.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from tensor operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("json")]
    Json(#[from] serde_json::Error),
}

/// Message-only error used as a `source` when nothing lower-level exists.
#[derive(Debug, Clone)]
pub struct SimpleError {
    message: String,
}

impl SimpleError {
    /// Creates a new error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SimpleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SimpleError {}

impl VisionError {
    #[inline]
    fn processing_with_context(
        kind: ProcessingStage,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates an error for tensor operations.
    pub fn tensor_operation(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(ProcessingStage::TensorOperation, context, error)
    }

    /// Creates an error for normalization.
    pub fn normalization(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(ProcessingStage::Normalization, context, error)
    }

    /// Creates an error for resizing.
    pub fn resize_error(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(ProcessingStage::Resize, context, error)
    }

    /// Creates an error for post-processing (softmax, arg-max, label lookup).
    pub fn post_processing(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::processing_with_context(ProcessingStage::PostProcessing, context, error)
    }

    /// Creates an error for a failed forward pass.
    pub fn inference_error(
        model_name: &str,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Inference {
            model_name: model_name.to_string(),
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates an error for a weights file that could not be loaded.
    pub fn model_load_error(
        model_path: &Path,
        reason: &str,
        suggestion: Option<&str>,
        source: Option<impl std::error::Error + Send + Sync + 'static>,
    ) -> Self {
        Self::ModelLoad {
            model_path: model_path.to_path_buf(),
            reason: reason.to_string(),
            suggestion: suggestion.map(str::to_string),
            source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        }
    }

    /// Creates an error for a graph that does not match the two-head layout.
    pub fn model_structure(model_path: &Path, message: impl Into<String>) -> Self {
        Self::ModelStructure {
            model_path: model_path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Creates an error for a label set that disagrees with its head.
    pub fn label_mismatch(
        head: &str,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::LabelMismatch {
            head: head.to_string(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates an error for invalid input.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an error for configuration problems.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}

impl From<image::ImageError> for VisionError {
    fn from(error: image::ImageError) -> Self {
        Self::ImageLoad(error)
    }
}

impl From<crate::core::config::ConfigError> for VisionError {
    fn from(error: crate::core::config::ConfigError) -> Self {
        Self::ConfigError {
            message: error.to_string(),
        }
    }
}

/// Convenient result alias for classifier operations.
pub type VisionResult<T> = Result<T, VisionError>;
