//! Configuration error types and validation traits.

use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A model path does not exist.
    #[error("model path does not exist: {}", .path.display())]
    ModelPathNotFound { path: std::path::PathBuf },

    /// A required environment variable is unset.
    #[error("environment variable {name} is not set")]
    MissingEnv { name: String },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// A trait for validating configuration parameters.
pub trait ConfigValidator {
    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError>;

    /// Validates that a model file exists.
    fn validate_model_path(&self, path: &Path) -> Result<(), ConfigError> {
        if path.is_file() {
            Ok(())
        } else {
            Err(ConfigError::ModelPathNotFound {
                path: path.to_path_buf(),
            })
        }
    }

    /// Validates image dimensions.
    ///
    /// Both dimensions must be greater than 0.
    fn validate_image_dimensions(&self, height: u32, width: u32) -> Result<(), ConfigError> {
        if height == 0 || width == 0 {
            return Err(ConfigError::InvalidConfig {
                message: format!("image dimensions must be positive, got {height}x{width}"),
            });
        }
        Ok(())
    }

    /// Validates a pool or batch size.
    fn validate_positive(&self, field: &str, value: usize) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::InvalidConfig {
                message: format!("{field} must be greater than 0"),
            });
        }
        Ok(())
    }
}
