//! Runtime configuration for the two-head classifier.
//!
//! Paths to the weights file and the optional label sidecar are supplied from the
//! outside, either through a JSON file or through environment variables, so no
//! machine-specific location is baked into the binary.

use super::errors::{ConfigError, ConfigValidator};
use super::onnx::OrtSessionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the path to the ONNX weights file.
pub const ENV_MODEL_PATH: &str = "FRUIT_VISION_MODEL";
/// Environment variable holding the path to the label sidecar file.
pub const ENV_LABELS_PATH: &str = "FRUIT_VISION_LABELS";
/// Environment variable holding the session pool size.
pub const ENV_POOL_SIZE: &str = "FRUIT_VISION_POOL_SIZE";

/// Default model input resolution (height, width).
pub const DEFAULT_INPUT_SHAPE: (u32, u32) = (224, 224);

fn default_input_shape() -> (u32, u32) {
    DEFAULT_INPUT_SHAPE
}

fn default_pool_size() -> usize {
    1
}

/// Configuration needed to construct a [`TwoHeadClassifier`].
///
/// [`TwoHeadClassifier`]: crate::models::classification::TwoHeadClassifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Path to the exported ONNX graph (backbone plus both heads).
    pub model_path: PathBuf,
    /// Optional JSON file with the fruit and quality label orderings.
    #[serde(default)]
    pub labels_path: Option<PathBuf>,
    /// Model input resolution as (height, width).
    #[serde(default = "default_input_shape")]
    pub input_shape: (u32, u32),
    /// Name of the fruit logits output. Positional when unset.
    #[serde(default)]
    pub fruit_output: Option<String>,
    /// Name of the quality logits output. Positional when unset.
    #[serde(default)]
    pub quality_output: Option<String>,
    /// Number of ONNX Runtime sessions to keep for concurrent requests.
    #[serde(default = "default_pool_size")]
    pub session_pool_size: usize,
    /// ONNX Runtime session tuning.
    #[serde(default)]
    pub ort_session: Option<OrtSessionConfig>,
}

impl ClassifierConfig {
    /// Creates a configuration for the given weights file with default settings.
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            labels_path: None,
            input_shape: DEFAULT_INPUT_SHAPE,
            fruit_output: None,
            quality_output: None,
            session_pool_size: default_pool_size(),
            ort_session: None,
        }
    }

    /// Sets the label sidecar file.
    pub fn with_labels_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.labels_path = Some(path.into());
        self
    }

    /// Sets the session pool size.
    pub fn with_session_pool_size(mut self, size: usize) -> Self {
        self.session_pool_size = size;
        self
    }

    /// Sets the ONNX Runtime session configuration.
    pub fn with_ort_session(mut self, config: OrtSessionConfig) -> Self {
        self.ort_session = Some(config);
        self
    }

    /// Reads the configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_file_with_lookup(path, |_| None)
    }

    /// Reads a JSON file and fills the keys it leaves out from `lookup`.
    ///
    /// Values in the file win. `model_path`, `labels_path` and
    /// `session_pool_size` fall back to `FRUIT_VISION_MODEL`,
    /// `FRUIT_VISION_LABELS` and `FRUIT_VISION_POOL_SIZE`.
    pub fn from_file_with_lookup(
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let parse_error = |e: serde_json::Error| ConfigError::InvalidConfig {
            message: format!("failed to parse config file '{}': {e}", path.display()),
        };
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidConfig {
            message: format!("failed to read config file '{}': {e}", path.display()),
        })?;
        let mut value: serde_json::Value = serde_json::from_str(&contents).map_err(parse_error)?;
        let Some(fields) = value.as_object_mut() else {
            return Err(ConfigError::InvalidConfig {
                message: format!("config file '{}' must hold a JSON object", path.display()),
            });
        };

        for (field, key) in [("model_path", ENV_MODEL_PATH), ("labels_path", ENV_LABELS_PATH)] {
            if !fields.contains_key(field)
                && let Some(v) = env_value(&lookup, key)
            {
                fields.insert(field.to_string(), serde_json::Value::String(v));
            }
        }
        if !fields.contains_key("session_pool_size")
            && let Some(size) = env_pool_size(&lookup)?
        {
            fields.insert("session_pool_size".to_string(), size.into());
        }

        serde_json::from_value(value).map_err(parse_error)
    }

    /// Reads the configuration from the process environment.
    ///
    /// `FRUIT_VISION_MODEL` is required; `FRUIT_VISION_LABELS` and
    /// `FRUIT_VISION_POOL_SIZE` are optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let model_path =
            env_value(&lookup, ENV_MODEL_PATH).ok_or_else(|| ConfigError::MissingEnv {
                name: ENV_MODEL_PATH.to_string(),
            })?;

        let mut config = Self::new(model_path);
        config.labels_path = env_value(&lookup, ENV_LABELS_PATH).map(PathBuf::from);
        if let Some(size) = env_pool_size(&lookup)? {
            config.session_pool_size = size;
        }
        Ok(config)
    }
}

fn env_value(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.is_empty())
}

fn env_pool_size(lookup: &impl Fn(&str) -> Option<String>) -> Result<Option<usize>, ConfigError> {
    let Some(raw) = lookup(ENV_POOL_SIZE) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidConfig {
            message: format!("{ENV_POOL_SIZE} must be a positive integer, got '{raw}'"),
        })
}

impl ConfigValidator for ClassifierConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_model_path(&self.model_path)?;
        self.validate_image_dimensions(self.input_shape.0, self.input_shape.1)?;
        self.validate_positive("session_pool_size", self.session_pool_size)?;
        if let (Some(fruit), Some(quality)) = (&self.fruit_output, &self.quality_output)
            && fruit == quality
        {
            return Err(ConfigError::InvalidConfig {
                message: format!("fruit and quality heads cannot share output '{fruit}'"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_requires_model_path() {
        let err = ClassifierConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv { ref name } if name == ENV_MODEL_PATH));
    }

    #[test]
    fn test_from_lookup_reads_optional_values() {
        let config = ClassifierConfig::from_lookup(lookup_from(&[
            (ENV_MODEL_PATH, "/models/fruit.onnx"),
            (ENV_LABELS_PATH, "/models/labels.json"),
            (ENV_POOL_SIZE, "3"),
        ]))
        .unwrap();

        assert_eq!(config.model_path, PathBuf::from("/models/fruit.onnx"));
        assert_eq!(
            config.labels_path,
            Some(PathBuf::from("/models/labels.json"))
        );
        assert_eq!(config.session_pool_size, 3);
        assert_eq!(config.input_shape, DEFAULT_INPUT_SHAPE);
    }

    #[test]
    fn test_from_lookup_rejects_bad_pool_size() {
        let result = ClassifierConfig::from_lookup(lookup_from(&[
            (ENV_MODEL_PATH, "/models/fruit.onnx"),
            (ENV_POOL_SIZE, "many"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidConfig { .. })));
    }

    #[test]
    fn test_from_file_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "model_path": "weights.onnx" }"#).unwrap();

        let config = ClassifierConfig::from_file(&path).unwrap();
        assert_eq!(config, ClassifierConfig::new("weights.onnx"));
    }

    #[test]
    fn test_from_file_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(ClassifierConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_file_values_win_over_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "model_path": "weights.onnx", "session_pool_size": 2 }"#,
        )
        .unwrap();

        let config = ClassifierConfig::from_file_with_lookup(
            &path,
            lookup_from(&[
                (ENV_MODEL_PATH, "/env/other.onnx"),
                (ENV_LABELS_PATH, "/env/labels.json"),
                (ENV_POOL_SIZE, "5"),
            ]),
        )
        .unwrap();

        assert_eq!(config.model_path, PathBuf::from("weights.onnx"));
        assert_eq!(config.session_pool_size, 2);
        assert_eq!(config.labels_path, Some(PathBuf::from("/env/labels.json")));
    }

    #[test]
    fn test_lookup_fills_model_missing_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "input_shape": [256, 256] }"#).unwrap();

        let config = ClassifierConfig::from_file_with_lookup(
            &path,
            lookup_from(&[(ENV_MODEL_PATH, "/env/fruit.onnx"), (ENV_POOL_SIZE, "4")]),
        )
        .unwrap();
        assert_eq!(config.model_path, PathBuf::from("/env/fruit.onnx"));
        assert_eq!(config.session_pool_size, 4);
        assert_eq!(config.input_shape, (256, 256));

        assert!(ClassifierConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_file_must_hold_an_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "[1, 2]").unwrap();

        let err = ClassifierConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig { .. }));
    }

    #[test]
    fn test_validate_checks_model_and_settings() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("weights.onnx");

        let missing = ClassifierConfig::new(&model);
        assert!(matches!(
            missing.validate(),
            Err(ConfigError::ModelPathNotFound { .. })
        ));

        std::fs::write(&model, b"onnx").unwrap();
        assert!(ClassifierConfig::new(&model).validate().is_ok());
        assert!(
            ClassifierConfig::new(&model)
                .with_session_pool_size(0)
                .validate()
                .is_err()
        );

        let mut same_output = ClassifierConfig::new(&model);
        same_output.fruit_output = Some("logits".to_string());
        same_output.quality_output = Some("logits".to_string());
        assert!(same_output.validate().is_err());
    }
}
