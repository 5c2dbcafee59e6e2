//! ONNX Runtime session configuration.

use serde::{Deserialize, Serialize};

/// Graph optimization levels for ONNX Runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrtGraphOptimizationLevel {
    /// Disable all optimizations.
    DisableAll,
    /// Enable basic optimizations.
    #[default]
    Level1,
    /// Enable extended optimizations.
    Level2,
    /// Enable all optimizations.
    Level3,
}

/// Severity threshold for ONNX Runtime's own log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrtLogLevel {
    Verbose,
    Info,
    Warning,
    /// Only errors (default).
    #[default]
    Error,
    Fatal,
}

/// Execution providers for ONNX Runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum OrtExecutionProvider {
    /// CPU execution provider (always available)
    #[default]
    CPU,
    /// NVIDIA CUDA execution provider
    CUDA {
        /// CUDA device ID (default: 0)
        device_id: Option<i32>,
    },
}

/// Configuration for ONNX Runtime sessions.
///
/// Every field is optional; unset fields keep ONNX Runtime's own defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrtSessionConfig {
    /// Number of threads used to parallelize execution within nodes
    pub intra_threads: Option<usize>,
    /// Number of threads used to parallelize execution across nodes
    pub inter_threads: Option<usize>,
    /// Graph optimization level
    pub optimization_level: Option<OrtGraphOptimizationLevel>,
    /// Execution providers in order of preference
    pub execution_providers: Option<Vec<OrtExecutionProvider>>,
    /// ONNX Runtime log severity; errors only when unset
    pub log_severity_level: Option<OrtLogLevel>,
}

impl OrtSessionConfig {
    /// Creates a new OrtSessionConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of intra-op threads.
    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = Some(threads);
        self
    }

    /// Sets the number of inter-op threads.
    pub fn with_inter_threads(mut self, threads: usize) -> Self {
        self.inter_threads = Some(threads);
        self
    }

    /// Sets the graph optimization level.
    pub fn with_optimization_level(mut self, level: OrtGraphOptimizationLevel) -> Self {
        self.optimization_level = Some(level);
        self
    }

    /// Sets the ONNX Runtime log severity.
    pub fn with_log_severity_level(mut self, level: OrtLogLevel) -> Self {
        self.log_severity_level = Some(level);
        self
    }

    /// Adds a single execution provider.
    pub fn add_execution_provider(mut self, provider: OrtExecutionProvider) -> Self {
        self.execution_providers
            .get_or_insert_with(Vec::new)
            .push(provider);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_setters() {
        let cfg = OrtSessionConfig::new()
            .with_intra_threads(4)
            .with_inter_threads(1)
            .with_optimization_level(OrtGraphOptimizationLevel::Level3)
            .add_execution_provider(OrtExecutionProvider::CPU);

        assert_eq!(cfg.intra_threads, Some(4));
        assert_eq!(cfg.inter_threads, Some(1));
        assert_eq!(
            cfg.optimization_level,
            Some(OrtGraphOptimizationLevel::Level3)
        );
        assert_eq!(cfg.execution_providers, Some(vec![OrtExecutionProvider::CPU]));
    }

    #[test]
    fn test_deserialize_partial_json() {
        let cfg: OrtSessionConfig =
            serde_json::from_str(r#"{ "intra_threads": 2, "optimization_level": "Level2", "log_severity_level": "Warning" }"#)
                .unwrap();
        assert_eq!(cfg.intra_threads, Some(2));
        assert_eq!(cfg.log_severity_level, Some(OrtLogLevel::Warning));
        assert_eq!(cfg.inter_threads, None);
        assert_eq!(
            cfg.optimization_level,
            Some(OrtGraphOptimizationLevel::Level2)
        );
    }
}
