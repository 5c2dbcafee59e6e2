//! Helpers for building ONNX Runtime sessions.

use crate::core::config::{
    OrtExecutionProvider, OrtGraphOptimizationLevel, OrtLogLevel, OrtSessionConfig,
};
use crate::core::errors::VisionError;
use ort::ep::ExecutionProviderDispatch;
use ort::logging::LogLevel;
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use std::path::Path;
use tracing::debug;

/// Loads one ONNX Runtime session for the graph at `model_path`.
///
/// A missing file is reported before ONNX Runtime is involved so the error
/// names the path instead of an opaque runtime status.
pub fn load_session(
    model_path: impl AsRef<Path>,
    config: Option<&OrtSessionConfig>,
) -> Result<Session, VisionError> {
    let path = model_path.as_ref();
    if !path.is_file() {
        return Err(VisionError::model_load_error(
            path,
            "weights file not found",
            Some("set FRUIT_VISION_MODEL or pass --model with the exported ONNX graph"),
            None::<VisionError>,
        ));
    }

    let builder = Session::builder()?;
    let mut builder = match config {
        Some(cfg) => apply_ort_config(builder, cfg)?,
        // Keep ORT quiet unless asked otherwise
        None => builder
            .with_log_level(LogLevel::Error)
            .map_err(ort::Error::from)?,
    };

    let session = builder.commit_from_file(path).map_err(|e| {
        VisionError::model_load_error(
            path,
            "failed to create ONNX session",
            Some("verify the file is an ONNX export of the two-head model"),
            Some(e),
        )
    })?;

    debug!(
        model = %path.display(),
        inputs = session.inputs().len(),
        outputs = session.outputs().len(),
        "loaded ONNX session"
    );
    Ok(session)
}

/// Applies `cfg` to a fresh builder.
///
/// Builder errors carry the builder back; they are flattened into plain
/// `ort::Error`s here.
fn apply_ort_config(
    mut builder: SessionBuilder,
    cfg: &OrtSessionConfig,
) -> Result<SessionBuilder, ort::Error> {
    let log_level = match cfg.log_severity_level.unwrap_or_default() {
        OrtLogLevel::Verbose => LogLevel::Verbose,
        OrtLogLevel::Info => LogLevel::Info,
        OrtLogLevel::Warning => LogLevel::Warning,
        OrtLogLevel::Error => LogLevel::Error,
        OrtLogLevel::Fatal => LogLevel::Fatal,
    };
    builder = builder.with_log_level(log_level)?;
    if let Some(intra) = cfg.intra_threads {
        builder = builder.with_intra_threads(intra)?;
    }
    if let Some(inter) = cfg.inter_threads {
        builder = builder.with_inter_threads(inter)?;
    }
    if let Some(level) = cfg.optimization_level {
        let mapped = match level {
            OrtGraphOptimizationLevel::DisableAll => GraphOptimizationLevel::Disable,
            OrtGraphOptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
            OrtGraphOptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
            OrtGraphOptimizationLevel::Level3 => GraphOptimizationLevel::Level3,
        };
        builder = builder.with_optimization_level(mapped)?;
    }
    if let Some(eps) = &cfg.execution_providers {
        let providers = build_execution_providers(eps)?;
        if !providers.is_empty() {
            builder = builder.with_execution_providers(providers)?;
        }
    }
    Ok(builder)
}

fn build_execution_providers(
    eps: &[OrtExecutionProvider],
) -> Result<Vec<ExecutionProviderDispatch>, ort::Error> {
    let mut providers = Vec::with_capacity(eps.len());
    for ep in eps {
        match ep {
            OrtExecutionProvider::CPU => {
                providers.push(ort::ep::CPU::default().build());
            }
            #[cfg(feature = "cuda")]
            OrtExecutionProvider::CUDA { device_id } => {
                let mut cuda = ort::ep::CUDA::default();
                if let Some(id) = device_id {
                    cuda = cuda.with_device_id(*id);
                }
                providers.push(cuda.build());
            }
            #[cfg(not(feature = "cuda"))]
            OrtExecutionProvider::CUDA { .. } => {
                return Err(ort::Error::new(
                    "CUDA execution provider requested but cuda feature is not enabled",
                ));
            }
        }
    }
    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_weights_file_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_session(dir.path().join("missing.onnx"), None).unwrap_err();
        match err {
            VisionError::ModelLoad { reason, .. } => assert_eq!(reason, "weights file not found"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_execution_providers_map_from_config() {
        let providers = build_execution_providers(&[OrtExecutionProvider::CPU]).unwrap();
        assert_eq!(providers.len(), 1);

        let cuda = build_execution_providers(&[OrtExecutionProvider::CUDA { device_id: Some(0) }]);
        assert_eq!(cuda.is_ok(), cfg!(feature = "cuda"));
    }

    #[test]
    fn test_corrupt_weights_file_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.onnx");
        std::fs::write(&path, b"definitely not protobuf").unwrap();

        let err = load_session(&path, None).unwrap_err();
        assert!(matches!(
            err,
            VisionError::ModelLoad { .. } | VisionError::Session(_)
        ));
    }
}
