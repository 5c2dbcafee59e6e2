//! ONNX Runtime engine for a backbone with two classification heads.
//!
//! The exported graph takes one `[batch, 3, H, W]` image tensor and produces two
//! logit tensors: `[batch, fruit_classes]` and `[batch, quality_classes]`. Both heads
//! read the same backbone features, so one forward pass yields both outputs.

use super::session::load_session;
use crate::core::config::OrtSessionConfig;
use crate::core::errors::{SimpleError, VisionError, VisionResult};
use crate::core::{Tensor2D, Tensor4D};
use ndarray::ArrayView2;
use ort::session::Session;
use ort::value::{TensorRef, ValueType};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Number of fruit classes the heads were trained with.
pub const FRUIT_CLASSES: usize = 5;
/// Number of quality classes the heads were trained with.
pub const QUALITY_CLASSES: usize = 3;

/// Describes how the two heads are found among the graph outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadBinding {
    /// Output name of the fruit head; output 0 when `None`.
    pub fruit_output: Option<String>,
    /// Output name of the quality head; output 1 when `None`.
    pub quality_output: Option<String>,
    /// Width of the fruit head.
    pub fruit_classes: usize,
    /// Width of the quality head.
    pub quality_classes: usize,
}

impl Default for HeadBinding {
    fn default() -> Self {
        Self {
            fruit_output: None,
            quality_output: None,
            fruit_classes: FRUIT_CLASSES,
            quality_classes: QUALITY_CLASSES,
        }
    }
}

/// Raw logits from one forward pass.
#[derive(Debug, Clone)]
pub struct HeadLogits {
    /// Fruit logits, `[batch, fruit_classes]`.
    pub fruit: Tensor2D,
    /// Quality logits, `[batch, quality_classes]`.
    pub quality: Tensor2D,
}

/// Inference engine holding a pool of sessions over the same graph.
///
/// Sessions need exclusive access while running, so each one sits behind a
/// mutex and requests are spread round-robin across the pool. The engine itself
/// is never mutated after construction and can be shared behind an `Arc`.
pub struct TwoHeadInfer {
    sessions: Vec<Mutex<Session>>,
    next_idx: AtomicUsize,
    input_name: String,
    input_dims: Option<Vec<i64>>,
    fruit_output: String,
    quality_output: String,
    fruit_classes: usize,
    quality_classes: usize,
    model_path: PathBuf,
    model_name: String,
}

impl std::fmt::Debug for TwoHeadInfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoHeadInfer")
            .field("sessions", &self.sessions.len())
            .field("input_name", &self.input_name)
            .field("input_dims", &self.input_dims)
            .field("fruit_output", &self.fruit_output)
            .field("quality_output", &self.quality_output)
            .field("model_path", &self.model_path)
            .field("model_name", &self.model_name)
            .finish()
    }
}

impl TwoHeadInfer {
    /// Loads the graph and checks that it matches `binding`.
    ///
    /// # Errors
    ///
    /// * [`VisionError::ModelLoad`] if the file is missing or not a valid graph.
    /// * [`VisionError::ModelStructure`] if the graph does not have one image input
    ///   and two heads of the declared widths.
    pub fn new(
        model_path: impl AsRef<Path>,
        binding: &HeadBinding,
        pool_size: usize,
        ort_config: Option<&OrtSessionConfig>,
    ) -> VisionResult<Self> {
        let path = model_path.as_ref();
        let pool_size = pool_size.max(1);

        let mut sessions = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            sessions.push(load_session(path, ort_config)?);
        }

        let (input_name, fruit_output, quality_output) =
            Self::resolve_io(path, &sessions[0], binding)?;
        let input_dims = tensor_shape(sessions[0].inputs()[0].dtype());

        let model_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown_model")
            .to_string();

        debug!(
            model = %model_name,
            input = %input_name,
            fruit_output = %fruit_output,
            quality_output = %quality_output,
            pool_size,
            "two-head engine ready"
        );

        Ok(Self {
            sessions: sessions.into_iter().map(Mutex::new).collect(),
            next_idx: AtomicUsize::new(0),
            input_name,
            input_dims,
            fruit_output,
            quality_output,
            fruit_classes: binding.fruit_classes,
            quality_classes: binding.quality_classes,
            model_path: path.to_path_buf(),
            model_name,
        })
    }

    fn resolve_io(
        path: &Path,
        session: &Session,
        binding: &HeadBinding,
    ) -> VisionResult<(String, String, String)> {
        let inputs = session.inputs();
        if inputs.len() != 1 {
            return Err(VisionError::model_structure(
                path,
                format!("expected exactly 1 input, found {}", inputs.len()),
            ));
        }
        let input_name = inputs[0].name().to_string();

        let output_names: Vec<&str> = session.outputs().iter().map(|o| o.name()).collect();
        if output_names.len() < 2 {
            return Err(VisionError::model_structure(
                path,
                format!(
                    "expected 2 outputs (fruit and quality logits), found {}: {:?}",
                    output_names.len(),
                    output_names
                ),
            ));
        }

        let fruit_idx = resolve_output(path, &output_names, binding.fruit_output.as_deref(), 0)?;
        let quality_idx =
            resolve_output(path, &output_names, binding.quality_output.as_deref(), 1)?;
        if fruit_idx == quality_idx {
            return Err(VisionError::model_structure(
                path,
                format!(
                    "fruit and quality heads both resolve to output '{}'",
                    output_names[fruit_idx]
                ),
            ));
        }
        if output_names.len() > 2 {
            warn!(
                outputs = ?output_names,
                "graph has more than two outputs; extra outputs are ignored"
            );
        }

        for (idx, classes, head) in [
            (fruit_idx, binding.fruit_classes, "fruit"),
            (quality_idx, binding.quality_classes, "quality"),
        ] {
            let shape = tensor_shape(session.outputs()[idx].dtype());
            check_static_width(path, head, shape.as_deref(), classes)?;
        }

        Ok((
            input_name,
            output_names[fruit_idx].to_string(),
            output_names[quality_idx].to_string(),
        ))
    }

    /// Returns the model name (file stem of the weights file).
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Checks that the graph accepts `[1, 3, height, width]` and that both heads
    /// produce the declared widths.
    ///
    /// Static input dimensions are compared first. A zero batch is then run
    /// through the graph, which catches heads whose width is only known at run
    /// time.
    ///
    /// # Errors
    ///
    /// [`VisionError::ModelStructure`] when the graph cannot serve that shape.
    pub fn verify(&self, height: u32, width: u32) -> VisionResult<()> {
        if let Some(dims) = &self.input_dims {
            check_input_dims(&self.model_path, dims, height, width)?;
        }

        let dry_run = Tensor4D::zeros((1, 3, height as usize, width as usize));
        self.infer(&dry_run).map_err(|e| {
            VisionError::model_structure(
                &self.model_path,
                format!("dry run on a [1, 3, {height}, {width}] input failed: {e}"),
            )
        })?;
        Ok(())
    }

    /// Reads a custom metadata entry embedded in the graph.
    pub fn custom_metadata(&self, key: &str) -> VisionResult<Option<String>> {
        let session = self.sessions[0].lock().map_err(|_| {
            VisionError::inference_error(
                &self.model_name,
                "failed to acquire session lock for metadata",
                SimpleError::new("session lock poisoned"),
            )
        })?;
        let metadata = session.metadata()?;
        Ok(metadata.custom(key))
    }

    /// Runs the forward pass and returns both heads' logits.
    ///
    /// ONNX Runtime keeps no autograd state, so nothing is recorded for backprop.
    pub fn infer(&self, x: &Tensor4D) -> VisionResult<HeadLogits> {
        let input_shape = x.shape().to_vec();
        let batch_size = input_shape[0];

        let input_tensor = TensorRef::from_array_view(x.view()).map_err(|e| {
            VisionError::inference_error(
                &self.model_name,
                &format!("failed to convert input tensor with shape {input_shape:?}"),
                e,
            )
        })?;
        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];

        let idx = self.next_idx.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[idx].lock().map_err(|_| {
            VisionError::inference_error(
                &self.model_name,
                &format!(
                    "failed to acquire session lock for session {}/{}",
                    idx,
                    self.sessions.len()
                ),
                SimpleError::new("session lock poisoned"),
            )
        })?;

        let outputs = session.run(inputs).map_err(|e| {
            VisionError::inference_error(
                &self.model_name,
                &format!("forward pass failed for input shape {input_shape:?}"),
                e,
            )
        })?;

        let (fruit_shape, fruit_data) = outputs[self.fruit_output.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                VisionError::inference_error(
                    &self.model_name,
                    &format!("failed to extract '{}' as f32", self.fruit_output),
                    e,
                )
            })?;
        let fruit = logits_from_raw(
            &self.model_name,
            "fruit",
            fruit_shape,
            fruit_data,
            batch_size,
            self.fruit_classes,
        )?;

        let (quality_shape, quality_data) = outputs[self.quality_output.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                VisionError::inference_error(
                    &self.model_name,
                    &format!("failed to extract '{}' as f32", self.quality_output),
                    e,
                )
            })?;
        let quality = logits_from_raw(
            &self.model_name,
            "quality",
            quality_shape,
            quality_data,
            batch_size,
            self.quality_classes,
        )?;

        Ok(HeadLogits { fruit, quality })
    }
}

fn resolve_output(
    path: &Path,
    names: &[&str],
    wanted: Option<&str>,
    position: usize,
) -> VisionResult<usize> {
    match wanted {
        Some(name) => names.iter().position(|n| *n == name).ok_or_else(|| {
            VisionError::model_structure(
                path,
                format!("output '{name}' not found, graph outputs are {names:?}"),
            )
        }),
        None => Ok(position),
    }
}

fn tensor_shape(value_type: &ValueType) -> Option<Vec<i64>> {
    match value_type {
        ValueType::Tensor { shape, .. } => Some(shape.iter().copied().collect()),
        _ => None,
    }
}

/// Compares the graph's `[batch, channels, height, width]` input against the
/// configured shape. Dynamic dimensions (negative values) accept anything.
fn check_input_dims(path: &Path, dims: &[i64], height: u32, width: u32) -> VisionResult<()> {
    let [_, channels, h, w] = dims else {
        return Err(VisionError::model_structure(
            path,
            format!("expected a 4-D image input, graph declares {dims:?}"),
        ));
    };
    for (name, declared, wanted) in [
        ("channels", *channels, 3),
        ("height", *h, i64::from(height)),
        ("width", *w, i64::from(width)),
    ] {
        if declared >= 0 && declared != wanted {
            return Err(VisionError::model_structure(
                path,
                format!("graph input {name} is {declared}, configured {wanted}"),
            ));
        }
    }
    Ok(())
}

/// Checks the last dimension of a head output when the graph declares it.
///
/// Dynamic dimensions (negative values) cannot be checked until run time.
fn check_static_width(
    path: &Path,
    head: &str,
    shape: Option<&[i64]>,
    classes: usize,
) -> VisionResult<()> {
    let Some(shape) = shape else {
        return Err(VisionError::model_structure(
            path,
            format!("{head} output is not a tensor"),
        ));
    };
    match shape.last() {
        Some(&width) if width >= 0 && width as usize != classes => {
            Err(VisionError::model_structure(
                path,
                format!("{head} head has {width} classes, expected {classes}"),
            ))
        }
        None => Err(VisionError::model_structure(
            path,
            format!("{head} output is a scalar"),
        )),
        _ => Ok(()),
    }
}

/// Copies a raw output buffer into a `[batch, classes]` tensor after checking its shape.
fn logits_from_raw(
    model_name: &str,
    head: &str,
    shape: &[i64],
    data: &[f32],
    batch_size: usize,
    classes: usize,
) -> VisionResult<Tensor2D> {
    let expected = [batch_size as i64, classes as i64];
    if shape != expected {
        return Err(VisionError::inference_error(
            model_name,
            &format!("{head} logits have shape {shape:?}, expected {expected:?}"),
            SimpleError::new("output tensor shape mismatch"),
        ));
    }
    let view = ArrayView2::from_shape((batch_size, classes), data).map_err(|e| {
        VisionError::tensor_operation(&format!("failed to view {head} logits"), e)
    })?;
    Ok(view.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_binding_matches_trained_heads() {
        let binding = HeadBinding::default();
        assert_eq!(binding.fruit_classes, 5);
        assert_eq!(binding.quality_classes, 3);
        assert!(binding.fruit_output.is_none());
    }

    #[test]
    fn test_resolve_output_by_name_and_position() {
        let names = ["fruit_logits", "quality_logits"];
        let path = Path::new("m.onnx");
        assert_eq!(resolve_output(path, &names, None, 1).unwrap(), 1);
        assert_eq!(
            resolve_output(path, &names, Some("quality_logits"), 0).unwrap(),
            1
        );
        assert!(matches!(
            resolve_output(path, &names, Some("logits"), 0),
            Err(VisionError::ModelStructure { .. })
        ));
    }

    #[test]
    fn test_check_static_width() {
        let path = Path::new("m.onnx");
        assert!(check_static_width(path, "fruit", Some(&[-1, 5][..]), 5).is_ok());
        assert!(check_static_width(path, "fruit", Some(&[1, -1][..]), 5).is_ok());
        assert!(check_static_width(path, "fruit", Some(&[1, 1000][..]), 5).is_err());
        assert!(check_static_width(path, "quality", Some(&[][..]), 3).is_err());
        assert!(check_static_width(path, "quality", None, 3).is_err());
    }

    #[test]
    fn test_check_input_dims() {
        let path = Path::new("m.onnx");
        assert!(check_input_dims(path, &[-1, 3, 224, 224], 224, 224).is_ok());
        assert!(check_input_dims(path, &[-1, 3, -1, -1], 320, 240).is_ok());
        assert!(matches!(
            check_input_dims(path, &[1, 3, 256, 256], 224, 224),
            Err(VisionError::ModelStructure { .. })
        ));
        assert!(check_input_dims(path, &[1, 1, 224, 224], 224, 224).is_err());
        assert!(check_input_dims(path, &[1, 3, 224], 224, 224).is_err());
    }

    #[test]
    fn test_logits_from_raw_accepts_matching_shape() {
        let data = [0.1, 0.2, 0.3, 1.0, 2.0, 3.0];
        let logits = logits_from_raw("m", "quality", &[2, 3], &data, 2, 3).unwrap();
        assert_eq!(logits.shape(), &[2, 3]);
        assert_eq!(logits[[1, 2]], 3.0);
    }

    #[test]
    fn test_logits_from_raw_rejects_wrong_width() {
        let data = [0.0; 4];
        let err = logits_from_raw("m", "fruit", &[1, 4], &data, 1, 5).unwrap_err();
        assert!(matches!(err, VisionError::Inference { .. }));
    }

    #[test]
    fn test_missing_model_fails_before_structure_checks() {
        let dir = tempfile::tempdir().unwrap();
        let err = TwoHeadInfer::new(
            dir.path().join("absent.onnx"),
            &HeadBinding::default(),
            2,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, VisionError::ModelLoad { .. }));
    }
}
