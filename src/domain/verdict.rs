//! Correctness verdicts for labelled samples.
//!
//! Sample images are laid out as `<root>/<Fruit>/<Quality>/<image>`, so the two
//! parent directory names are the ground truth for the image.

use super::labels::same_label;
use super::prediction::FruitPrediction;
use crate::core::errors::{VisionError, VisionResult};
use serde::Serialize;
use std::path::Path;

/// Ground truth read from a sample's location in the dataset tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleTruth {
    /// Fruit directory name.
    pub fruit: String,
    /// Quality directory name.
    pub quality: String,
}

impl SampleTruth {
    /// Creates ground truth from explicit names.
    pub fn new(fruit: impl Into<String>, quality: impl Into<String>) -> Self {
        Self {
            fruit: fruit.into(),
            quality: quality.into(),
        }
    }

    /// Reads the fruit and quality directory names above an image path.
    ///
    /// `Mango/Rotten/img1.jpg` yields fruit `Mango` and quality `Rotten`.
    pub fn from_path(path: &Path) -> VisionResult<Self> {
        let component = |p: Option<&Path>| {
            p.and_then(Path::file_name)
                .and_then(|n| n.to_str())
                .filter(|n| !n.is_empty())
                .map(str::to_string)
        };

        let quality_dir = path.parent();
        let fruit_dir = quality_dir.and_then(Path::parent);
        match (component(fruit_dir), component(quality_dir)) {
            (Some(fruit), Some(quality)) => Ok(Self { fruit, quality }),
            _ => Err(VisionError::invalid_input(format!(
                "'{}' is not inside a <fruit>/<quality>/ directory",
                path.display()
            ))),
        }
    }
}

impl std::fmt::Display for SampleTruth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.fruit, self.quality)
    }
}

/// Whether a prediction matches the sample's ground truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Both heads predicted the directory names.
    Correct,
    /// At least one head disagreed.
    Incorrect {
        /// The ground truth.
        actual: SampleTruth,
    },
}

impl Verdict {
    /// Compares directory names to the predicted labels, ignoring case.
    pub fn evaluate(truth: &SampleTruth, prediction: &FruitPrediction) -> Self {
        let fruit_ok = same_label(&truth.fruit, &prediction.fruit.label);
        let quality_ok = same_label(&truth.quality, &prediction.quality.label);
        if fruit_ok && quality_ok {
            Verdict::Correct
        } else {
            Verdict::Incorrect {
                actual: truth.clone(),
            }
        }
    }

    /// Returns true for [`Verdict::Correct`].
    pub fn is_correct(&self) -> bool {
        matches!(self, Verdict::Correct)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Correct => write!(f, "Correct"),
            Verdict::Incorrect { actual } => write!(f, "Incorrect (Actual: {actual})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::prediction::HeadPrediction;

    fn prediction(fruit: &str, quality: &str) -> FruitPrediction {
        let head = |label: &str| HeadPrediction {
            class_id: 0,
            label: label.to_string(),
            confidence: 88.0,
            top_k: Vec::new(),
        };
        FruitPrediction {
            fruit: head(fruit),
            quality: head(quality),
        }
    }

    #[test]
    fn test_truth_from_dataset_path() {
        let truth = SampleTruth::from_path(Path::new("Mango/Rotten/img1.jpg")).unwrap();
        assert_eq!(truth, SampleTruth::new("Mango", "Rotten"));

        let nested = SampleTruth::from_path(Path::new("/data/fruit/Apple/Fresh/a.png")).unwrap();
        assert_eq!(nested, SampleTruth::new("Apple", "Fresh"));
    }

    #[test]
    fn test_case_folding_is_unicode_aware() {
        let truth = SampleTruth::new("ÄPFEL", "FRISCH");
        assert!(Verdict::evaluate(&truth, &prediction("äpfel", "frisch")).is_correct());

        let truth = SampleTruth::new("mango", "formalin-mixed");
        assert!(Verdict::evaluate(&truth, &prediction("Mango", "Formalin-mixed")).is_correct());
    }

    #[test]
    fn test_truth_requires_two_parent_directories() {
        assert!(SampleTruth::from_path(Path::new("img1.jpg")).is_err());
        assert!(SampleTruth::from_path(Path::new("Rotten/img1.jpg")).is_err());
    }

    #[test]
    fn test_matching_prediction_is_correct() {
        let truth = SampleTruth::from_path(Path::new("Mango/Rotten/img1.jpg")).unwrap();
        let verdict = Verdict::evaluate(&truth, &prediction("Mango", "Rotten"));
        assert!(verdict.is_correct());
        assert_eq!(verdict.to_string(), "Correct");
    }

    #[test]
    fn test_wrong_fruit_reports_actual_labels() {
        let truth = SampleTruth::from_path(Path::new("Mango/Rotten/img1.jpg")).unwrap();
        let verdict = Verdict::evaluate(&truth, &prediction("Apple", "Rotten"));
        assert!(!verdict.is_correct());
        assert_eq!(verdict.to_string(), "Incorrect (Actual: Mango (Rotten))");
    }

    #[test]
    fn test_comparison_ignores_case() {
        let truth = SampleTruth::new("orange", "formalin-mixed");
        let verdict = Verdict::evaluate(&truth, &prediction("Orange", "Formalin-mixed"));
        assert_eq!(verdict, Verdict::Correct);
    }

    #[test]
    fn test_wrong_quality_is_incorrect() {
        let truth = SampleTruth::new("Grape", "Fresh");
        let verdict = Verdict::evaluate(&truth, &prediction("Grape", "Rotten"));
        assert_eq!(verdict.to_string(), "Incorrect (Actual: Grape (Fresh))");
    }
}
