//! Prediction results for the two heads.

use serde::Serialize;

/// Outcome of one head for one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadPrediction {
    /// Arg-max output index.
    pub class_id: usize,
    /// Label at `class_id`.
    pub label: String,
    /// Softmax probability of `class_id` as a percentage in `[0, 100]`.
    pub confidence: f32,
    /// Best classes with their percentages, best first. Empty unless more
    /// than one class was requested.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub top_k: Vec<(String, f32)>,
}

/// Fruit type and quality predicted for one image.
///
/// The two confidences come from independent softmax distributions; they are
/// not a joint probability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FruitPrediction {
    /// Fruit head result.
    pub fruit: HeadPrediction,
    /// Quality head result.
    pub quality: HeadPrediction,
}

impl FruitPrediction {
    /// Renders `"<fruit> (<quality>)"`, e.g. `"Apple (Fresh)"`.
    pub fn display_label(&self) -> String {
        format!("{} ({})", self.fruit.label, self.quality.label)
    }

    /// Average of the two head confidences, for display.
    pub fn mean_confidence(&self) -> f32 {
        (self.fruit.confidence + self.quality.confidence) / 2.0
    }

    /// `(fruit label, quality label, fruit %, quality %)`.
    pub fn as_tuple(&self) -> (&str, &str, f32, f32) {
        (
            &self.fruit.label,
            &self.quality.label,
            self.fruit.confidence,
            self.quality.confidence,
        )
    }
}

impl std::fmt::Display for FruitPrediction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{:.2}%] (fruit {:.2}%, quality {:.2}%)",
            self.display_label(),
            self.mean_confidence(),
            self.fruit.confidence,
            self.quality.confidence
        )
    }
}
