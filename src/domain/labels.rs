//! Label orderings for the two classification heads.
//!
//! Position `i` of a label set names the class the trained weights predict at
//! output index `i`. The ordering is fixed at training time and nothing in the
//! logits reveals it, so it is validated against the head widths and, when the
//! exported graph carries its own copy, against that copy.

use crate::core::errors::{VisionError, VisionResult};
use crate::core::inference::TwoHeadInfer;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Fruit classes in training index order (alphabetical).
pub const DEFAULT_FRUIT_LABELS: [&str; 5] = ["Apple", "Banana", "Grape", "Mango", "Orange"];

/// Quality classes in training index order.
pub const DEFAULT_QUALITY_LABELS: [&str; 3] = ["Fresh", "Rotten", "Formalin-mixed"];

/// Graph metadata key holding the fruit labels as a JSON array.
pub const FRUIT_LABELS_METADATA_KEY: &str = "fruit_labels";

/// Graph metadata key holding the quality labels as a JSON array.
pub const QUALITY_LABELS_METADATA_KEY: &str = "quality_labels";

/// Ordered labels for one head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(Vec<String>);

impl LabelSet {
    /// Creates a label set from labels in output-index order.
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(labels.into_iter().map(Into::into).collect())
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set has no labels.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Label for an output index.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Iterates over the labels in output-index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Output index of a label, compared with [`same_label`].
    pub fn position_ignore_case(&self, label: &str) -> Option<usize> {
        self.0.iter().position(|l| same_label(l, label))
    }

    /// Checks the set against the width of the head it is bound to.
    ///
    /// Labels must be non-empty, unique (case-insensitively) and exactly as many
    /// as the head has outputs.
    pub fn validate(&self, head: &str, classes: usize) -> VisionResult<()> {
        if self.len() != classes {
            return Err(VisionError::label_mismatch(
                head,
                format!("{classes} labels"),
                format!("{} labels", self.len()),
            ));
        }
        let mut seen = HashSet::with_capacity(self.len());
        for label in self.iter() {
            if label.trim().is_empty() {
                return Err(VisionError::label_mismatch(
                    head,
                    "non-empty labels",
                    "an empty label",
                ));
            }
            if !seen.insert(label.to_lowercase()) {
                return Err(VisionError::label_mismatch(
                    head,
                    "unique labels",
                    format!("duplicate label '{label}'"),
                ));
            }
        }
        Ok(())
    }
}

/// Label equality used everywhere labels are matched: Unicode lowercase on
/// both sides.
pub(crate) fn same_label(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

impl std::fmt::Display for LabelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// Label sets for both heads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadLabels {
    /// Fruit head labels.
    pub fruit: LabelSet,
    /// Quality head labels.
    pub quality: LabelSet,
}

impl Default for HeadLabels {
    fn default() -> Self {
        Self {
            fruit: LabelSet::new(DEFAULT_FRUIT_LABELS),
            quality: LabelSet::new(DEFAULT_QUALITY_LABELS),
        }
    }
}

impl HeadLabels {
    /// Parses `{"fruit": [...], "quality": [...]}`.
    pub fn from_json_str(json: &str) -> VisionResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a label sidecar file.
    pub fn from_json_file(path: &Path) -> VisionResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents).map_err(|e| {
            VisionError::config_error(format!(
                "invalid labels file '{}': {e}",
                path.display()
            ))
        })
    }

    /// Reads labels embedded as custom metadata in the exported graph.
    ///
    /// Returns `Ok(None)` when the graph carries no labels. A graph carrying only
    /// one of the two keys is rejected.
    pub fn from_metadata(
        lookup: impl Fn(&str) -> VisionResult<Option<String>>,
    ) -> VisionResult<Option<Self>> {
        let fruit = lookup(FRUIT_LABELS_METADATA_KEY)?;
        let quality = lookup(QUALITY_LABELS_METADATA_KEY)?;

        match (fruit, quality) {
            (None, None) => Ok(None),
            (Some(fruit), Some(quality)) => Ok(Some(Self {
                fruit: LabelSet::new(serde_json::from_str::<Vec<String>>(&fruit)?),
                quality: LabelSet::new(serde_json::from_str::<Vec<String>>(&quality)?),
            })),
            (fruit, _) => {
                let missing = if fruit.is_some() {
                    QUALITY_LABELS_METADATA_KEY
                } else {
                    FRUIT_LABELS_METADATA_KEY
                };
                Err(VisionError::config_error(format!(
                    "model metadata carries only one label set; '{missing}' is missing"
                )))
            }
        }
    }

    /// Reads labels embedded in a loaded graph.
    pub fn from_model_metadata(engine: &TwoHeadInfer) -> VisionResult<Option<Self>> {
        Self::from_metadata(|key| engine.custom_metadata(key))
    }

    /// Checks both sets against the head widths.
    pub fn validate(&self, fruit_classes: usize, quality_classes: usize) -> VisionResult<()> {
        self.fruit.validate("fruit", fruit_classes)?;
        self.quality.validate("quality", quality_classes)
    }

    /// Picks the label sets to use and verifies them.
    ///
    /// Explicit labels win over labels embedded in the graph, which win over the
    /// built-in defaults. When explicit and embedded labels are both present they
    /// must be identical.
    pub fn resolve(
        explicit: Option<Self>,
        embedded: Option<Self>,
        fruit_classes: usize,
        quality_classes: usize,
    ) -> VisionResult<Self> {
        let labels = match (explicit, embedded) {
            (Some(explicit), Some(embedded)) => {
                if explicit.fruit != embedded.fruit {
                    return Err(VisionError::label_mismatch(
                        "fruit",
                        embedded.fruit.to_string(),
                        explicit.fruit.to_string(),
                    ));
                }
                if explicit.quality != embedded.quality {
                    return Err(VisionError::label_mismatch(
                        "quality",
                        embedded.quality.to_string(),
                        explicit.quality.to_string(),
                    ));
                }
                debug!("explicit labels agree with model metadata");
                explicit
            }
            (Some(explicit), None) => explicit,
            (None, Some(embedded)) => {
                debug!("using labels embedded in model metadata");
                embedded
            }
            (None, None) => Self::default(),
        };
        labels.validate(fruit_classes, quality_classes)?;
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ordering_pins_training_indices() {
        let labels = HeadLabels::default();
        assert_eq!(labels.fruit.get(0), Some("Apple"));
        assert_eq!(labels.fruit.get(3), Some("Mango"));
        assert_eq!(labels.quality.get(0), Some("Fresh"));
        assert_eq!(labels.quality.get(2), Some("Formalin-mixed"));
        assert!(labels.validate(5, 3).is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_width() {
        let labels = HeadLabels::default();
        assert!(matches!(
            labels.validate(4, 3),
            Err(VisionError::LabelMismatch { ref head, .. }) if head == "fruit"
        ));
    }

    #[test]
    fn test_validate_rejects_duplicates_and_blanks() {
        let dup = LabelSet::new(["Fresh", "fresh", "Rotten"]);
        assert!(dup.validate("quality", 3).is_err());
        let blank = LabelSet::new(["Fresh", " ", "Rotten"]);
        assert!(blank.validate("quality", 3).is_err());
    }

    #[test]
    fn test_position_ignore_case() {
        let labels = HeadLabels::default();
        assert_eq!(labels.quality.position_ignore_case("formalin-mixed"), Some(2));
        assert_eq!(labels.fruit.position_ignore_case("kiwi"), None);

        let unicode = LabelSet::new(["Äpfel", "Birne"]);
        assert_eq!(unicode.position_ignore_case("äPFEL"), Some(0));
        assert!(LabelSet::new(["Äpfel", "äpfel"]).validate("fruit", 2).is_err());
    }

    #[test]
    fn test_json_round_trip_format() {
        let labels = HeadLabels::from_json_str(
            r#"{"fruit": ["Apple", "Banana", "Grape", "Mango", "Orange"],
                "quality": ["Fresh", "Rotten", "Formalin-mixed"]}"#,
        )
        .unwrap();
        assert_eq!(labels, HeadLabels::default());
    }

    #[test]
    fn test_from_json_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.json");
        std::fs::write(&path, r#"{"fruit": ["Apple"]}"#).unwrap();

        let err = HeadLabels::from_json_file(&path).unwrap_err();
        assert!(err.to_string().contains("labels.json"));
    }

    #[test]
    fn test_from_metadata() {
        let none = HeadLabels::from_metadata(|_| Ok(None)).unwrap();
        assert!(none.is_none());

        let both = HeadLabels::from_metadata(|key| {
            Ok(Some(match key {
                FRUIT_LABELS_METADATA_KEY => {
                    r#"["Apple","Banana","Grape","Mango","Orange"]"#.to_string()
                }
                _ => r#"["Fresh","Rotten","Formalin-mixed"]"#.to_string(),
            }))
        })
        .unwrap();
        assert_eq!(both, Some(HeadLabels::default()));

        let partial = HeadLabels::from_metadata(|key| {
            Ok((key == FRUIT_LABELS_METADATA_KEY).then(|| r#"["Apple"]"#.to_string()))
        });
        assert!(matches!(partial, Err(VisionError::ConfigError { .. })));
    }

    #[test]
    fn test_resolve_precedence() {
        let swapped = HeadLabels {
            fruit: LabelSet::new(["Banana", "Apple", "Grape", "Mango", "Orange"]),
            quality: LabelSet::new(DEFAULT_QUALITY_LABELS),
        };

        let from_default = HeadLabels::resolve(None, None, 5, 3).unwrap();
        assert_eq!(from_default, HeadLabels::default());

        let from_embedded = HeadLabels::resolve(None, Some(swapped.clone()), 5, 3).unwrap();
        assert_eq!(from_embedded.fruit.get(0), Some("Banana"));

        let from_explicit = HeadLabels::resolve(Some(swapped.clone()), None, 5, 3).unwrap();
        assert_eq!(from_explicit, swapped);
    }

    #[test]
    fn test_resolve_rejects_disagreeing_sources() {
        let swapped = HeadLabels {
            fruit: LabelSet::new(["Banana", "Apple", "Grape", "Mango", "Orange"]),
            quality: LabelSet::new(DEFAULT_QUALITY_LABELS),
        };
        let err =
            HeadLabels::resolve(Some(swapped), Some(HeadLabels::default()), 5, 3).unwrap_err();
        assert!(matches!(err, VisionError::LabelMismatch { ref head, .. } if head == "fruit"));
    }
}
