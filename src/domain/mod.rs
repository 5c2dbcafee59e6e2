//! Domain types: label orderings, predictions and correctness verdicts.

pub mod labels;
pub mod prediction;
pub mod verdict;

pub use labels::{
    DEFAULT_FRUIT_LABELS, DEFAULT_QUALITY_LABELS, FRUIT_LABELS_METADATA_KEY, HeadLabels, LabelSet,
    QUALITY_LABELS_METADATA_KEY,
};
pub use prediction::{FruitPrediction, HeadPrediction};
pub use verdict::{SampleTruth, Verdict};
