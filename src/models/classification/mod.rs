//! Classification models.

pub mod two_head;

pub use two_head::{TwoHeadClassifier, TwoHeadClassifierBuilder, decode_heads, preprocess_images};
