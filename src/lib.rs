//! # Fruit Vision
//!
//! Fruit type and quality classification with a two-head vision model exported to
//! ONNX.
//!
//! One backbone feeds two linear heads. A single forward pass over a 224x224 RGB
//! image yields a fruit label (Apple, Banana, Grape, Mango, Orange) and a quality
//! label (Fresh, Rotten, Formalin-mixed), each with a softmax confidence.
//!
//! ## Modules
//!
//! * [`core`] - Errors, configuration and the ONNX Runtime engine
//! * [`domain`] - Label sets, predictions and correctness verdicts
//! * [`models`] - The two-head classifier with its builder
//! * [`processors`] - Normalization, softmax and top-k
//! * [`utils`] - Image loading and logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fruit_vision::prelude::*;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let classifier = Arc::new(
//!     TwoHeadClassifierBuilder::new()
//!         .session_pool_size(2)
//!         .build(Path::new("models/fruit_vit.onnx"))?,
//! );
//!
//! let image = Path::new("samples/Mango/Rotten/img1.jpg");
//! let prediction = classifier.predict_path(image)?;
//! println!("{prediction}");
//!
//! let verdict = Verdict::evaluate(&SampleTruth::from_path(image)?, &prediction);
//! println!("{verdict}");
//! # Ok(())
//! # }
//! ```
//!
//! ### Configuration from the environment
//!
//! ```rust,no_run
//! use fruit_vision::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // FRUIT_VISION_MODEL is required; FRUIT_VISION_LABELS and
//! // FRUIT_VISION_POOL_SIZE are optional.
//! let config = ClassifierConfig::from_env()?;
//! let classifier = TwoHeadClassifier::from_config(&config)?;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod domain;
pub mod models;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// ```rust
/// use fruit_vision::prelude::*;
/// ```
///
/// Covers building a classifier, reading its predictions and judging them
/// against a labelled sample. Lower-level pieces (sessions, processors) are
/// imported from their modules.
pub mod prelude {
    pub use crate::core::config::{ClassifierConfig, OrtSessionConfig};
    pub use crate::core::{VisionError, VisionResult};
    pub use crate::domain::{FruitPrediction, HeadLabels, HeadPrediction, SampleTruth, Verdict};
    pub use crate::models::{TwoHeadClassifier, TwoHeadClassifierBuilder};
    pub use crate::utils::load_image;
}
