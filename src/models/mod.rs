//! Model wrappers.
//!
//! Each model pairs an inference engine with the preprocessing and
//! postprocessing it was trained with.

pub mod classification;

pub use classification::*;
