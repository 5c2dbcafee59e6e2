//! ONNX Runtime inference.
//!
//! [`load_session`] builds a single session; [`TwoHeadInfer`] wraps a session pool
//! for a graph with one image input and two logit outputs.

pub mod session;
pub mod two_head;

pub use session::load_session;
pub use two_head::{FRUIT_CLASSES, HeadBinding, HeadLogits, QUALITY_CLASSES, TwoHeadInfer};
