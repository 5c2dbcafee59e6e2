//! Image preprocessing and logit postprocessing.
//!
//! * [`NormalizeImage`] - scale and standardize RGB pixels into a model tensor
//! * [`softmax`] / [`softmax_rows`] - logits to probabilities
//! * [`Topk`] - best classes per probability row

pub mod normalization;
pub mod softmax;
pub mod topk;
pub mod types;

pub use normalization::{IMAGENET_MEAN, IMAGENET_STD, NormalizeImage};
pub use softmax::{softmax, softmax_rows};
pub use topk::{Topk, TopkResult};
pub use types::ChannelOrder;
