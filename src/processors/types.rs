//! Types used in image processing operations.

/// Specifies the order of channels in an image tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    /// Channel, Height, Width order (common in PyTorch)
    CHW,
    /// Height, Width, Channel order (common in TensorFlow)
    HWC,
}
