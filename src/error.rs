//! Error types with actionable diagnostics.
//!
//! Every variant is a configuration or programming defect: the kernel is a
//! pure compute step with no retry semantics, so failures surface immediately
//! with enough context to fix the configuration.

use thiserror::Error;

/// Result type alias for convolver operations.
pub type Result<T> = std::result::Result<T, ConvolverError>;

/// Errors that can occur while configuring or running a quantized convolution.
#[derive(Error, Debug)]
pub enum ConvolverError {
    /// Padding-mode code from an external configuration is not recognized.
    #[error("Unknown padding mode code: {code}\n  → Valid codes: 0 (floor), 1 (ceil)")]
    UnknownPadMode { code: i32 },

    /// Explicit per-side padding is defined for 2 spatial axes only.
    #[error("Explicit per-side padding supports exactly 2 spatial axes, got {axes}\n  → Use symmetric padding with a pad mode for other ranks")]
    ExplicitPadRank { axes: usize },

    /// The numeric core lowers 2-D patches only.
    #[error("QuantConv2d supports exactly 2 spatial axes, got {axes}\n  → The shape planner handles N-D, the compute path does not")]
    SpatialRank { axes: usize },

    /// Kernel/stride/dilation/pad arrays disagree on the number of spatial axes.
    #[error("Spatial parameter arrays disagree: kernel has {kernel} axes, {name} has {actual}\n  → Give kernel, stride, dilation and pad one entry per spatial axis")]
    AxisCount { kernel: usize, name: &'static str, actual: usize },

    /// Stride of zero would never advance the kernel window.
    #[error("Stride must be nonzero on axis {axis}")]
    ZeroStride { axis: usize },

    /// Per-channel scale/zero-point arrays are shorter than the channel count.
    #[error("Per-channel {param} needs at least {expected} entries, got {actual}\n  → Supply one scale and one zero-point per output channel")]
    ChannelCount { param: &'static str, expected: usize, actual: usize },

    /// A tensor does not have the shape the layer configuration implies.
    #[error("Shape mismatch for {tensor}: expected {expected:?}, got {actual:?}\n  → Re-run shape planning after changing the input shape")]
    ShapeMismatch { tensor: &'static str, expected: Vec<usize>, actual: Vec<usize> },

    /// A value buffer disagrees with the product of its shape dims.
    #[error("Value buffer holds {actual} elements but shape {shape:?} needs {expected}")]
    BufferSize { shape: Vec<usize>, expected: usize, actual: usize },

    /// The kernel extent overhangs the padded input on some axis.
    #[error("Empty output: padded input extent {padded} is smaller than kernel extent {extent} on axis {axis}\n  → Increase padding or reduce kernel size/dilation")]
    EmptyOutput { axis: usize, padded: usize, extent: usize },

    /// Forward/backward were handed mismatched input/output lists.
    #[error("Bottom/top tensor lists must pair up: {bottoms} bottoms vs {tops} tops")]
    PairCount { bottoms: usize, tops: usize },

    /// Backward needs a gradient buffer on every top tensor.
    #[error("Missing gradient buffer on {tensor}\n  → Set the output gradient before calling backward")]
    MissingGrad { tensor: &'static str },
}
