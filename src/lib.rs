//! convolver — quantization-aware convolution kernels
//!
//! Computes 2D convolutions while simulating fixed-point integer arithmetic
//! (zero-point shifts, per-tensor or per-channel rescaling, round-to-nearest,
//! saturation) on top of a floating-point storage representation, together
//! with the backward pass needed for training:
//!
//! - Forward: shift parameters by their zero-points, convolve via
//!   im2col + GEMM, rescale by `input_scale * weight_scale / output_scale`,
//!   shift by the output zero-point, saturate, restore parameters.
//! - Backward: bias/weight/input gradients in the unquantized domain, with
//!   optional adversarial-training update gating via [`GanCycle`].
//!
//! Parameter storage is mutated in place around the compute; scoped guards
//! guarantee it is restored on every exit path, so the same tensors remain
//! valid for the next call and for gradient updates.

pub mod conv;
pub mod error;
pub mod gan;
pub mod quant;
pub mod tensor;
pub mod trace;

pub use conv::{ConvConfig, PadMode, PadSides, QuantConv2d};
pub use error::{ConvolverError, Result};
pub use gan::{GanCycle, GanRole};
pub use quant::{ChannelQuant, QuantConfig, SaturateMode};
pub use tensor::Tensor;
