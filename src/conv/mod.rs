//! Quantized convolution: configuration, shape planning, lowering and the
//! layer entry points.

mod config;
mod gemm;
mod im2col;
mod layer;
mod shape;

pub use config::{ConvConfig, PadMode, PadSides};
pub use gemm::{add_bias, bias_grad_acc, gemm, gemm_nt_acc, gemm_tn};
pub use im2col::{col2im, im2col, PatchGeometry};
pub use layer::QuantConv2d;
pub use shape::output_spatial;
