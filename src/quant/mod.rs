//! Quantization arithmetic around the convolution core
//!
//! Provides the three quantization stages that bracket the dense compute:
//! - zero-point shifts on parameter/input storage, scoped so they always
//!   restore (`shift`)
//! - output rescaling by `input_scale * weight_scale / output_scale`,
//!   scalar or per-channel (`rescale`)
//! - saturation to fixed-width integer ranges (`saturate`)

mod config;
mod rescale;
mod saturate;
mod shift;

pub use config::{ChannelQuant, QuantConfig, SaturateMode};
pub use rescale::{rescale_output, scale_round};
pub use saturate::saturate;
pub use shift::ShiftGuard;
