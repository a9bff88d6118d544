//! Quantization parameters for one convolution layer.

use serde::{Deserialize, Serialize};

use crate::error::{ConvolverError, Result};

/// Saturation applied after rescale and output shift.
///
/// Emulates the overflow behavior of a fixed-width accumulator. Exactly one
/// mode (or none) applies; modes are mutually exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SaturateMode {
    /// No clamping.
    #[default]
    None,
    /// Signed 16-bit range [-32768, 32767].
    Signed,
    /// Unsigned 16-bit range [0, 65535].
    Unsigned,
    /// Signed 8-bit range [-128, 127].
    Signed8Bit,
    /// Unsigned 8-bit range [0, 255].
    Unsigned8Bit,
}

impl SaturateMode {
    /// Clamp bounds for this mode, `None` when clamping is disabled.
    pub fn bounds(self) -> Option<(f32, f32)> {
        match self {
            Self::None => None,
            Self::Signed => Some((-32768.0, 32767.0)),
            Self::Unsigned => Some((0.0, 65535.0)),
            Self::Signed8Bit => Some((-128.0, 127.0)),
            Self::Unsigned8Bit => Some((0.0, 255.0)),
        }
    }
}

/// Per-output-channel scale/zero-point arrays.
///
/// One entry per output channel. The values come from an external calibration
/// step; this crate only consumes them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelQuant {
    pub scales: Vec<f32>,
    pub zero_points: Vec<f32>,
}

/// Quantization parameters for a quantized convolution layer.
///
/// The default value disables every feature: scales of 1, zero-points of 0,
/// no per-channel arrays, no saturation. In that state the layer computes a
/// plain floating-point convolution.
///
/// Bias scale is assumed to equal `input_scale * weight_scale` and is not
/// independently stored; supplying bias values quantized under any other
/// scale is a caller error.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuantConfig {
    pub input_scale: f32,
    pub output_scale: f32,
    /// Uniform weight scale; superseded per channel by `per_channel_weight`
    /// when both per-channel arrays are present.
    pub weight_scale: f32,
    pub input_zero_point: i32,
    pub output_zero_point: i32,
    pub weight_zero_point: i32,
    pub bias_zero_point: i32,
    /// Per-channel weight scale/zero-point; only combines with
    /// `per_channel_bias` — see [`QuantConfig::quant_channels`].
    pub per_channel_weight: Option<ChannelQuant>,
    pub per_channel_bias: Option<ChannelQuant>,
    pub saturate: SaturateMode,
}

impl Default for QuantConfig {
    fn default() -> Self {
        Self {
            input_scale: 1.0,
            output_scale: 1.0,
            weight_scale: 1.0,
            input_zero_point: 0,
            output_zero_point: 0,
            weight_zero_point: 0,
            bias_zero_point: 0,
            per_channel_weight: None,
            per_channel_bias: None,
            saturate: SaturateMode::None,
        }
    }
}

impl QuantConfig {
    /// Whether the raw output needs rescaling at all.
    pub(crate) fn scale_output(&self) -> bool {
        self.input_scale != 1.0
            || self.weight_scale != 1.0
            || self.output_scale != 1.0
            || self.per_channel_weight.is_some()
            || self.per_channel_bias.is_some()
    }

    /// Channel count for per-channel arithmetic.
    ///
    /// Per-channel weight and bias scaling are only meaningful together;
    /// with one side missing everything collapses to a single slice.
    pub(crate) fn quant_channels(&self, num_output: usize) -> usize {
        if self.per_channel_weight.is_some() && self.per_channel_bias.is_some() {
            num_output
        } else {
            1
        }
    }

    /// Check per-channel array lengths against the output-channel count.
    pub fn validate(&self, num_output: usize) -> Result<()> {
        let channels = self.quant_channels(num_output);
        if let Some(cq) = &self.per_channel_weight {
            check_len("weight scale", &cq.scales, channels)?;
            check_len("weight zero-point", &cq.zero_points, channels)?;
        }
        if let Some(cq) = &self.per_channel_bias {
            check_len("bias scale", &cq.scales, channels)?;
            check_len("bias zero-point", &cq.zero_points, channels)?;
        }
        Ok(())
    }
}

fn check_len(param: &'static str, values: &[f32], channels: usize) -> Result<()> {
    if values.len() < channels {
        return Err(ConvolverError::ChannelCount {
            param,
            expected: channels,
            actual: values.len(),
        });
    }
    Ok(())
}
