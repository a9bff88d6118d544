//! Output rescaling with double-precision round-to-nearest.
//!
//! The raw convolution output lives on the integer grid of
//! `input_scale * weight_scale`; multiplying by
//! `input_scale * weight_scale / output_scale` moves it onto the output
//! grid. The multiplier is formed and applied in `f64` and the result
//! rounded to the nearest integer, matching fixed-point requantization.

use crate::trace::{TraceStep, TRACER};

use super::config::QuantConfig;

/// Multiply every element by `factor` in double precision and round.
pub fn scale_round(data: &mut [f32], factor: f64) {
    for v in data.iter_mut() {
        *v = (f64::from(*v) * factor).round() as f32;
    }
}

/// Rescale one sample's raw output onto the output quantization grid.
///
/// With both per-channel arrays present the output splits into
/// `quant_channels` contiguous slices, each rescaled by its own
/// `input_scale * weight_scale[k] / output_scale`; otherwise a single scalar
/// ratio covers the whole buffer.
pub fn rescale_output(top: &mut [f32], quant: &QuantConfig, num_output: usize) {
    TRACER.start(TraceStep::Rescale);
    let channels = quant.quant_channels(num_output);
    match (&quant.per_channel_weight, &quant.per_channel_bias) {
        (Some(weight_cq), Some(_)) => {
            let slice = top.len() / channels;
            for (chunk, &weight_scale) in
                top.chunks_mut(slice).zip(weight_cq.scales.iter())
            {
                let factor =
                    f64::from(quant.input_scale) * f64::from(weight_scale)
                        / f64::from(quant.output_scale);
                scale_round(chunk, factor);
            }
        }
        _ => {
            let factor = f64::from(quant.input_scale) * f64::from(quant.weight_scale)
                / f64::from(quant.output_scale);
            scale_round(top, factor);
        }
    }
    TRACER.end(TraceStep::Rescale, format!("{} elems", top.len()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quant::config::ChannelQuant;

    #[test]
    fn test_scale_round_rounds_to_nearest() {
        let mut data = vec![3.0, 5.0, -5.0];
        scale_round(&mut data, 0.5);
        assert_eq!(data, vec![2.0, 3.0, -3.0]); // ties round away from zero
    }

    #[test]
    fn test_scalar_rescale() {
        let quant = QuantConfig {
            input_scale: 2.0,
            weight_scale: 3.0,
            output_scale: 4.0,
            ..Default::default()
        };
        let mut top = vec![2.0, 4.0];
        rescale_output(&mut top, &quant, 1);
        // factor = 2*3/4 = 1.5
        assert_eq!(top, vec![3.0, 6.0]);
    }

    #[test]
    fn test_per_channel_rescale_slices() {
        let quant = QuantConfig {
            per_channel_weight: Some(ChannelQuant {
                scales: vec![1.0, 2.0],
                zero_points: vec![0.0, 0.0],
            }),
            per_channel_bias: Some(ChannelQuant {
                scales: vec![1.0, 2.0],
                zero_points: vec![0.0, 0.0],
            }),
            ..Default::default()
        };
        // 2 output channels, 1 spatial position each
        let mut top = vec![3.0, 3.0];
        rescale_output(&mut top, &quant, 2);
        assert_eq!(top, vec![3.0, 6.0]);
    }

    #[test]
    fn test_single_per_channel_flag_falls_back_to_scalar() {
        // only the weight side is per-channel: the scalar ratio applies
        let quant = QuantConfig {
            weight_scale: 2.0,
            per_channel_weight: Some(ChannelQuant {
                scales: vec![10.0, 10.0],
                zero_points: vec![0.0, 0.0],
            }),
            ..Default::default()
        };
        let mut top = vec![1.0, 1.0];
        rescale_output(&mut top, &quant, 2);
        assert_eq!(top, vec![2.0, 2.0]);
    }
}
