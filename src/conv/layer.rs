//! Quantized convolution layer: forward and backward entry points.
//!
//! Forward brackets the dense compute with the quantization stages:
//!
//! 1. shift weight/bias storage by their zero-points (scoped guards),
//! 2. per sample: shift the input, im2col + GEMM (+ bias),
//! 3. per sample: rescale, shift by the output zero-point, saturate,
//!    restore the input,
//! 4. restore weight/bias storage when the guards drop.
//!
//! Backward works in the unquantized domain: bias, weight and input
//! gradients only, no zero-point or scale handling. Weight updates can be
//! suppressed by the `weight_fixed` flag or by the adversarial schedule.
//!
//! No two calls on the same layer may run concurrently: the zero-point
//! shifts mutate shared weight/bias storage for the duration of the call.

use crate::error::{ConvolverError, Result};
use crate::gan::GanCycle;
use crate::quant::{rescale_output, saturate, QuantConfig, ShiftGuard};
use crate::tensor::Tensor;
use crate::trace::{TraceStep, TRACER};

use super::config::ConvConfig;
use super::gemm::{add_bias, bias_grad_acc, gemm, gemm_nt_acc, gemm_tn};
use super::im2col::{col2im, im2col, PatchGeometry};
use super::shape::output_spatial;

/// A 2-D convolution layer with bit-accurate integer-inference semantics.
pub struct QuantConv2d {
    config: ConvConfig,
    quant: QuantConfig,
    /// Learned filters, shape `[num_output, in_channels, kernel_h, kernel_w]`.
    pub weight: Tensor,
    /// Per-output-channel bias, shape `[num_output]`; present iff the
    /// configuration enables it.
    pub bias: Option<Tensor>,
    /// Accumulate weight gradients on backward.
    pub propagate_weight_grad: bool,
    /// Accumulate bias gradients on backward.
    pub propagate_bias_grad: bool,
}

impl QuantConv2d {
    /// Build a layer around caller-supplied parameter tensors.
    ///
    /// Validates the configuration, the per-channel quantization array
    /// lengths and the parameter shapes. Tensor shapes handed to
    /// [`forward`](Self::forward)/[`backward`](Self::backward) later are the
    /// caller's responsibility and only lightly checked.
    pub fn new(
        config: ConvConfig,
        quant: QuantConfig,
        weight: Tensor,
        bias: Option<Tensor>,
    ) -> Result<Self> {
        config.validate()?;
        quant.validate(config.num_output)?;
        if config.spatial_axes() != 2 {
            return Err(ConvolverError::SpatialRank { axes: config.spatial_axes() });
        }

        let wshape = weight.shape();
        let well_formed = wshape.len() == 4
            && wshape[0] == config.num_output
            && wshape[2] == config.kernel[0]
            && wshape[3] == config.kernel[1];
        if !well_formed {
            let in_channels = wshape.get(1).copied().unwrap_or(0);
            return Err(ConvolverError::ShapeMismatch {
                tensor: "weight",
                expected: vec![config.num_output, in_channels, config.kernel[0], config.kernel[1]],
                actual: wshape.to_vec(),
            });
        }

        match (&bias, config.bias) {
            (Some(b), true) if b.len() == config.num_output => {}
            (None, false) => {}
            (b, _) => {
                return Err(ConvolverError::ShapeMismatch {
                    tensor: "bias",
                    expected: if config.bias { vec![config.num_output] } else { vec![] },
                    actual: b.as_ref().map(|t| t.shape().to_vec()).unwrap_or_default(),
                });
            }
        }

        Ok(Self {
            config,
            quant,
            weight,
            bias,
            propagate_weight_grad: true,
            propagate_bias_grad: true,
        })
    }

    pub fn config(&self) -> &ConvConfig {
        &self.config
    }

    pub fn quant(&self) -> &QuantConfig {
        &self.quant
    }

    pub fn in_channels(&self) -> usize {
        self.weight.shape()[1]
    }

    /// Full output shape for a `[N, C, H, W]` input shape.
    ///
    /// The shape-computation entry point: call whenever the input shape
    /// changes and size the top tensors accordingly.
    pub fn output_shape(&self, bottom_shape: &[usize]) -> Result<Vec<usize>> {
        let geom = self.plan(bottom_shape)?;
        Ok(vec![bottom_shape[0], self.config.num_output, geom.out_h, geom.out_w])
    }

    /// Validate one bottom shape and derive the lowering geometry.
    fn plan(&self, bottom_shape: &[usize]) -> Result<PatchGeometry> {
        if bottom_shape.len() != 4 || bottom_shape[1] != self.in_channels() {
            return Err(ConvolverError::ShapeMismatch {
                tensor: "bottom",
                expected: vec![0, self.in_channels(), 0, 0],
                actual: bottom_shape.to_vec(),
            });
        }
        let spatial = output_spatial(&self.config, &bottom_shape[2..])?;
        let (pad_top, pad_left) = if self.config.pad_sides.any() {
            (self.config.pad_sides.top, self.config.pad_sides.left)
        } else {
            (self.config.pad[0], self.config.pad[1])
        };
        Ok(PatchGeometry {
            channels: self.in_channels(),
            height: bottom_shape[2],
            width: bottom_shape[3],
            kernel_h: self.config.kernel[0],
            kernel_w: self.config.kernel[1],
            pad_top,
            pad_left,
            stride_h: self.config.stride[0],
            stride_w: self.config.stride[1],
            dilation_h: self.config.dilation[0],
            dilation_w: self.config.dilation[1],
            out_h: spatial[0],
            out_w: spatial[1],
        })
    }

    /// Forward pass over paired bottom/top tensors.
    ///
    /// Mutates the top value buffers. Bottom value buffers are shifted in
    /// place around each sample's compute and restored before the call
    /// returns; weight/bias storage is likewise shifted around the whole
    /// batch loop and guaranteed to hold its original values afterwards, on
    /// every exit path.
    pub fn forward(&mut self, bottom: &mut [Tensor], top: &mut [Tensor]) -> Result<()> {
        if bottom.len() != top.len() {
            return Err(ConvolverError::PairCount { bottoms: bottom.len(), tops: top.len() });
        }

        let num_output = self.config.num_output;
        let quant_ch = self.quant.quant_channels(num_output);
        let geoms = bottom
            .iter()
            .map(|b| self.plan(b.shape()))
            .collect::<Result<Vec<_>>>()?;
        for ((bottom_t, top_t), geom) in bottom.iter().zip(top.iter()).zip(geoms.iter()) {
            let expected = vec![bottom_t.shape()[0], num_output, geom.out_h, geom.out_w];
            if top_t.shape() != expected {
                return Err(ConvolverError::ShapeMismatch {
                    tensor: "top",
                    expected,
                    actual: top_t.shape().to_vec(),
                });
            }
        }

        TRACER.start(TraceStep::Forward);

        let Self { quant, weight, bias, .. } = self;
        let weight_guard = ShiftGuard::for_param(
            weight.values_mut(),
            quant.weight_zero_point,
            quant.per_channel_weight.as_ref(),
            quant_ch,
        );
        let bias_guard = bias.as_mut().map(|b| {
            ShiftGuard::for_param(
                b.values_mut(),
                quant.bias_zero_point,
                quant.per_channel_bias.as_ref(),
                quant_ch,
            )
        });

        for ((bottom_t, top_t), geom) in bottom.iter_mut().zip(top.iter_mut()).zip(geoms.iter()) {
            let n = bottom_t.shape()[0];
            let bottom_dim = geom.image_len();
            let out_count = geom.out_h * geom.out_w;
            let top_dim = num_output * out_count;
            let kernel_dim = geom.channels * geom.kernel_h * geom.kernel_w;
            let mut col = vec![0.0; geom.col_len()];

            for s in 0..n {
                let sample =
                    &mut bottom_t.values_mut()[s * bottom_dim..(s + 1) * bottom_dim];
                let input_guard = ShiftGuard::uniform(sample, quant.input_zero_point as f32);

                im2col(&input_guard, geom, &mut col);
                let raw = gemm(&weight_guard, &col, num_output, kernel_dim, out_count);

                let top_sample = &mut top_t.values_mut()[s * top_dim..(s + 1) * top_dim];
                top_sample.copy_from_slice(&raw);
                if let Some(bg) = &bias_guard {
                    add_bias(top_sample, bg, num_output, out_count);
                }

                if quant.scale_output() {
                    rescale_output(top_sample, quant, num_output);
                }
                if quant.output_zero_point != 0 {
                    let zp = quant.output_zero_point as f32;
                    for v in top_sample.iter_mut() {
                        *v += zp;
                    }
                }
                saturate(top_sample, quant.saturate);
                // input_guard drops here, restoring this sample's input
            }
        }

        TRACER.end(TraceStep::Forward, format!("{} pairs", top.len()));
        Ok(())
        // weight/bias guards drop here, restoring parameter storage
    }

    /// Backward pass over paired top/bottom tensors.
    ///
    /// Reads top gradient buffers; accumulates into the weight/bias gradient
    /// buffers (unless suppressed) and writes bottom gradient buffers where
    /// `propagate_down` requests it. Advances `cycle` once at the end.
    pub fn backward(
        &mut self,
        top: &[Tensor],
        propagate_down: &[bool],
        bottom: &mut [Tensor],
        cycle: &mut GanCycle,
    ) -> Result<()> {
        if top.len() != bottom.len() || propagate_down.len() != bottom.len() {
            return Err(ConvolverError::PairCount { bottoms: bottom.len(), tops: top.len() });
        }

        let num_output = self.config.num_output;
        let update_weight = !self.config.weight_fixed && cycle.updates(self.config.gan_role);
        let geoms = bottom
            .iter()
            .map(|b| self.plan(b.shape()))
            .collect::<Result<Vec<_>>>()?;

        TRACER.start(TraceStep::Backward);

        let accumulate_weight = self.propagate_weight_grad && update_weight;
        let accumulate_bias =
            self.bias.is_some() && self.propagate_bias_grad && update_weight;

        let Self { weight, bias, .. } = self;
        let (weight_vals, mut weight_grad) = if accumulate_weight {
            let (vals, grad) = weight.values_and_grad_mut();
            (vals, Some(grad))
        } else {
            (weight.values(), None)
        };

        for ((i, bottom_t), geom) in bottom.iter_mut().enumerate().zip(geoms.iter()) {
            let top_t = &top[i];
            let n = bottom_t.shape()[0];
            let bottom_dim = geom.image_len();
            let out_count = geom.out_h * geom.out_w;
            let top_dim = num_output * out_count;
            let kernel_dim = geom.channels * geom.kernel_h * geom.kernel_w;

            let expected_top = vec![n, num_output, geom.out_h, geom.out_w];
            if top_t.shape() != expected_top {
                return Err(ConvolverError::ShapeMismatch {
                    tensor: "top",
                    expected: expected_top,
                    actual: top_t.shape().to_vec(),
                });
            }
            let top_grad =
                top_t.grad().ok_or(ConvolverError::MissingGrad { tensor: "top" })?;

            if accumulate_bias {
                if let Some(bias_t) = bias.as_mut() {
                    let bias_grad = bias_t.ensure_grad();
                    for s in 0..n {
                        let top_g = &top_grad[s * top_dim..(s + 1) * top_dim];
                        bias_grad_acc(bias_grad, top_g, num_output, out_count);
                    }
                }
            }

            if !accumulate_weight && !propagate_down[i] {
                continue;
            }
            let mut col = vec![0.0; geom.col_len()];
            if propagate_down[i] {
                let (bottom_vals, bottom_grad) = bottom_t.values_and_grad_mut();
                for s in 0..n {
                    let top_g = &top_grad[s * top_dim..(s + 1) * top_dim];
                    if let Some(wg) = weight_grad.as_deref_mut() {
                        im2col(&bottom_vals[s * bottom_dim..(s + 1) * bottom_dim], geom, &mut col);
                        gemm_nt_acc(top_g, &col, wg, num_output, out_count, kernel_dim);
                    }
                    let col_grad = gemm_tn(weight_vals, top_g, num_output, kernel_dim, out_count);
                    col2im(
                        &col_grad,
                        geom,
                        &mut bottom_grad[s * bottom_dim..(s + 1) * bottom_dim],
                    );
                }
            } else if let Some(wg) = weight_grad.as_deref_mut() {
                let bottom_vals = bottom_t.values();
                for s in 0..n {
                    let top_g = &top_grad[s * top_dim..(s + 1) * top_dim];
                    im2col(&bottom_vals[s * bottom_dim..(s + 1) * bottom_dim], geom, &mut col);
                    gemm_nt_acc(top_g, &col, wg, num_output, out_count, kernel_dim);
                }
            }
        }

        cycle.advance();
        TRACER.end(TraceStep::Backward, format!("{} pairs", top.len()));
        Ok(())
    }
}
