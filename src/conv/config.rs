//! Convolution hyper-parameters.

use serde::{Deserialize, Serialize};

use crate::error::{ConvolverError, Result};
use crate::gan::GanRole;

/// How symmetric padding maps to output extents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PadMode {
    /// `output = (input + 2*pad - kernel_extent) / stride + 1`
    #[default]
    Floor,
    /// `output = ceil(input / stride)`; pad and kernel extent are ignored.
    Ceil,
}

impl PadMode {
    /// Decode the integer code used by external configuration.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::Floor),
            1 => Ok(Self::Ceil),
            _ => Err(ConvolverError::UnknownPadMode { code }),
        }
    }
}

/// Explicit per-side spatial padding.
///
/// When any side is nonzero this takes over from the symmetric
/// `pad`/`pad_mode` mechanism entirely. Supports exactly 2 spatial axes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PadSides {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

impl PadSides {
    pub fn any(&self) -> bool {
        self.top != 0 || self.bottom != 0 || self.left != 0 || self.right != 0
    }
}

/// Configuration for one quantized convolution layer.
///
/// All spatial arrays (`kernel`, `stride`, `dilation`, `pad`) carry one entry
/// per spatial axis.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConvConfig {
    pub kernel: Vec<usize>,
    pub stride: Vec<usize>,
    pub dilation: Vec<usize>,
    /// Symmetric padding, used together with `pad_mode` when no explicit
    /// side padding is set.
    pub pad: Vec<usize>,
    pub pad_sides: PadSides,
    pub pad_mode: PadMode,
    /// Number of output channels (filters).
    pub num_output: usize,
    /// Whether the layer carries a bias term.
    pub bias: bool,
    /// Freeze weights: backward never accumulates weight/bias gradients.
    #[serde(default)]
    pub weight_fixed: bool,
    /// Adversarial role gating weight updates, if any.
    #[serde(default)]
    pub gan_role: GanRole,
}

impl ConvConfig {
    /// 2-D configuration with a square kernel and symmetric padding.
    pub fn square(kernel: usize, stride: usize, pad: usize, num_output: usize, bias: bool) -> Self {
        Self {
            kernel: vec![kernel; 2],
            stride: vec![stride; 2],
            dilation: vec![1; 2],
            pad: vec![pad; 2],
            pad_sides: PadSides::default(),
            pad_mode: PadMode::Floor,
            num_output,
            bias,
            weight_fixed: false,
            gan_role: GanRole::None,
        }
    }

    pub fn spatial_axes(&self) -> usize {
        self.kernel.len()
    }

    /// Kernel extent on one axis, accounting for dilation.
    pub fn kernel_extent(&self, axis: usize) -> usize {
        self.dilation[axis] * (self.kernel[axis] - 1) + 1
    }

    /// Check internal consistency of the spatial arrays.
    pub fn validate(&self) -> Result<()> {
        let axes = self.kernel.len();
        for (name, len) in [
            ("stride", self.stride.len()),
            ("dilation", self.dilation.len()),
            ("pad", self.pad.len()),
        ] {
            if len != axes {
                return Err(ConvolverError::AxisCount { kernel: axes, name, actual: len });
            }
        }
        for (axis, &s) in self.stride.iter().enumerate() {
            if s == 0 {
                return Err(ConvolverError::ZeroStride { axis });
            }
        }
        if self.pad_sides.any() && axes != 2 {
            return Err(ConvolverError::ExplicitPadRank { axes });
        }
        Ok(())
    }
}
