//! Output shape planning.

use crate::error::{ConvolverError, Result};

use super::config::{ConvConfig, PadMode};

/// Derive the output spatial extents for the given input extents.
///
/// Explicit per-side padding (any nonzero side) bypasses the symmetric
/// `pad`/`pad_mode` mechanism and supports exactly 2 spatial axes: the
/// top/bottom pair pads axis 0, the left/right pair axis 1. Otherwise each
/// axis follows `pad_mode` — floor division over the padded extent, or plain
/// ceiling of `input / stride`.
///
/// Runs once per shape change; forward/backward assume tensor shapes match
/// its result.
pub fn output_spatial(config: &ConvConfig, input_spatial: &[usize]) -> Result<Vec<usize>> {
    let axes = config.spatial_axes();
    if input_spatial.len() != axes {
        return Err(ConvolverError::AxisCount {
            kernel: axes,
            name: "input spatial dims",
            actual: input_spatial.len(),
        });
    }

    let mut output = Vec::with_capacity(axes);
    if config.pad_sides.any() {
        if axes != 2 {
            return Err(ConvolverError::ExplicitPadRank { axes });
        }
        let sides = &config.pad_sides;
        for (axis, &input_dim) in input_spatial.iter().enumerate() {
            let (before, after) = if axis == 0 {
                (sides.top, sides.bottom)
            } else {
                (sides.left, sides.right)
            };
            output.push(floor_dim(config, axis, input_dim, before, after)?);
        }
    } else {
        for (axis, &input_dim) in input_spatial.iter().enumerate() {
            let dim = match config.pad_mode {
                PadMode::Floor => {
                    floor_dim(config, axis, input_dim, config.pad[axis], config.pad[axis])?
                }
                PadMode::Ceil => input_dim.div_ceil(config.stride[axis]),
            };
            output.push(dim);
        }
    }
    Ok(output)
}

fn floor_dim(
    config: &ConvConfig,
    axis: usize,
    input_dim: usize,
    pad_before: usize,
    pad_after: usize,
) -> Result<usize> {
    let extent = config.kernel_extent(axis);
    let padded = input_dim + pad_before + pad_after;
    if padded < extent {
        return Err(ConvolverError::EmptyOutput { axis, padded, extent });
    }
    Ok((padded - extent) / config.stride[axis] + 1)
}
