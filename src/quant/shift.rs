//! Scoped zero-point shifts with guaranteed restore.
//!
//! Quantized storage is shifted by `-zero_point` for the duration of the
//! compute and must hold its original values again afterwards — the same
//! buffers are read on the next forward call and are the target of gradient
//! updates. [`ShiftGuard`] applies the shift on construction and applies the
//! inverse in `Drop`, so the restore happens on every exit path, including
//! early `?` returns.

use std::ops::Deref;

use super::config::ChannelQuant;

enum Offsets {
    Noop,
    Uniform(f32),
    /// One offset per output channel, applied to contiguous channel slices
    /// of size `len / offsets.len()`.
    PerChannel(Vec<f32>),
}

/// A parameter buffer shifted by its zero-point(s) for one compute scope.
pub struct ShiftGuard<'a> {
    data: &'a mut [f32],
    offsets: Offsets,
}

impl<'a> ShiftGuard<'a> {
    /// Borrow the buffer without shifting it.
    pub fn noop(data: &'a mut [f32]) -> Self {
        Self { data, offsets: Offsets::Noop }
    }

    /// Shift every element by `-zero_point`.
    pub fn uniform(data: &'a mut [f32], zero_point: f32) -> Self {
        let offsets =
            if zero_point == 0.0 { Offsets::Noop } else { Offsets::Uniform(zero_point) };
        let mut guard = Self { data, offsets };
        guard.apply(-1.0);
        guard
    }

    /// Shift each contiguous channel slice by `-zero_points[channel]`.
    ///
    /// The buffer is split into `channels` equal slices; `zero_points` must
    /// hold at least `channels` entries (validated at layer construction).
    pub fn per_channel(data: &'a mut [f32], zero_points: &[f32], channels: usize) -> Self {
        let offsets = Offsets::PerChannel(zero_points[..channels].to_vec());
        let mut guard = Self { data, offsets };
        guard.apply(-1.0);
        guard
    }

    /// Shift a weight or bias buffer according to its quantization setup.
    ///
    /// The uniform zero-point takes priority: when it is nonzero the whole
    /// buffer shifts by it even if per-channel arrays are configured.
    pub fn for_param(
        data: &'a mut [f32],
        zero_point: i32,
        per_channel: Option<&ChannelQuant>,
        channels: usize,
    ) -> Self {
        if zero_point != 0 {
            Self::uniform(data, zero_point as f32)
        } else if let Some(cq) = per_channel {
            Self::per_channel(data, &cq.zero_points, channels)
        } else {
            Self::noop(data)
        }
    }

    fn apply(&mut self, sign: f32) {
        match &self.offsets {
            Offsets::Noop => {}
            Offsets::Uniform(zp) => {
                let delta = sign * zp;
                for v in self.data.iter_mut() {
                    *v += delta;
                }
            }
            Offsets::PerChannel(zps) => {
                let slice = self.data.len() / zps.len();
                for (chunk, zp) in self.data.chunks_mut(slice).zip(zps.iter()) {
                    let delta = sign * zp;
                    for v in chunk.iter_mut() {
                        *v += delta;
                    }
                }
            }
        }
    }
}

impl Deref for ShiftGuard<'_> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        self.data
    }
}

impl Drop for ShiftGuard<'_> {
    fn drop(&mut self) {
        self.apply(1.0);
    }
}
