//! Saturation clamps emulating fixed-width integer overflow.

use super::config::SaturateMode;

/// Clamp every element to the range of the given mode.
///
/// [`SaturateMode::None`] leaves the buffer untouched.
pub fn saturate(data: &mut [f32], mode: SaturateMode) {
    let Some((lo, hi)) = mode.bounds() else {
        return;
    };
    for v in data.iter_mut() {
        *v = v.clamp(lo, hi);
    }
}
