//! Patch lowering between image and column-matrix layouts.
//!
//! `im2col` unfolds every kernel-sized patch of a padded CHW image into one
//! column of a `[channels * kernel_h * kernel_w, out_h * out_w]` matrix, so
//! the convolution becomes a single dense multiply against the reshaped
//! weight matrix. `col2im` is the adjoint used by the input-gradient pass:
//! it scatters the column matrix back, accumulating where patches overlap.
//!
//! Only the leading (top/left) padding enters the index arithmetic; the
//! trailing sides are implied by the output extents the shape planner
//! produced.

use crate::trace::{TraceStep, TRACER};

/// Geometry of one 2-D lowering, shared by `im2col` and `col2im`.
#[derive(Clone, Copy, Debug)]
pub struct PatchGeometry {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub kernel_h: usize,
    pub kernel_w: usize,
    pub pad_top: usize,
    pub pad_left: usize,
    pub stride_h: usize,
    pub stride_w: usize,
    pub dilation_h: usize,
    pub dilation_w: usize,
    pub out_h: usize,
    pub out_w: usize,
}

impl PatchGeometry {
    pub fn image_len(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub fn col_len(&self) -> usize {
        self.channels * self.kernel_h * self.kernel_w * self.out_h * self.out_w
    }

    /// Input row/col for a given output position and kernel offset, or
    /// `None` when the tap lands in the padding.
    #[inline]
    fn tap(&self, out: usize, stride: usize, k: usize, dilation: usize, pad: usize, limit: usize) -> Option<usize> {
        let pos = out * stride + k * dilation;
        let idx = pos.checked_sub(pad)?;
        (idx < limit).then_some(idx)
    }
}

/// Unfold `image` (CHW) into `col` (`[C*kh*kw, out_h*out_w]`, row-major).
pub fn im2col(image: &[f32], geom: &PatchGeometry, col: &mut [f32]) {
    assert_eq!(image.len(), geom.image_len(), "image buffer size mismatch");
    assert_eq!(col.len(), geom.col_len(), "column buffer size mismatch");
    TRACER.start(TraceStep::Im2col);

    let mut col_idx = 0;
    for c in 0..geom.channels {
        let plane = &image[c * geom.height * geom.width..(c + 1) * geom.height * geom.width];
        for kh in 0..geom.kernel_h {
            for kw in 0..geom.kernel_w {
                for oh in 0..geom.out_h {
                    let row = geom.tap(oh, geom.stride_h, kh, geom.dilation_h, geom.pad_top, geom.height);
                    for ow in 0..geom.out_w {
                        let value = match (row, geom.tap(ow, geom.stride_w, kw, geom.dilation_w, geom.pad_left, geom.width)) {
                            (Some(ih), Some(iw)) => plane[ih * geom.width + iw],
                            _ => 0.0,
                        };
                        col[col_idx] = value;
                        col_idx += 1;
                    }
                }
            }
        }
    }

    TRACER.end(TraceStep::Im2col, format!("{}x{}", geom.out_h, geom.out_w));
}

/// Scatter `col` back into `image` (CHW), accumulating overlapping taps.
///
/// The image slice is zeroed first: each call produces the full gradient of
/// one sample, it does not add to previous contents.
pub fn col2im(col: &[f32], geom: &PatchGeometry, image: &mut [f32]) {
    assert_eq!(image.len(), geom.image_len(), "image buffer size mismatch");
    assert_eq!(col.len(), geom.col_len(), "column buffer size mismatch");
    TRACER.start(TraceStep::Col2im);

    image.fill(0.0);
    let mut col_idx = 0;
    for c in 0..geom.channels {
        let plane_start = c * geom.height * geom.width;
        for kh in 0..geom.kernel_h {
            for kw in 0..geom.kernel_w {
                for oh in 0..geom.out_h {
                    let row = geom.tap(oh, geom.stride_h, kh, geom.dilation_h, geom.pad_top, geom.height);
                    for ow in 0..geom.out_w {
                        if let (Some(ih), Some(iw)) = (row, geom.tap(ow, geom.stride_w, kw, geom.dilation_w, geom.pad_left, geom.width)) {
                            image[plane_start + ih * geom.width + iw] += col[col_idx];
                        }
                        col_idx += 1;
                    }
                }
            }
        }
    }

    TRACER.end(TraceStep::Col2im, format!("{}x{}", geom.out_h, geom.out_w));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom_3x3_k2() -> PatchGeometry {
        PatchGeometry {
            channels: 1,
            height: 3,
            width: 3,
            kernel_h: 2,
            kernel_w: 2,
            pad_top: 0,
            pad_left: 0,
            stride_h: 1,
            stride_w: 1,
            dilation_h: 1,
            dilation_w: 1,
            out_h: 2,
            out_w: 2,
        }
    }

    #[test]
    fn test_im2col_basic() {
        // 3x3 image:
        // 1 2 3
        // 4 5 6
        // 7 8 9
        let image: Vec<f32> = (1..=9).map(|v| v as f32).collect();
        let geom = geom_3x3_k2();
        let mut col = vec![0.0; geom.col_len()];
        im2col(&image, &geom, &mut col);

        // Rows of the column matrix follow (kh, kw); columns follow (oh, ow).
        assert_eq!(
            col,
            vec![
                1.0, 2.0, 4.0, 5.0, // tap (0,0)
                2.0, 3.0, 5.0, 6.0, // tap (0,1)
                4.0, 5.0, 7.0, 8.0, // tap (1,0)
                5.0, 6.0, 8.0, 9.0, // tap (1,1)
            ]
        );
    }

    #[test]
    fn test_im2col_padding_fills_zero() {
        // 2x2 image with 1 pixel of top/left padding, kernel 2x2, stride 1
        let image = vec![1.0, 2.0, 3.0, 4.0];
        let geom = PatchGeometry {
            channels: 1,
            height: 2,
            width: 2,
            kernel_h: 2,
            kernel_w: 2,
            pad_top: 1,
            pad_left: 1,
            stride_h: 1,
            stride_w: 1,
            dilation_h: 1,
            dilation_w: 1,
            out_h: 2,
            out_w: 2,
        };
        let mut col = vec![f32::NAN; geom.col_len()];
        im2col(&image, &geom, &mut col);

        // tap (0,0) hits the padded border for every output position except
        // the bottom-right one, which reads image[0][0].
        assert_eq!(&col[0..4], &[0.0, 0.0, 0.0, 1.0]);
        // tap (1,1) is fully inside the image
        assert_eq!(&col[12..16], &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_im2col_dilation_skips_rows() {
        // 3x1 column image, kernel 2x1 with dilation 2 reads rows 0 and 2
        let image = vec![10.0, 20.0, 30.0];
        let geom = PatchGeometry {
            channels: 1,
            height: 3,
            width: 1,
            kernel_h: 2,
            kernel_w: 1,
            pad_top: 0,
            pad_left: 0,
            stride_h: 1,
            stride_w: 1,
            dilation_h: 2,
            dilation_w: 1,
            out_h: 1,
            out_w: 1,
        };
        let mut col = vec![0.0; geom.col_len()];
        im2col(&image, &geom, &mut col);
        assert_eq!(col, vec![10.0, 30.0]);
    }

    #[test]
    fn test_col2im_counts_patch_membership() {
        // Scattering a ones-column counts how many patches cover each pixel.
        let geom = geom_3x3_k2();
        let col = vec![1.0; geom.col_len()];
        let mut image = vec![f32::NAN; geom.image_len()];
        col2im(&col, &geom, &mut image);

        // Corner pixels belong to 1 patch, edges to 2, the center to 4.
        assert_eq!(
            image,
            vec![
                1.0, 2.0, 1.0, //
                2.0, 4.0, 2.0, //
                1.0, 2.0, 1.0,
            ]
        );
    }

    #[test]
    fn test_col2im_zeroes_stale_contents() {
        let geom = geom_3x3_k2();
        let col = vec![0.0; geom.col_len()];
        let mut image = vec![9.0; geom.image_len()];
        col2im(&col, &geom, &mut image);
        assert_eq!(image, vec![0.0; 9]);
    }
}
