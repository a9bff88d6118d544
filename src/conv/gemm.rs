//! Dense matrix primitives backing the convolution.
//!
//! All buffers are contiguous row-major `f32`. The multiplies go through
//! `ndarray` 2-D views so the matrixmultiply kernels do the heavy lifting;
//! transposed operands stay as views, nothing is materialized.

use ndarray::ArrayView2;

use crate::trace::{TraceStep, TRACER};

/// `C = A @ B` where A is `m×k` and B is `k×n`.
pub fn gemm(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    assert_eq!(a.len(), m * k, "matrix A size mismatch");
    assert_eq!(b.len(), k * n, "matrix B size mismatch");
    TRACER.start(TraceStep::Gemm);

    let lhs = ArrayView2::from_shape((m, k), a).expect("matrix A must be contiguous");
    let rhs = ArrayView2::from_shape((k, n), b).expect("matrix B must be contiguous");
    let out = lhs.dot(&rhs);

    TRACER.end(TraceStep::Gemm, format!("{m}x{k}x{n}"));
    out.into_iter().collect()
}

/// `C = A^T @ B` where A is `m×k` and B is `m×n`; the result is `k×n`.
///
/// Used for the input gradient: `col_grad = W^T @ top_grad`.
pub fn gemm_tn(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    assert_eq!(a.len(), m * k, "matrix A size mismatch");
    assert_eq!(b.len(), m * n, "matrix B size mismatch");
    TRACER.start(TraceStep::Gemm);

    let lhs = ArrayView2::from_shape((m, k), a).expect("matrix A must be contiguous");
    let rhs = ArrayView2::from_shape((m, n), b).expect("matrix B must be contiguous");
    let out = lhs.t().dot(&rhs);

    TRACER.end(TraceStep::Gemm, format!("{k}x{m}x{n}"));
    out.into_iter().collect()
}

/// `C += A @ B^T` where A is `m×n` and B is `k×n`; C is `m×k`.
///
/// Used for the weight gradient: `weight_grad += top_grad @ col^T`,
/// accumulating across samples and calls.
pub fn gemm_nt_acc(a: &[f32], b: &[f32], c: &mut [f32], m: usize, n: usize, k: usize) {
    assert_eq!(a.len(), m * n, "matrix A size mismatch");
    assert_eq!(b.len(), k * n, "matrix B size mismatch");
    assert_eq!(c.len(), m * k, "matrix C size mismatch");
    TRACER.start(TraceStep::Gemm);

    let lhs = ArrayView2::from_shape((m, n), a).expect("matrix A must be contiguous");
    let rhs = ArrayView2::from_shape((k, n), b).expect("matrix B must be contiguous");
    let prod = lhs.dot(&rhs.t());
    for (dst, src) in c.iter_mut().zip(prod.iter()) {
        *dst += src;
    }

    TRACER.end(TraceStep::Gemm, format!("{m}x{n}x{k}"));
}

/// Broadcast-add one bias value per output channel over its spatial positions.
pub fn add_bias(top: &mut [f32], bias: &[f32], channels: usize, spatial: usize) {
    assert_eq!(top.len(), channels * spatial, "output buffer size mismatch");
    for (chunk, &b) in top.chunks_mut(spatial).zip(bias.iter()) {
        for v in chunk.iter_mut() {
            *v += b;
        }
    }
}

/// Accumulate the bias gradient: per channel, the sum of the top gradient
/// over spatial positions.
pub fn bias_grad_acc(bias_grad: &mut [f32], top_grad: &[f32], channels: usize, spatial: usize) {
    assert_eq!(top_grad.len(), channels * spatial, "gradient buffer size mismatch");
    for (g, chunk) in bias_grad.iter_mut().zip(top_grad.chunks(spatial)) {
        *g += chunk.iter().sum::<f32>();
    }
}
