//! Dense tensor with a parallel gradient buffer.
//!
//! The value buffer is always allocated; the gradient buffer is allocated
//! lazily on first use and then always matches the value buffer in length.
//! Gradients accumulate until [`Tensor::clear_grad`] — the surrounding
//! training loop owns the zeroing schedule.

use ndarray::Array1;

use crate::error::{ConvolverError, Result};

/// N-dimensional dense tensor over contiguous `f32` storage.
#[derive(Clone, Debug)]
pub struct Tensor {
    data: Array1<f32>,
    grad: Option<Array1<f32>>,
    shape: Vec<usize>,
}

impl Tensor {
    /// Build a tensor from a flat value buffer and a shape.
    ///
    /// Fails if the buffer length is not the product of the shape dims.
    pub fn from_vec(values: Vec<f32>, shape: &[usize]) -> Result<Self> {
        let count: usize = shape.iter().product();
        if values.len() != count {
            return Err(ConvolverError::BufferSize {
                shape: shape.to_vec(),
                expected: count,
                actual: values.len(),
            });
        }
        Ok(Self { data: Array1::from(values), grad: None, shape: shape.to_vec() })
    }

    /// Zero-filled tensor of the given shape.
    pub fn zeros(shape: &[usize]) -> Self {
        let count: usize = shape.iter().product();
        Self { data: Array1::zeros(count), grad: None, shape: shape.to_vec() }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read-only view of the value buffer.
    pub fn values(&self) -> &[f32] {
        self.data.as_slice().expect("tensor value buffer is contiguous")
    }

    /// Mutable view of the value buffer.
    pub fn values_mut(&mut self) -> &mut [f32] {
        self.data.as_slice_mut().expect("tensor value buffer is contiguous")
    }

    /// Read-only view of the gradient buffer, if one has been allocated.
    pub fn grad(&self) -> Option<&[f32]> {
        self.grad.as_ref().map(|g| g.as_slice().expect("gradient buffer is contiguous"))
    }

    /// Mutable gradient buffer, allocating zeros on first use.
    pub fn ensure_grad(&mut self) -> &mut [f32] {
        let len = self.data.len();
        self.grad
            .get_or_insert_with(|| Array1::zeros(len))
            .as_slice_mut()
            .expect("gradient buffer is contiguous")
    }

    /// Value buffer and gradient buffer borrowed together.
    ///
    /// Backward passes read values while accumulating into the gradient of
    /// the same tensor; this splits the borrow across the two buffers.
    pub fn values_and_grad_mut(&mut self) -> (&[f32], &mut [f32]) {
        let len = self.data.len();
        let grad = self
            .grad
            .get_or_insert_with(|| Array1::zeros(len))
            .as_slice_mut()
            .expect("gradient buffer is contiguous");
        let values = self.data.as_slice().expect("tensor value buffer is contiguous");
        (values, grad)
    }

    /// Replace the gradient buffer with the given values.
    pub fn set_grad(&mut self, values: Vec<f32>) -> Result<()> {
        if values.len() != self.data.len() {
            return Err(ConvolverError::BufferSize {
                shape: self.shape.clone(),
                expected: self.data.len(),
                actual: values.len(),
            });
        }
        self.grad = Some(Array1::from(values));
        Ok(())
    }

    /// Drop the gradient buffer entirely.
    pub fn clear_grad(&mut self) {
        self.grad = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_checks_count() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.len(), 6);

        let err = Tensor::from_vec(vec![1.0, 2.0], &[2, 3]);
        assert!(matches!(err, Err(ConvolverError::BufferSize { expected: 6, actual: 2, .. })));
    }

    #[test]
    fn test_grad_lazy_allocation() {
        let mut t = Tensor::zeros(&[4]);
        assert!(t.grad().is_none());

        t.ensure_grad()[1] = 3.0;
        assert_eq!(t.grad().unwrap(), &[0.0, 3.0, 0.0, 0.0]);
    }

    #[test]
    fn test_values_and_grad_split_borrow() {
        let mut t = Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap();
        let (values, grad) = t.values_and_grad_mut();
        grad[0] = values[1];
        assert_eq!(t.grad().unwrap(), &[2.0, 0.0]);
    }

    #[test]
    fn test_set_grad_checks_length() {
        let mut t = Tensor::zeros(&[3]);
        assert!(t.set_grad(vec![1.0, 2.0]).is_err());
        t.set_grad(vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(t.grad().unwrap(), &[1.0, 2.0, 3.0]);

        t.clear_grad();
        assert!(t.grad().is_none());
    }
}
