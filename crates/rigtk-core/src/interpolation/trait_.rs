//! Interpolator trait for sampling values at continuous indices.

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;
use crate::error::Result;

/// Samples image values at non-integer indices.
///
/// Indices outside the buffer are clamped to the border; callers that need
/// to exclude such samples test [`crate::Image::is_inside_buffer`] first.
pub trait Interpolator<B: Backend> {
    /// Interpolate `data` (`[Z, Y, X]` or `[Y, X]`) at `indices` (`[N, D]`,
    /// columns in x, y, z order). Returns `[N]` values.
    fn interpolate<const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Result<Tensor<B, 1>>;
}
