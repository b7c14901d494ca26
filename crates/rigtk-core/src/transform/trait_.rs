//! Transform trait for mapping batches of points.

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

/// Maps points from one physical space to another.
///
/// # Type Parameters
/// * `B` - The Burn backend
/// * `D` - The spatial dimensionality (2 or 3)
pub trait Transform<B: Backend, const D: usize> {
    /// Apply the transform to a `[Batch, D]` tensor of points.
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2>;

    /// The inverse transform, when it exists.
    fn inverse(&self) -> Option<Box<dyn Transform<B, D>>> {
        None
    }
}
