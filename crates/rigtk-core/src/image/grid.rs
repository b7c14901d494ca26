use burn::tensor::{Tensor, TensorData, Shape};
use burn::tensor::backend::Backend;

/// Continuous index (x fastest) of every voxel of a tensor shape.
///
/// `shape` is in tensor order (`[Z, Y, X]` or `[Y, X]`); each returned row is
/// `(x, y[, z])`, matching the column order used by the interpolators.
pub fn grid_indices<const D: usize>(shape: [usize; D]) -> Vec<[usize; D]> {
    let total: usize = shape.iter().product();
    (0..total).map(|flat| unravel_index(flat, shape)).collect()
}

/// Convert a flat voxel offset into an `(x, y[, z])` index.
pub fn unravel_index<const D: usize>(flat: usize, shape: [usize; D]) -> [usize; D] {
    let mut rem = flat;
    let mut index = [0usize; D];
    for (axis, slot) in index.iter_mut().enumerate() {
        let extent = shape[D - 1 - axis].max(1);
        *slot = rem % extent;
        rem /= extent;
    }
    index
}

/// Build a `[N, D]` tensor from a list of indices.
pub fn indices_to_tensor<B: Backend, const D: usize>(
    indices: &[[usize; D]],
    device: &B::Device,
) -> Tensor<B, 2> {
    let n = indices.len();
    let flat: Vec<f32> = indices
        .iter()
        .flat_map(|index| index.iter().map(|&i| i as f32))
        .collect();
    Tensor::<B, 1>::from_data(TensorData::new(flat, Shape::new([n * D])), device).reshape([n, D])
}

/// Generate a `[N, D]` tensor with the continuous index of every voxel.
pub fn generate_grid<B: Backend, const D: usize>(
    shape: [usize; D],
    device: &B::Device,
) -> Tensor<B, 2> {
    indices_to_tensor::<B, D>(&grid_indices(shape), device)
}
