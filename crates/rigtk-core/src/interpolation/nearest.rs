//! Nearest neighbor interpolation.

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;
use crate::error::{CoreError, Result};
use super::trait_::Interpolator;

/// Rounds each continuous index to the nearest voxel.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighborInterpolator;

impl NearestNeighborInterpolator {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> Interpolator<B> for NearestNeighborInterpolator {
    fn interpolate<const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Result<Tensor<B, 1>> {
        if D != 2 && D != 3 {
            return Err(CoreError::unsupported_dimension(format!(
                "nearest neighbor interpolation supports 2D and 3D images, got {D}D"
            )));
        }
        let dims = data.dims();
        let total: usize = dims.iter().product();

        // Column k of `indices` addresses tensor dimension D - 1 - k.
        let mut stride = 1i32;
        let mut flat_index = None;
        for k in 0..D {
            let extent = dims[D - 1 - k];
            let column = indices.clone().narrow(1, k, 1).squeeze_dim::<1>(1);
            let rounded = column.round().clamp(0.0, (extent - 1) as f64).int() * stride;
            flat_index = Some(match flat_index {
                None => rounded,
                Some(acc) => acc + rounded,
            });
            stride *= extent as i32;
        }

        let flat_data = data.clone().reshape([total]);
        match flat_index {
            Some(idx) => Ok(flat_data.gather(0, idx)),
            None => Err(CoreError::unsupported_dimension("empty index tensor")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::{Shape, TensorData};
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_nearest_neighbor_rounding_2d() {
        let device = Default::default();
        // [Y=2, X=3]
        let data = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![0.0f32, 1.0, 2.0, 10.0, 11.0, 12.0], Shape::new([2, 3])),
            &device,
        );
        let indices = Tensor::<TestBackend, 2>::from_floats([[0.4, 0.6], [1.6, 0.2], [9.0, 9.0]], &device);
        let result = NearestNeighborInterpolator::new().interpolate(&data, indices).unwrap();
        let values = result.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![10.0, 2.0, 12.0]);
    }

    #[test]
    fn test_nearest_neighbor_3d() {
        let device = Default::default();
        let data = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(vec![0.0f32, 1.0, 10.0, 11.0, 100.0, 101.0, 110.0, 111.0], Shape::new([2, 2, 2])),
            &device,
        );
        let indices = Tensor::<TestBackend, 2>::from_floats([[0.9, 0.1, 0.7]], &device);
        let result = NearestNeighborInterpolator::new().interpolate(&data, indices).unwrap();
        assert_eq!(result.into_data().to_vec::<f32>().unwrap(), vec![101.0]);
    }
}
