//! Linear interpolation (bilinear in 2D, trilinear in 3D).

use burn::tensor::{Int, Tensor};
use burn::tensor::backend::Backend;
use crate::error::{CoreError, Result};
use super::trait_::Interpolator;

/// Blends the `2^D` voxels surrounding each continuous index.
///
/// Neighbours are clamped to the buffer, so indices past the border take the
/// border value.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearInterpolator;

impl LinearInterpolator {
    pub fn new() -> Self {
        Self
    }
}

/// Per-axis floor/ceil neighbours, fractional weight and flat stride.
struct Axis<B: Backend> {
    lower: Tensor<B, 1, Int>,
    upper: Tensor<B, 1, Int>,
    weight: Tensor<B, 1>,
    stride: i32,
}

impl<B: Backend> Interpolator<B> for LinearInterpolator {
    fn interpolate<const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Result<Tensor<B, 1>> {
        if D != 2 && D != 3 {
            return Err(CoreError::unsupported_dimension(format!(
                "linear interpolation supports 2D and 3D images, got {D}D"
            )));
        }
        let dims = data.dims();
        let n = indices.dims()[0];
        let device = indices.device();

        // Column k of `indices` addresses tensor dimension D - 1 - k.
        let mut stride = 1i32;
        let axes: Vec<Axis<B>> = (0..D)
            .map(|k| {
                let last = (dims[D - 1 - k] - 1) as f64;
                let column = indices.clone().narrow(1, k, 1).squeeze_dim::<1>(1);
                let floor = column.clone().floor();
                let axis = Axis {
                    lower: floor.clone().clamp(0.0, last).int(),
                    upper: (floor.clone() + 1.0).clamp(0.0, last).int(),
                    weight: column - floor,
                    stride,
                };
                stride *= dims[D - 1 - k] as i32;
                axis
            })
            .collect();

        let flat_data = data.clone().reshape([dims.iter().product::<usize>()]);
        let ones = Tensor::<B, 1>::ones([n], &device);
        let mut blended = Tensor::<B, 1>::zeros([n], &device);
        for corner in 0..(1usize << D) {
            let mut flat_index = Tensor::<B, 1, Int>::zeros([n], &device);
            let mut weight = ones.clone();
            for (k, axis) in axes.iter().enumerate() {
                if corner >> k & 1 == 1 {
                    flat_index = flat_index + axis.upper.clone() * axis.stride;
                    weight = weight * axis.weight.clone();
                } else {
                    flat_index = flat_index + axis.lower.clone() * axis.stride;
                    weight = weight * (ones.clone() - axis.weight.clone());
                }
            }
            blended = blended + flat_data.clone().gather(0, flat_index) * weight;
        }
        Ok(blended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::{Shape, TensorData};
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn values(t: Tensor<TestBackend, 1>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_linear_interpolator_3d_axes() {
        let device = Default::default();
        // [Z=2, Y=2, X=2]: value = 100 z + 10 y + x
        let data_vec = vec![0.0f32, 1.0, 10.0, 11.0, 100.0, 101.0, 110.0, 111.0];
        let data = Tensor::<TestBackend, 3>::from_data(TensorData::new(data_vec, Shape::new([2, 2, 2])), &device);
        let interpolator = LinearInterpolator::new();

        let indices = Tensor::<TestBackend, 2>::from_floats(
            [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.5, 0.5, 0.5]],
            &device,
        );
        let result = values(interpolator.interpolate(&data, indices).unwrap());

        assert_eq!(result[0], 0.0);
        assert_eq!(result[1], 1.0);
        assert_eq!(result[2], 10.0);
        assert_eq!(result[3], 100.0);
        assert!((result[4] - 55.5).abs() < 1e-4);
    }

    #[test]
    fn test_linear_interpolator_2d() {
        let device = Default::default();
        let data = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![0.0f32, 1.0, 10.0, 11.0], Shape::new([2, 2])),
            &device,
        );
        let interpolator = LinearInterpolator::new();

        let indices = Tensor::<TestBackend, 2>::from_floats([[0.5, 0.5], [0.25, 0.0], [1.0, 1.0]], &device);
        let result = values(interpolator.interpolate(&data, indices).unwrap());

        assert!((result[0] - 5.5).abs() < 1e-5);
        assert!((result[1] - 0.25).abs() < 1e-5);
        assert_eq!(result[2], 11.0);
    }

    #[test]
    fn test_linear_interpolator_clamps_out_of_bounds() {
        let device = Default::default();
        let data = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![0.0f32, 1.0, 2.0, 3.0], Shape::new([2, 2])),
            &device,
        );
        let indices = Tensor::<TestBackend, 2>::from_floats([[5.0, 5.0], [-3.0, 0.0]], &device);
        let result = values(LinearInterpolator::new().interpolate(&data, indices).unwrap());
        assert_eq!(result[0], 3.0);
        assert_eq!(result[1], 0.0);
    }

    #[test]
    fn test_linear_interpolator_rejects_1d() {
        let device = Default::default();
        let data = Tensor::<TestBackend, 1>::zeros([4], &device);
        let indices = Tensor::<TestBackend, 2>::zeros([1, 1], &device);
        assert!(LinearInterpolator::new().interpolate(&data, indices).is_err());
    }
}
