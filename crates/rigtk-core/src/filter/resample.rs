//! Resampling of images through an affine map.
//!
//! [`ResampleImageFilter`] produces a new image on a reference grid, and
//! [`sample_physical_points`] evaluates an image at arbitrary physical points
//! while reporting which of them fall inside the voxel buffer.

use std::marker::PhantomData;
use burn::tensor::{Shape, Tensor};
use burn::tensor::backend::Backend;
use crate::error::Result;
use crate::image::{generate_grid, tensor_values, Image, ImageMetadata};
use crate::interpolation::InterpolatorKind;
use crate::transform::{AffineMap, Transform};

const BUFFER_TOLERANCE: f64 = 1e-3;

/// Values sampled at a batch of points.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledValues {
    pub values: Vec<f64>,
    /// Whether each point mapped inside the voxel buffer.
    pub inside: Vec<bool>,
}

impl SampledValues {
    pub fn inside_count(&self) -> usize {
        self.inside.iter().filter(|&&i| i).count()
    }
}

/// Sample `image` at `[N, D]` physical points.
pub fn sample_physical_points<B: Backend, const D: usize>(
    image: &Image<B, D>,
    points: Tensor<B, 2>,
    interpolator: InterpolatorKind,
) -> Result<SampledValues> {
    let indices = image.physical_to_index_tensor(points);
    let mask = inside_mask(&indices, image.size());
    let values = tensor_values(interpolator.interpolate(image.data(), indices)?)?;
    let inside = tensor_values(mask)?.into_iter().map(|v| v > 0.5).collect();
    Ok(SampledValues { values, inside })
}

/// 1.0 where every column of a `[N, D]` index tensor lies within `[0, size - 1]`.
fn inside_mask<B: Backend, const D: usize>(indices: &Tensor<B, 2>, size: [usize; D]) -> Tensor<B, 1> {
    let mut mask: Option<Tensor<B, 1>> = None;
    for (axis, &extent) in size.iter().enumerate() {
        let column = indices.clone().narrow(1, axis, 1).squeeze_dim::<1>(1);
        let upper = extent as f64 - 1.0 + BUFFER_TOLERANCE;
        let lower_ok = column.clone().greater_equal_elem(-BUFFER_TOLERANCE).float();
        let upper_ok = column.lower_equal_elem(upper).float();
        let axis_ok = lower_ok * upper_ok;
        mask = Some(match mask {
            None => axis_ok,
            Some(acc) => acc * axis_ok,
        });
    }
    mask.unwrap_or_else(|| Tensor::ones([indices.dims()[0]], &indices.device()))
}

/// Resamples an input image onto a reference grid.
///
/// The transform maps output physical points to input physical points, so
/// resampling a moving image onto the fixed grid uses the fixed-to-moving
/// registration map directly.
#[derive(Debug, Clone)]
pub struct ResampleImageFilter<B: Backend, const D: usize> {
    shape: [usize; D],
    metadata: ImageMetadata<D>,
    transform: AffineMap<D>,
    interpolator: InterpolatorKind,
    default_pixel_value: f64,
    _b: PhantomData<B>,
}

impl<B: Backend, const D: usize> ResampleImageFilter<B, D> {
    /// `shape` is in tensor order (`[Z, Y, X]` / `[Y, X]`).
    pub fn new(
        shape: [usize; D],
        metadata: ImageMetadata<D>,
        transform: AffineMap<D>,
        interpolator: InterpolatorKind,
    ) -> Self {
        Self {
            shape,
            metadata,
            transform,
            interpolator,
            default_pixel_value: 0.0,
            _b: PhantomData,
        }
    }

    pub fn new_from_reference(reference: &Image<B, D>, transform: AffineMap<D>, interpolator: InterpolatorKind) -> Self {
        Self::new(reference.shape(), reference.metadata().clone(), transform, interpolator)
    }

    /// Value assigned to output voxels that map outside the input.
    pub fn with_default_pixel_value(mut self, value: f64) -> Self {
        self.default_pixel_value = value;
        self
    }

    pub fn apply(&self, input: &Image<B, D>) -> Result<Image<B, D>> {
        let device = input.data().device();
        let grid = generate_grid::<B, D>(self.shape, &device);
        let template = Image::<B, D>::from_metadata(Tensor::zeros(self.shape, &device), self.metadata.clone());
        let output_points = template.index_to_physical_tensor(grid);
        let input_points = self.transform.transform_points(output_points);

        let indices = input.physical_to_index_tensor(input_points);
        let mask = inside_mask(&indices, input.size());
        let values = self.interpolator.interpolate(input.data(), indices)?;
        let outside = mask.clone().neg() + 1.0;
        let blended = values * mask + outside * self.default_pixel_value;

        Ok(template.with_data(blended.reshape(Shape::new(self.shape))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use nalgebra::Vector2;

    type TestBackend = NdArray<f32>;

    fn square_image() -> Image<TestBackend, 2> {
        let device = Default::default();
        let mut data = vec![0.0f32; 100];
        for (x, y) in [(4, 4), (5, 4), (4, 5), (5, 5)] {
            data[y * 10 + x] = 1.0;
        }
        Image::from_values(data, [10, 10], ImageMetadata::default(), &device).unwrap()
    }

    #[test]
    fn test_resample_translation_2d() {
        let image = square_image();
        // Output point p samples the input at p - (2, 1): the square moves by (+2, +1).
        let transform = AffineMap::<2>::translation(Vector2::new(-2.0, -1.0));
        let result = ResampleImageFilter::new_from_reference(&image, transform, InterpolatorKind::Linear)
            .with_default_pixel_value(-1.0)
            .apply(&image)
            .unwrap();
        let values = result.to_values().unwrap();

        assert!(values[5 * 10 + 6] > 0.9);
        assert!(values[5 * 10 + 7] > 0.9);
        assert!(values[6 * 10 + 6] > 0.9);
        assert!(values[6 * 10 + 7] > 0.9);
        assert!(values[4 * 10 + 4] < 0.1);
        // x = 0 maps to x = -2, outside the input.
        assert_eq!(values[0], -1.0);
    }

    #[test]
    fn test_sample_reports_outside_points() {
        let device = Default::default();
        let image = square_image();
        let points = Tensor::<TestBackend, 2>::from_floats([[4.5, 4.5], [-3.0, 2.0], [9.0, 9.0]], &device);
        let sampled = sample_physical_points(&image, points, InterpolatorKind::Linear).unwrap();
        assert_eq!(sampled.inside, vec![true, false, true]);
        assert!((sampled.values[0] - 1.0).abs() < 1e-6);
        assert_eq!(sampled.inside_count(), 2);
    }
}
