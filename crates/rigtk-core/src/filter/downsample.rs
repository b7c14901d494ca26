use burn::tensor::{Int, Tensor};
use burn::tensor::backend::Backend;
use crate::error::Result;
use crate::image::Image;

/// Downsample filter.
///
/// Keeps every Nth voxel along each axis and scales the spacing by N. The
/// first voxel keeps its physical position, so the origin is unchanged.
/// Factors are given in index-axis order `(x, y[, z])`.
#[derive(Debug, Clone)]
pub struct DownsampleFilter<B: Backend> {
    factors: Vec<usize>,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> DownsampleFilter<B> {
    pub fn new(factors: Vec<usize>) -> Self {
        Self {
            factors,
            _b: std::marker::PhantomData,
        }
    }

    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Result<Image<B, D>> {
        let mut data = image.data().clone();
        let device = data.device();
        let dims: [usize; D] = data.dims();
        let mut new_spacing = *image.spacing();

        for axis in 0..D {
            let factor = self
                .factors
                .get(axis)
                .or_else(|| self.factors.first())
                .copied()
                .unwrap_or(1);
            if factor <= 1 {
                continue;
            }
            let tensor_dim = D - 1 - axis;
            let kept: Vec<i32> = (0..dims[tensor_dim]).step_by(factor).map(|x| x as i32).collect();
            let indices = Tensor::<B, 1, Int>::from_ints(kept.as_slice(), &device);
            data = data.select(tensor_dim, indices);
            new_spacing[axis] *= factor as f64;
        }

        let metadata = image.metadata().with_spacing(new_spacing)?;
        Ok(Image::from_metadata(data, metadata))
    }
}
