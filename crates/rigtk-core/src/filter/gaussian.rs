use burn::tensor::{Tensor, Shape};
use burn::tensor::backend::Backend;
use burn::tensor::ops::ConvOptions;
use crate::image::Image;
use crate::spatial::Spacing;

/// Gaussian smoothing filter.
///
/// Applies separable 1D convolutions along each axis. Sigmas are given in
/// physical units and in index-axis order `(x, y[, z])`, so the kernel width
/// in voxels follows the image spacing of that axis.
#[derive(Debug, Clone)]
pub struct GaussianFilter<B: Backend> {
    sigmas: Vec<f64>,
    max_kernel_width: usize,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> GaussianFilter<B> {
    /// Create a new Gaussian filter with the given standard deviations (physical units).
    ///
    /// A single sigma is used for every axis.
    pub fn new(sigmas: Vec<f64>) -> Self {
        Self {
            sigmas,
            max_kernel_width: 33,
            _b: std::marker::PhantomData,
        }
    }

    /// Set the maximum kernel width (radius * 2 + 1).
    pub fn with_max_kernel_width(mut self, width: usize) -> Self {
        self.max_kernel_width = width.max(1);
        self
    }

    /// Apply the filter to an image. Metadata is carried over unchanged.
    pub fn apply<const D: usize>(&self, image: &Image<B, D>) -> Image<B, D> {
        let data = self.apply_tensor(image.data().clone(), image.spacing());
        image.with_data(data)
    }

    /// Apply the filter to a tensor laid out `[Z, Y, X]` / `[Y, X]`.
    pub fn apply_tensor<const D: usize>(&self, input: Tensor<B, D>, spacing: &Spacing<D>) -> Tensor<B, D> {
        let mut data = input;
        let device = data.device();

        for axis in 0..D {
            let sigma = self.sigma(axis);
            if sigma <= 1e-6 {
                continue;
            }
            let tensor_dim = D - 1 - axis;
            let extent = data.dims()[tensor_dim];
            if extent < 2 {
                continue;
            }

            let pixel_sigma = sigma / spacing[axis];
            let radius = (3.0 * pixel_sigma).ceil() as usize;
            let width = (2 * radius + 1).min(self.max_kernel_width);
            let actual_radius = (width - 1) / 2;
            if actual_radius == 0 {
                continue;
            }

            let kernel = generate_kernel(pixel_sigma, actual_radius);
            let kernel_tensor = Tensor::<B, 1>::from_floats(kernel.as_slice(), &device);
            data = convolve_1d::<B, D>(data, kernel_tensor, tensor_dim);
        }
        data
    }

    fn sigma(&self, axis: usize) -> f64 {
        self.sigmas
            .get(axis)
            .or_else(|| self.sigmas.first())
            .copied()
            .unwrap_or(0.0)
    }
}

fn generate_kernel(sigma: f64, radius: usize) -> Vec<f32> {
    let two_sigma2 = 2.0 * sigma * sigma;
    let raw: Vec<f64> = (0..=(2 * radius))
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_sigma2).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|v| (v / sum) as f32).collect()
}

/// Convolve along one tensor dimension with zero-flux borders.
///
/// The target dimension is moved last, the others are flattened into the
/// batch, and the row is padded by edge replication before `conv1d`.
fn convolve_1d<B: Backend, const D: usize>(input: Tensor<B, D>, kernel: Tensor<B, 1>, dim: usize) -> Tensor<B, D> {
    let dims: [usize; D] = input.dims();

    let mut permute_indices = [0isize; D];
    let mut idx = 0;
    for i in 0..D {
        if i != dim {
            permute_indices[idx] = i as isize;
            idx += 1;
        }
    }
    permute_indices[D - 1] = dim as isize;

    let length = dims[dim];
    let batch_size: usize = (0..D).filter(|&i| i != dim).map(|i| dims[i]).product();
    let rows = input.permute(permute_indices).reshape([batch_size, 1, length]);

    let kernel_size = kernel.dims()[0];
    let radius = kernel_size / 2;

    // Replicate the edge samples so constant images stay constant.
    let first = rows.clone().narrow(2, 0, 1);
    let last = rows.clone().narrow(2, length - 1, 1);
    let mut parts = Vec::with_capacity(2 * radius + 1);
    for _ in 0..radius {
        parts.push(first.clone());
    }
    parts.push(rows);
    for _ in 0..radius {
        parts.push(last.clone());
    }
    let padded = Tensor::cat(parts, 2);

    let options = ConvOptions::new([1], [0], [1], 1);
    let output = burn::tensor::module::conv1d(padded, kernel.reshape([1, 1, kernel_size]), None, options);

    let mut permuted_shape = [0usize; D];
    for (new_pos, &old_pos) in permute_indices.iter().enumerate() {
        permuted_shape[new_pos] = dims[old_pos as usize];
    }
    let output_permuted = output.reshape(Shape::new(permuted_shape));

    let mut inverse = [0isize; D];
    for (new_pos, &old_pos) in permute_indices.iter().enumerate() {
        inverse[old_pos as usize] = new_pos as isize;
    }
    output_permuted.permute(inverse)
}
