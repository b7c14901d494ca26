//! Image type with physical metadata and coordinate transformations.
//!
//! An [`Image`] pairs a burn tensor with the metadata that places its voxels
//! in a physical frame. Registration reads images, it never mutates them.

use burn::tensor::{Tensor, TensorData, Shape};
use burn::tensor::backend::Backend;
use crate::error::{CoreError, Result};
use crate::spatial::{Direction, Point, Spacing};
use super::metadata::ImageMetadata;

/// Scalar image with physical metadata.
///
/// # Type Parameters
/// * `B` - The backend for tensor operations
/// * `D` - The dimensionality of the image (2 or 3)
///
/// # Coordinate Systems
/// * **Index space**: voxel indices in `(x, y[, z])` order. The tensor itself
///   is laid out `[Z, Y, X]` (or `[Y, X]`), so index column `i` addresses
///   tensor dimension `D - 1 - i`.
/// * **Physical space**: `origin + Direction * (index ⊙ spacing)`.
///
/// # Examples
/// ```rust
/// use rigtk_core::Image;
/// use rigtk_core::spatial::{Point3, Spacing3, Direction3};
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
///
/// type Backend = NdArray<f32>;
///
/// let device = Default::default();
/// let data = Tensor::<Backend, 3>::zeros([10, 10, 10], &device);
/// let image = Image::new(
///     data,
///     Point3::new([0.0, 0.0, 0.0]),
///     Spacing3::new([1.0, 1.0, 1.0]),
///     Direction3::identity(),
/// )
/// .unwrap();
/// assert_eq!(image.size(), [10, 10, 10]);
/// ```
#[derive(Debug, Clone)]
pub struct Image<B: Backend, const D: usize> {
    data: Tensor<B, D>,
    metadata: ImageMetadata<D>,
}

impl<B: Backend, const D: usize> Image<B, D> {
    /// Create a new image, validating the metadata.
    pub fn new(
        data: Tensor<B, D>,
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
    ) -> Result<Self> {
        Ok(Self::from_metadata(data, ImageMetadata::new(origin, spacing, direction)?))
    }

    pub fn from_metadata(data: Tensor<B, D>, metadata: ImageMetadata<D>) -> Self {
        Self { data, metadata }
    }

    /// Create an image from voxel values in tensor order (x fastest).
    pub fn from_values(
        values: Vec<f32>,
        shape: [usize; D],
        metadata: ImageMetadata<D>,
        device: &B::Device,
    ) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if values.len() != expected {
            return Err(CoreError::invalid_metadata(format!(
                "{} values do not fill shape {:?}",
                values.len(),
                shape
            )));
        }
        let data = Tensor::<B, D>::from_data(TensorData::new(values, Shape::new(shape)), device);
        Ok(Self::from_metadata(data, metadata))
    }

    /// A new image sharing this image's metadata.
    pub fn with_data(&self, data: Tensor<B, D>) -> Self {
        Self::from_metadata(data, self.metadata.clone())
    }

    pub fn data(&self) -> &Tensor<B, D> {
        &self.data
    }

    pub fn metadata(&self) -> &ImageMetadata<D> {
        &self.metadata
    }

    pub fn origin(&self) -> &Point<D> {
        self.metadata.origin()
    }

    pub fn spacing(&self) -> &Spacing<D> {
        self.metadata.spacing()
    }

    pub fn direction(&self) -> &Direction<D> {
        self.metadata.direction()
    }

    /// Tensor shape (`[Z, Y, X]` / `[Y, X]`).
    pub fn shape(&self) -> [usize; D] {
        self.data.dims()
    }

    /// Number of voxels along each index axis, in `(x, y[, z])` order.
    pub fn size(&self) -> [usize; D] {
        let shape = self.shape();
        let mut size = [0usize; D];
        for (axis, extent) in size.iter_mut().enumerate() {
            *extent = shape[D - 1 - axis];
        }
        size
    }

    pub fn num_voxels(&self) -> usize {
        self.shape().iter().product()
    }

    /// Convert a physical point to a continuous index.
    pub fn transform_physical_point_to_continuous_index(&self, point: &Point<D>) -> Point<D> {
        self.metadata.physical_to_index(point)
    }

    /// Convert a continuous index to a physical point.
    pub fn transform_continuous_index_to_physical_point(&self, index: &Point<D>) -> Point<D> {
        self.metadata.index_to_physical(index)
    }

    /// Physical position of the center of the voxel grid.
    pub fn physical_center(&self) -> Point<D> {
        let size = self.size();
        let mut index = Point::<D>::origin();
        for i in 0..D {
            index[i] = (size[i] as f64 - 1.0) / 2.0;
        }
        self.metadata.index_to_physical(&index)
    }

    /// Whether a continuous index lies inside the voxel buffer.
    pub fn is_inside_buffer(&self, index: &[f64]) -> bool {
        let size = self.size();
        index
            .iter()
            .zip(size.iter())
            .all(|(&i, &extent)| i >= -1e-6 && i <= extent as f64 - 1.0 + 1e-6)
    }

    /// Read the voxel values back to the host, in tensor order.
    pub fn to_values(&self) -> Result<Vec<f64>> {
        tensor_values(self.data.clone())
    }

    /// Batch transform physical points `[N, D]` to continuous indices `[N, D]`.
    ///
    /// Computes `I = (P - O) @ T` with `T[r, c] = (Dir^-1)[c, r] / S[c]`.
    pub fn physical_to_index_tensor(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();
        let origin = self.origin_tensor(&device);
        let inv_dir = self.metadata.inverse_direction();
        let spacing = self.spacing();

        let mut t_data = Vec::with_capacity(D * D);
        for r in 0..D {
            for c in 0..D {
                t_data.push((inv_dir[(c, r)] / spacing[c]) as f32);
            }
        }
        let t_tensor = Tensor::<B, 2>::from_data(TensorData::new(t_data, Shape::new([D, D])), &device);

        (points - origin).matmul(t_tensor)
    }

    /// Batch transform continuous indices `[N, D]` to physical points `[N, D]`.
    ///
    /// Computes `P = O + I @ M` with `M[r, c] = S[r] * Dir[c, r]`.
    pub fn index_to_physical_tensor(&self, indices: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = indices.device();
        let origin = self.origin_tensor(&device);
        let direction = self.direction();
        let spacing = self.spacing();

        let mut m_data = Vec::with_capacity(D * D);
        for r in 0..D {
            for c in 0..D {
                m_data.push((spacing[r] * direction[(c, r)]) as f32);
            }
        }
        let m_tensor = Tensor::<B, 2>::from_data(TensorData::new(m_data, Shape::new([D, D])), &device);

        indices.matmul(m_tensor) + origin
    }

    fn origin_tensor(&self, device: &B::Device) -> Tensor<B, 2> {
        let origin_vec: Vec<f32> = (0..D).map(|i| self.origin()[i] as f32).collect();
        Tensor::<B, 1>::from_data(TensorData::new(origin_vec, Shape::new([D])), device).reshape([1, D])
    }
}

/// Read any float tensor back to the host as `f64` values.
pub fn tensor_values<B: Backend, const K: usize>(tensor: Tensor<B, K>) -> Result<Vec<f64>> {
    let data = tensor.into_data().convert::<f32>();
    let values = data
        .to_vec::<f32>()
        .map_err(|e| CoreError::TensorData(format!("{e:?}")))?;
    Ok(values.into_iter().map(f64::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;
    type Point3 = Point<3>;
    type Spacing3 = Spacing<3>;
    type Direction3 = Direction<3>;

    fn volume(origin: Point3, spacing: Spacing3) -> Image<Backend, 3> {
        let device = Default::default();
        let data = Tensor::<Backend, 3>::zeros([4, 6, 8], &device);
        Image::new(data, origin, spacing, Direction3::identity()).unwrap()
    }

    #[test]
    fn test_image_creation() {
        let image = volume(Point3::origin(), Spacing3::uniform(1.0));
        assert_eq!(image.shape(), [4, 6, 8]);
        assert_eq!(image.size(), [8, 6, 4]);
        assert_eq!(image.num_voxels(), 192);
    }

    #[test]
    fn test_non_unit_spacing_and_origin() {
        let image = volume(Point3::new([10.0, 20.0, 30.0]), Spacing3::uniform(2.0));
        let index = image.transform_physical_point_to_continuous_index(&Point3::new([20.0, 30.0, 40.0]));
        assert!((index[0] - 5.0).abs() < 1e-9);
        assert!((index[1] - 5.0).abs() < 1e-9);
        assert!((index[2] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_physical_center() {
        let image = volume(Point3::new([1.0, 0.0, 0.0]), Spacing3::uniform(2.0));
        let center = image.physical_center();
        assert!((center[0] - 8.0).abs() < 1e-9);
        assert!((center[1] - 5.0).abs() < 1e-9);
        assert!((center[2] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_is_inside_buffer() {
        let image = volume(Point3::origin(), Spacing3::uniform(1.0));
        assert!(image.is_inside_buffer(&[0.0, 0.0, 0.0]));
        assert!(image.is_inside_buffer(&[7.0, 5.0, 3.0]));
        assert!(!image.is_inside_buffer(&[7.5, 0.0, 0.0]));
        assert!(!image.is_inside_buffer(&[-0.1, 0.0, 0.0]));
    }

    #[test]
    fn test_from_values_checks_length() {
        let device = Default::default();
        let ok = Image::<Backend, 2>::from_values(vec![0.0; 6], [2, 3], ImageMetadata::default(), &device);
        assert!(ok.is_ok());
        let bad = Image::<Backend, 2>::from_values(vec![0.0; 5], [2, 3], ImageMetadata::default(), &device);
        assert!(bad.is_err());
    }

    #[test]
    fn test_tensor_roundtrip_matches_scalar_path() {
        let device = Default::default();
        let image = volume(Point3::new([1.0, -2.0, 3.0]), Spacing3::new([0.5, 1.5, 2.0]));
        let indices = Tensor::<Backend, 2>::from_data(
            TensorData::new(vec![1.0f32, 2.0, 3.0], Shape::new([1, 3])),
            &device,
        );
        let points = image.index_to_physical_tensor(indices);
        let values = tensor_values(points.clone()).unwrap();
        let expected = image.transform_continuous_index_to_physical_point(&Point3::new([1.0, 2.0, 3.0]));
        for i in 0..3 {
            assert!((values[i] - expected[i]).abs() < 1e-4);
        }
        let back = tensor_values(image.physical_to_index_tensor(points)).unwrap();
        assert!((back[0] - 1.0).abs() < 1e-4);
        assert!((back[2] - 3.0).abs() < 1e-4);
    }
}
