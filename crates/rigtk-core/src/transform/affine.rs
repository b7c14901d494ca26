//! Affine map `T(x) = A x + o` between physical frames.

use burn::tensor::{Shape, Tensor, TensorData};
use burn::tensor::backend::Backend;
use nalgebra::{DMatrix, DVector, Matrix4, SMatrix, SVector};
use crate::error::{CoreError, Result};
use crate::geometry::{embed_affine, Placement};
use crate::spatial::Point;
use super::trait_::Transform;

/// Affine map in D dimensions.
///
/// Centered parameterizations `T(x) = A (x - c) + c + t` are normalized to
/// `A x + o` with `o = t + c - A c` by [`AffineMap::centered`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineMap<const D: usize> {
    matrix: SMatrix<f64, D, D>,
    offset: SVector<f64, D>,
}

impl<const D: usize> AffineMap<D> {
    pub fn new(matrix: SMatrix<f64, D, D>, offset: SVector<f64, D>) -> Self {
        Self { matrix, offset }
    }

    pub fn identity() -> Self {
        Self::new(SMatrix::identity(), SVector::zeros())
    }

    pub fn translation(offset: SVector<f64, D>) -> Self {
        Self::new(SMatrix::identity(), offset)
    }

    /// `A (x - c) + c + t`.
    pub fn centered(matrix: SMatrix<f64, D, D>, translation: SVector<f64, D>, center: SVector<f64, D>) -> Self {
        let offset = translation + center - matrix * center;
        Self::new(matrix, offset)
    }

    /// Build from dynamically sized parts; sizes must be `D×D` and `D`.
    pub fn from_dynamic(matrix: &DMatrix<f64>, offset: &DVector<f64>) -> Result<Self> {
        if matrix.nrows() != D || matrix.ncols() != D || offset.len() != D {
            return Err(CoreError::unsupported_dimension(format!(
                "expected a {D}x{D} matrix and {D} offsets, got {}x{} and {}",
                matrix.nrows(),
                matrix.ncols(),
                offset.len()
            )));
        }
        let mut m = SMatrix::<f64, D, D>::zeros();
        let mut o = SVector::<f64, D>::zeros();
        for r in 0..D {
            for c in 0..D {
                m[(r, c)] = matrix[(r, c)];
            }
            o[r] = offset[r];
        }
        Ok(Self::new(m, o))
    }

    pub fn matrix(&self) -> &SMatrix<f64, D, D> {
        &self.matrix
    }

    pub fn offset(&self) -> &SVector<f64, D> {
        &self.offset
    }

    pub fn transform_point(&self, point: &Point<D>) -> Point<D> {
        let mapped = self.matrix * point.inner().coords + self.offset;
        let mut out = Point::<D>::origin();
        for i in 0..D {
            out[i] = mapped[i];
        }
        out
    }

    /// `self ∘ other`: apply `other` first.
    pub fn compose(&self, other: &AffineMap<D>) -> AffineMap<D> {
        Self::new(self.matrix * other.matrix, self.matrix * other.offset + self.offset)
    }

    pub fn inverse(&self) -> Result<Self> {
        let dynamic = DMatrix::from_fn(D, D, |r, c| self.matrix[(r, c)]);
        let inverse = dynamic
            .try_inverse()
            .ok_or_else(|| CoreError::singular("affine map is not invertible"))?;
        let mut m = SMatrix::<f64, D, D>::zeros();
        for r in 0..D {
            for c in 0..D {
                m[(r, c)] = inverse[(r, c)];
            }
        }
        Ok(Self::new(m, -(m * self.offset)))
    }

    /// The map as a 4×4 homogeneous matrix (2D maps act as identity on z).
    pub fn to_homogeneous(&self) -> Result<Matrix4<f64>> {
        embed_affine(&self.matrix, &self.offset)
    }

    pub fn to_placement(&self) -> Result<Placement> {
        Placement::from_matrix(self.to_homogeneous()?)
    }

    pub fn approx_eq(&self, other: &AffineMap<D>, tolerance: f64) -> bool {
        (self.matrix - other.matrix).abs().max() <= tolerance
            && (self.offset - other.offset).abs().max() <= tolerance
    }
}

impl<const D: usize> Default for AffineMap<D> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<B: Backend, const D: usize> Transform<B, D> for AffineMap<D> {
    /// Row-vector form `y = x Aᵀ + o`.
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();
        let mut a_t = Vec::with_capacity(D * D);
        for r in 0..D {
            for c in 0..D {
                a_t.push(self.matrix[(c, r)] as f32);
            }
        }
        let a_t = Tensor::<B, 2>::from_data(TensorData::new(a_t, Shape::new([D, D])), &device);
        let offset: Vec<f32> = self.offset.iter().map(|&v| v as f32).collect();
        let offset = Tensor::<B, 2>::from_data(TensorData::new(offset, Shape::new([1, D])), &device);
        points.matmul(a_t) + offset
    }

    fn inverse(&self) -> Option<Box<dyn Transform<B, D>>> {
        AffineMap::inverse(self)
            .ok()
            .map(|inv| Box::new(inv) as Box<dyn Transform<B, D>>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use nalgebra::{Matrix2, Vector2};

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_centered_keeps_center_fixed() {
        let a = Matrix2::new(0.0, -2.0, 2.0, 0.0);
        let map = AffineMap::<2>::centered(a, Vector2::zeros(), Vector2::new(10.0, 5.0));
        let mapped = map.transform_point(&Point::new([10.0, 5.0]));
        assert!((mapped[0] - 10.0).abs() < 1e-12);
        assert!((mapped[1] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_inverse_and_compose() {
        let a = Matrix2::new(1.0, 0.5, -0.25, 2.0);
        let map = AffineMap::<2>::new(a, Vector2::new(3.0, -1.0));
        let roundtrip = map.compose(&map.inverse().unwrap());
        assert!(roundtrip.approx_eq(&AffineMap::identity(), 1e-12));
        assert!(AffineMap::<2>::new(Matrix2::zeros(), Vector2::zeros()).inverse().is_err());
    }

    #[test]
    fn test_transform_points_tensor() {
        let device = Default::default();
        let a = Matrix2::new(0.0, -1.0, 1.0, 0.0);
        let map = AffineMap::<2>::new(a, Vector2::new(1.0, 2.0));
        let points = Tensor::<TestBackend, 2>::from_floats([[1.0, 0.0], [0.0, 3.0]], &device);
        let out = Transform::<TestBackend, 2>::transform_points(&map, points)
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(out, vec![1.0, 3.0, -2.0, 2.0]);
    }
}
