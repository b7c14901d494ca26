//! Direction cosines of the image axes.

use nalgebra::{DMatrix, SMatrix};
use serde::{Deserialize, Serialize};
use super::Vector;

/// Direction matrix: column `i` is the physical direction of image axis `i`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Direction<const D: usize>(pub SMatrix<f64, D, D>);

impl<const D: usize> Direction<D> {
    pub fn identity() -> Self {
        Self(SMatrix::identity())
    }

    /// Build from a matrix given in row-major order.
    pub fn from_row_major(values: [[f64; D]; D]) -> Self {
        Self(SMatrix::from_fn(|r, c| values[r][c]))
    }

    pub fn determinant(&self) -> f64 {
        // Dynamic copy: the statically sized LU needs concrete dimensions.
        DMatrix::from_iterator(D, D, self.0.iter().copied()).determinant()
    }

    pub fn try_inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }

    /// Whether the columns are orthonormal.
    pub fn is_orthogonal(&self) -> bool {
        let product = self.0 * self.0.transpose();
        (product - SMatrix::<f64, D, D>::identity()).abs().max() < 1e-6
    }

    pub fn inner(&self) -> &SMatrix<f64, D, D> {
        &self.0
    }
}

impl<const D: usize> std::ops::Index<(usize, usize)> for Direction<D> {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        &self.0[index]
    }
}

impl<const D: usize> std::ops::Mul<Vector<D>> for Direction<D> {
    type Output = Vector<D>;

    fn mul(self, vector: Vector<D>) -> Self::Output {
        Vector(self.0 * vector.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_rotation() {
        let rot = Direction::<3>::from_row_major([
            [0.0, -1.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
        ]);
        assert!(rot.is_orthogonal());
        assert!((rot.determinant() - 1.0).abs() < 1e-12);
        let v = rot * Vector::new([1.0, 0.0, 0.0]);
        assert!((v[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_direction() {
        let singular = Direction::<2>::from_row_major([[1.0, 2.0], [2.0, 4.0]]);
        assert!(singular.try_inverse().is_none());
        assert!(!singular.is_orthogonal());
    }
}
