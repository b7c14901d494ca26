//! Placements: homogeneous index-to-world maps.
//!
//! Every image and every dependent node owns one [`Placement`]. Placements
//! are always 3D (4×4 homogeneous); 2D images embed with an identity z axis.

use nalgebra::{Matrix3, Matrix4, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};
use crate::error::{CoreError, Result};
use crate::image::ImageMetadata;

/// An affine map from voxel-index space to world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    matrix: Matrix4<f64>,
}

impl Placement {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Wrap a homogeneous matrix; the last row must be `[0, 0, 0, 1]`.
    pub fn from_matrix(matrix: Matrix4<f64>) -> Result<Self> {
        let last_row_ok = (0..3).all(|c| matrix[(3, c)].abs() < 1e-12)
            && (matrix[(3, 3)] - 1.0).abs() < 1e-12;
        if !last_row_ok || matrix.iter().any(|v| !v.is_finite()) {
            return Err(CoreError::invalid_parameters(
                "placement must be a finite affine homogeneous matrix",
            ));
        }
        Ok(Self { matrix })
    }

    pub fn from_linear_and_offset(linear: Matrix3<f64>, offset: Vector3<f64>) -> Self {
        let mut matrix = Matrix4::identity();
        matrix.fixed_view_mut::<3, 3>(0, 0).copy_from(&linear);
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(&offset);
        Self { matrix }
    }

    /// Placement of an image whose world frame coincides with its physical frame.
    pub fn from_metadata<const D: usize>(metadata: &ImageMetadata<D>) -> Result<Self> {
        let (linear, offset) = metadata.index_to_physical_affine();
        Ok(Self {
            matrix: embed_affine(&linear, &offset)?,
        })
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    pub fn linear(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    pub fn offset(&self) -> Vector3<f64> {
        self.matrix.fixed_view::<3, 1>(0, 3).into_owned()
    }

    pub fn inverse(&self) -> Result<Self> {
        let linear_inv = self
            .linear()
            .try_inverse()
            .ok_or_else(|| CoreError::singular("placement linear part"))?;
        let offset = -(linear_inv * self.offset());
        Ok(Self::from_linear_and_offset(linear_inv, offset))
    }

    /// `self ∘ other`: apply `other` first, then `self`.
    pub fn compose(&self, other: &Placement) -> Placement {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    pub fn transform_point(&self, point: [f64; 3]) -> [f64; 3] {
        let p = self.linear() * Vector3::from(point) + self.offset();
        [p[0], p[1], p[2]]
    }

    /// Entry-wise comparison with a tolerance relative to the larger magnitude.
    pub fn approx_eq(&self, other: &Placement, relative_tolerance: f64) -> bool {
        self.matrix
            .iter()
            .zip(other.matrix.iter())
            .all(|(a, b)| (a - b).abs() <= relative_tolerance * a.abs().max(b.abs()).max(1.0))
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::identity()
    }
}

/// Embed a D-dimensional affine map (D ≤ 3) into a 4×4 homogeneous matrix.
pub fn embed_affine<const D: usize>(
    linear: &SMatrix<f64, D, D>,
    offset: &SVector<f64, D>,
) -> Result<Matrix4<f64>> {
    if D == 0 || D > 3 {
        return Err(CoreError::unsupported_dimension(format!(
            "cannot embed a {D}D affine map into a 3D placement"
        )));
    }
    let mut matrix = Matrix4::identity();
    for r in 0..D {
        for c in 0..D {
            matrix[(r, c)] = linear[(r, c)];
        }
        matrix[(r, 3)] = offset[r];
    }
    Ok(matrix)
}
