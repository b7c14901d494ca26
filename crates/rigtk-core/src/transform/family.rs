//! Parametric transform families and their parameter layouts.
//!
//! Every family maps fixed-image physical points to moving-image physical
//! points. Parameters follow the usual ordering: rotation or scale components
//! first, then (for centered families) the center, then the translation.

use std::fmt;
use std::ops::Range;
use nalgebra::{DMatrix, DVector, Matrix2, Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use crate::error::{CoreError, Result};
use crate::spatial::Point;
use super::affine::AffineMap;
use super::rotation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformFamily {
    Translation,
    Scale,
    ScaleLogarithmic,
    Affine,
    FixedCenterAffine,
    Rigid3D,
    Euler3D,
    CenteredEuler3D,
    QuaternionRigid,
    Versor,
    VersorRigid3D,
    ScaleSkewVersor3D,
    Similarity3D,
    Rigid2D,
    CenteredRigid2D,
    Euler2D,
    Similarity2D,
    CenteredSimilarity2D,
}

impl TransformFamily {
    pub const ALL: [TransformFamily; 18] = [
        Self::Translation,
        Self::Scale,
        Self::ScaleLogarithmic,
        Self::Affine,
        Self::FixedCenterAffine,
        Self::Rigid3D,
        Self::Euler3D,
        Self::CenteredEuler3D,
        Self::QuaternionRigid,
        Self::Versor,
        Self::VersorRigid3D,
        Self::ScaleSkewVersor3D,
        Self::Similarity3D,
        Self::Rigid2D,
        Self::CenteredRigid2D,
        Self::Euler2D,
        Self::Similarity2D,
        Self::CenteredSimilarity2D,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Translation => "Translation",
            Self::Scale => "Scale",
            Self::ScaleLogarithmic => "ScaleLogarithmic",
            Self::Affine => "Affine",
            Self::FixedCenterAffine => "FixedCenterAffine",
            Self::Rigid3D => "Rigid3D",
            Self::Euler3D => "Euler3D",
            Self::CenteredEuler3D => "CenteredEuler3D",
            Self::QuaternionRigid => "QuaternionRigid",
            Self::Versor => "Versor",
            Self::VersorRigid3D => "VersorRigid3D",
            Self::ScaleSkewVersor3D => "ScaleSkewVersor3D",
            Self::Similarity3D => "Similarity3D",
            Self::Rigid2D => "Rigid2D",
            Self::CenteredRigid2D => "CenteredRigid2D",
            Self::Euler2D => "Euler2D",
            Self::Similarity2D => "Similarity2D",
            Self::CenteredSimilarity2D => "CenteredSimilarity2D",
        }
    }

    /// Number of parameters at `dimension`, or `None` when the family does
    /// not exist at that dimensionality.
    pub fn parameter_count(&self, dimension: usize) -> Option<usize> {
        let d = dimension;
        match (self, d) {
            (Self::Translation | Self::Scale | Self::ScaleLogarithmic, 2 | 3) => Some(d),
            (Self::Affine | Self::FixedCenterAffine, 2 | 3) => Some(d * d + d),
            (Self::Rigid3D, 3) => Some(12),
            (Self::Euler3D, 3) => Some(6),
            (Self::CenteredEuler3D, 3) => Some(9),
            (Self::QuaternionRigid, 3) => Some(7),
            (Self::Versor, 3) => Some(3),
            (Self::VersorRigid3D, 3) => Some(6),
            (Self::ScaleSkewVersor3D, 3) => Some(15),
            (Self::Similarity3D, 3) => Some(7),
            (Self::Rigid2D | Self::Euler2D, 2) => Some(3),
            (Self::CenteredRigid2D, 2) => Some(5),
            (Self::Similarity2D, 2) => Some(4),
            (Self::CenteredSimilarity2D, 2) => Some(6),
            _ => None,
        }
    }

    pub fn supports(&self, dimension: usize) -> bool {
        self.parameter_count(dimension).is_some()
    }

    /// Like [`parameter_count`](Self::parameter_count) but failing with
    /// `UnsupportedDimension`.
    pub fn require_parameter_count(&self, dimension: usize) -> Result<usize> {
        self.parameter_count(dimension).ok_or_else(|| {
            CoreError::unsupported_dimension(format!("{self} is not defined for {dimension}D images"))
        })
    }

    /// Parameters of the identity transform.
    pub fn identity_parameters(&self, dimension: usize) -> Option<Vec<f64>> {
        let n = self.parameter_count(dimension)?;
        let d = dimension;
        let mut p = vec![0.0; n];
        match self {
            Self::Scale => p.iter_mut().for_each(|v| *v = 1.0),
            Self::Affine | Self::FixedCenterAffine | Self::Rigid3D => {
                for i in 0..d {
                    p[i * d + i] = 1.0;
                }
            }
            Self::QuaternionRigid => p[3] = 1.0,
            Self::ScaleSkewVersor3D => p[6..9].iter_mut().for_each(|v| *v = 1.0),
            Self::Similarity3D => p[6] = 1.0,
            Self::Similarity2D | Self::CenteredSimilarity2D => p[0] = 1.0,
            _ => {}
        }
        Some(p)
    }

    /// Slots holding the translation, if the family has one.
    pub fn translation_range(&self, dimension: usize) -> Option<Range<usize>> {
        let n = self.parameter_count(dimension)?;
        let d = dimension;
        match self {
            Self::Translation => Some(0..d),
            Self::Scale | Self::ScaleLogarithmic | Self::Versor => None,
            Self::Affine | Self::FixedCenterAffine | Self::Rigid3D => Some(d * d..n),
            Self::Euler3D | Self::VersorRigid3D | Self::ScaleSkewVersor3D | Self::Similarity3D => Some(3..6),
            Self::QuaternionRigid => Some(4..7),
            Self::CenteredEuler3D => Some(6..9),
            Self::Rigid2D | Self::Euler2D => Some(1..3),
            Self::Similarity2D => Some(2..4),
            Self::CenteredRigid2D => Some(3..5),
            Self::CenteredSimilarity2D => Some(4..6),
        }
    }

    /// Slots holding an explicit center of rotation, for centered families.
    pub fn center_range(&self, dimension: usize) -> Option<Range<usize>> {
        self.parameter_count(dimension)?;
        match self {
            Self::CenteredEuler3D => Some(3..6),
            Self::CenteredRigid2D => Some(1..3),
            Self::CenteredSimilarity2D => Some(2..4),
            _ => None,
        }
    }

    /// Map `params` to the fixed-to-moving affine map about `center`.
    ///
    /// Centered families read their center from the parameters instead.
    pub fn to_affine<const D: usize>(&self, params: &[f64], center: &Point<D>) -> Result<AffineMap<D>> {
        let n = self.require_parameter_count(D)?;
        if params.len() != n {
            return Err(CoreError::invalid_parameters(format!(
                "{self} expects {n} parameters in {D}D, got {}",
                params.len()
            )));
        }
        let (matrix, translation, center) = self.decompose(params, &center.to_vec())?;
        let offset = &translation + &center - &matrix * &center;
        AffineMap::from_dynamic(&matrix, &offset)
    }

    /// Linear part, translation and center of rotation for `params`.
    fn decompose(&self, p: &[f64], user_center: &[f64]) -> Result<(DMatrix<f64>, DVector<f64>, DVector<f64>)> {
        let d = user_center.len();
        let center_from = |range: Option<Range<usize>>| match range {
            Some(r) => DVector::from_column_slice(&p[r]),
            None => DVector::from_column_slice(user_center),
        };
        let translation = match self.translation_range(d) {
            Some(r) => DVector::from_column_slice(&p[r]),
            None => DVector::zeros(d),
        };
        let center = center_from(self.center_range(d));

        let matrix = match self {
            Self::Translation => DMatrix::identity(d, d),
            Self::Scale => DMatrix::from_diagonal(&DVector::from_column_slice(&p[..d])),
            Self::ScaleLogarithmic => DMatrix::from_diagonal(&DVector::from_iterator(d, p[..d].iter().map(|v| v.exp()))),
            Self::Affine | Self::FixedCenterAffine | Self::Rigid3D => DMatrix::from_row_slice(d, d, &p[..d * d]),
            Self::Euler3D | Self::CenteredEuler3D => dynamic3(&rotation::euler_xyz(p[0], p[1], p[2])),
            Self::QuaternionRigid => dynamic3(&rotation::quaternion_matrix(p[0], p[1], p[2], p[3])),
            Self::Versor | Self::VersorRigid3D => dynamic3(&rotation::versor_matrix(&Vector3::new(p[0], p[1], p[2]))),
            Self::ScaleSkewVersor3D => {
                let r = rotation::versor_matrix(&Vector3::new(p[0], p[1], p[2]));
                let scale_skew = Matrix3::new(p[6], p[9], p[10], p[11], p[7], p[12], p[13], p[14], p[8]);
                dynamic3(&(r * scale_skew))
            }
            Self::Similarity3D => {
                let r = rotation::versor_matrix(&Vector3::new(p[0], p[1], p[2]));
                dynamic3(&(r * p[6]))
            }
            Self::Rigid2D | Self::Euler2D | Self::CenteredRigid2D => dynamic2(&rotation::rotation_2d(p[0])),
            Self::Similarity2D | Self::CenteredSimilarity2D => dynamic2(&(rotation::rotation_2d(p[1]) * p[0])),
        };
        Ok((matrix, translation, center))
    }
}

impl fmt::Display for TransformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn dynamic3(m: &Matrix3<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(3, 3, |r, c| m[(r, c)])
}

fn dynamic2(m: &Matrix2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(2, 2, |r, c| m[(r, c)])
}
