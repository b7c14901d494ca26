//! Applying a registration result to placements.
//!
//! The optimizer's parameters describe a fixed-to-moving map in the images'
//! physical frames. To move the moving image onto the fixed one, that map is
//! inverted and sandwiched between the physical/world conversions:
//!
//! `new = P2W(fixed) ∘ R⁻¹ ∘ W2P(moving) ∘ initial`
//!
//! The same delta `P2W ∘ R⁻¹ ∘ W2P` is replayed on every child placement.

use nalgebra::{Matrix3, Matrix4, Vector3};
use rigtk_core::transform::rotation::{degrees_to_radians, radians_to_degrees, rotation_x, rotation_y, rotation_z};
use rigtk_core::{Placement, Point, TransformFamily};
use crate::error::{RegistrationError, Result};
use crate::registration::RegistrationResult;
use crate::validation::validate_parameter_vector;

/// Fixed-to-moving map of `family` at `params` as a 4×4 homogeneous matrix.
///
/// `center` is the center of rotation for families that do not carry one in
/// their parameters; its length selects 2D or 3D.
pub fn registration_matrix(family: TransformFamily, params: &[f64], center: &[f64]) -> Result<Matrix4<f64>> {
    let d = center.len();
    let n = family.parameter_count(d).ok_or_else(|| {
        RegistrationError::dimension_mismatch(format!("{family} is not defined in {d}D"))
    })?;
    validate_parameter_vector("registration parameters", params, n)?;

    let Some(linear) = angle_linear_part(family, params) else {
        return match d {
            2 => affine_matrix::<2>(family, params, center),
            _ => affine_matrix::<3>(family, params, center),
        };
    };

    let pad = |values: &[f64]| {
        let mut v = Vector3::zeros();
        v.as_mut_slice()[..values.len()].copy_from_slice(values);
        v
    };
    let translation = family.translation_range(d).map_or_else(Vector3::zeros, |r| pad(&params[r]));
    let rotation_center = match family.center_range(d) {
        Some(r) => pad(&params[r]),
        None => pad(center),
    };
    let offset = translation + rotation_center - linear * rotation_center;
    Ok(*Placement::from_linear_and_offset(linear, offset).matrix())
}

fn affine_matrix<const D: usize>(family: TransformFamily, params: &[f64], center: &[f64]) -> Result<Matrix4<f64>> {
    let center = Point::<D>::from_slice(center)
        .ok_or_else(|| RegistrationError::dimension_mismatch(format!("center must have {D} components")))?;
    Ok(family.to_affine::<D>(params, &center)?.to_homogeneous()?)
}

/// Elementary rotation about one axis, by an angle in degrees.
fn rotate_degrees(axis: usize, degrees: f64) -> Matrix3<f64> {
    let radians = degrees_to_radians(degrees);
    match axis {
        0 => rotation_x(radians),
        1 => rotation_y(radians),
        _ => rotation_z(radians),
    }
}

/// Linear part of the angle-parameterized families, composed X then Y then Z.
fn angle_linear_part(family: TransformFamily, p: &[f64]) -> Option<Matrix3<f64>> {
    let linear = match family {
        TransformFamily::Euler3D | TransformFamily::CenteredEuler3D => {
            let [x, y, z] = [p[0], p[1], p[2]].map(radians_to_degrees);
            rotate_degrees(2, z) * rotate_degrees(1, y) * rotate_degrees(0, x)
        }
        TransformFamily::Rigid2D | TransformFamily::CenteredRigid2D | TransformFamily::Euler2D => {
            rotate_degrees(2, radians_to_degrees(p[0]))
        }
        TransformFamily::Similarity2D | TransformFamily::CenteredSimilarity2D => {
            let mut m = rotate_degrees(2, radians_to_degrees(p[1]));
            let mut in_plane = m.fixed_view_mut::<2, 2>(0, 0);
            in_plane *= p[0];
            m
        }
        _ => return None,
    };
    Some(linear)
}

/// A child node's placement before and after the registration.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildPlacement<Id> {
    pub id: Id,
    pub original: Placement,
    pub placement: Placement,
}

/// Placements produced by applying a registration result.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedRegistration<Id> {
    /// Moving placement before the registration.
    pub original: Placement,
    /// Moving placement after the registration.
    pub placement: Placement,
    /// `P2W ∘ R⁻¹ ∘ W2P`, applied on the left of every original placement.
    pub delta: Placement,
    pub children: Vec<ChildPlacement<Id>>,
}

impl<Id: Clone> AppliedRegistration<Id> {
    /// The placements to restore: the moving original, then every child's.
    pub fn undo(&self) -> (Placement, Vec<(Id, Placement)>) {
        let children = self.children.iter().map(|c| (c.id.clone(), c.original)).collect();
        (self.original, children)
    }

    /// The registered placements: moving, then every child's.
    pub fn redo(&self) -> (Placement, Vec<(Id, Placement)>) {
        let children = self.children.iter().map(|c| (c.id.clone(), c.placement)).collect();
        (self.placement, children)
    }

    /// Inverse of the delta; composing it with any updated placement restores the original.
    pub fn inverse_delta(&self) -> Result<Placement> {
        Ok(self.delta.inverse()?)
    }
}

/// Compose `result` into the moving placement and replay it on `children`.
pub fn apply_registration<Id: Clone>(
    result: &RegistrationResult,
    moving_world_to_physical: &Placement,
    fixed_physical_to_world: &Placement,
    moving_original: &Placement,
    children: Vec<(Id, Placement)>,
) -> Result<AppliedRegistration<Id>> {
    let registration = Placement::from_matrix(result.matrix()?)?;
    let inverse = registration.inverse().map_err(|e| {
        RegistrationError::transform(format!("registration result is not invertible: {e}"))
    })?;
    let delta = fixed_physical_to_world.compose(&inverse).compose(moving_world_to_physical);

    let placement = delta.compose(moving_original);
    let children = children
        .into_iter()
        .map(|(id, original)| ChildPlacement {
            id,
            original,
            placement: delta.compose(&original),
        })
        .collect::<Vec<_>>();
    tracing::debug!(family = result.family.name(), children = children.len(), "applied registration");

    Ok(AppliedRegistration {
        original: *moving_original,
        placement,
        delta,
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::StopCondition;
    use std::f64::consts::FRAC_PI_2;

    fn result(family: TransformFamily, parameters: Vec<f64>, center: Vec<f64>) -> RegistrationResult {
        RegistrationResult {
            family,
            parameters,
            center,
            value: 0.0,
            iterations: 1,
            stop_condition: StopCondition::Converged,
            levels: Vec::new(),
        }
    }

    #[test]
    fn test_angle_families_match_affine_resolution() {
        let cases: Vec<(TransformFamily, Vec<f64>, Vec<f64>)> = vec![
            (TransformFamily::Euler3D, vec![0.1, -0.2, 0.3, 1.0, 2.0, 3.0], vec![5.0, -1.0, 2.0]),
            (TransformFamily::CenteredEuler3D, vec![0.3, 0.1, -0.4, 1.0, 1.0, 1.0, 4.0, 0.0, -2.0], vec![0.0; 3]),
            (TransformFamily::Rigid2D, vec![0.5, 3.0, -2.0], vec![10.0, 20.0]),
            (TransformFamily::CenteredRigid2D, vec![-0.7, 1.0, 2.0, 0.5, 0.5], vec![0.0, 0.0]),
            (TransformFamily::Similarity2D, vec![1.2, 0.4, 1.0, 0.0], vec![3.0, 3.0]),
            (TransformFamily::CenteredSimilarity2D, vec![0.8, -0.4, 2.0, 1.0, 0.0, 1.0], vec![0.0, 0.0]),
        ];
        for (family, params, center) in cases {
            let from_angles = registration_matrix(family, &params, &center).unwrap();
            let from_affine = if center.len() == 2 {
                affine_matrix::<2>(family, &params, &center).unwrap()
            } else {
                affine_matrix::<3>(family, &params, &center).unwrap()
            };
            assert!((from_angles - from_affine).norm() < 1e-9, "{family}");
        }
    }

    #[test]
    fn test_translation_moves_by_parameters() {
        let m = registration_matrix(TransformFamily::Translation, &[3.0, -2.0], &[0.0, 0.0]).unwrap();
        assert_eq!(m[(0, 3)], 3.0);
        assert_eq!(m[(1, 3)], -2.0);
        assert_eq!(m[(2, 3)], 0.0);
    }

    #[test]
    fn test_rotation_about_center_keeps_center_fixed() {
        let m = registration_matrix(TransformFamily::Rigid2D, &[FRAC_PI_2, 0.0, 0.0], &[4.0, 1.0]).unwrap();
        let p = Placement::from_matrix(m).unwrap().transform_point([4.0, 1.0, 0.0]);
        assert!((p[0] - 4.0).abs() < 1e-12 && (p[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_wrong_dimension_or_length() {
        assert!(matches!(
            registration_matrix(TransformFamily::Euler3D, &[0.0; 6], &[0.0, 0.0]),
            Err(RegistrationError::DimensionMismatch(_))
        ));
        assert!(matches!(
            registration_matrix(TransformFamily::Rigid2D, &[0.0; 2], &[0.0, 0.0]),
            Err(RegistrationError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_apply_moves_image_onto_fixed_and_children_follow() {
        // Fixed point x maps to moving point x + (3, -2); the moving image
        // content must move by (-3, 2) in the world.
        let res = result(TransformFamily::Translation, vec![3.0, -2.0], vec![0.0, 0.0]);
        let original = Placement::from_linear_and_offset(Matrix3::identity() * 2.0, Vector3::new(1.0, 1.0, 0.0));
        let child = Placement::from_linear_and_offset(Matrix3::identity(), Vector3::new(-5.0, 0.0, 0.0));
        let applied = apply_registration(
            &res,
            &Placement::identity(),
            &Placement::identity(),
            &original,
            vec![("overlay", child)],
        )
        .unwrap();

        let moved = applied.placement.transform_point([0.0, 0.0, 0.0]);
        assert_eq!(moved, [-2.0, 3.0, 0.0]);
        let child_moved = applied.children[0].placement.transform_point([0.0, 0.0, 0.0]);
        assert_eq!(child_moved, [-8.0, 2.0, 0.0]);

        let restored = applied.inverse_delta().unwrap().compose(&applied.placement);
        assert!(restored.approx_eq(&original, 1e-6));
        let (moving, children) = applied.undo();
        assert_eq!(moving, original);
        assert_eq!(children, vec![("overlay", child)]);
    }

    #[test]
    fn test_singular_result_is_rejected() {
        let res = result(TransformFamily::Scale, vec![0.0, 1.0], vec![0.0, 0.0]);
        let applied = apply_registration::<u32>(&res, &Placement::identity(), &Placement::identity(), &Placement::identity(), vec![]);
        assert!(matches!(applied, Err(RegistrationError::Transform(_))));
    }
}
