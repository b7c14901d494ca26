use std::f64::consts::PI;
use nalgebra::{Matrix3, Vector3};
use proptest::prelude::*;
use rigtk_core::transform::rotation::radians_to_degrees;
use rigtk_core::{Placement, TransformFamily};
use rigtk_registration::{
    apply_registration, registration_matrix, PlacementSnapshot, RegistrationResult, StopCondition,
    TransformParameters, TransformationHistory,
};

fn result(family: TransformFamily, parameters: Vec<f64>, center: Vec<f64>) -> RegistrationResult {
    RegistrationResult {
        family,
        parameters,
        center,
        value: 0.0,
        iterations: 10,
        stop_condition: StopCondition::Converged,
        levels: Vec::new(),
    }
}

#[test]
fn test_parameter_counts_per_family() {
    let expected: [(TransformFamily, Option<usize>, Option<usize>); 18] = [
        (TransformFamily::Translation, Some(2), Some(3)),
        (TransformFamily::Scale, Some(2), Some(3)),
        (TransformFamily::ScaleLogarithmic, Some(2), Some(3)),
        (TransformFamily::Affine, Some(6), Some(12)),
        (TransformFamily::FixedCenterAffine, Some(6), Some(12)),
        (TransformFamily::Rigid3D, None, Some(12)),
        (TransformFamily::Euler3D, None, Some(6)),
        (TransformFamily::CenteredEuler3D, None, Some(9)),
        (TransformFamily::QuaternionRigid, None, Some(7)),
        (TransformFamily::Versor, None, Some(3)),
        (TransformFamily::VersorRigid3D, None, Some(6)),
        (TransformFamily::ScaleSkewVersor3D, None, Some(15)),
        (TransformFamily::Similarity3D, None, Some(7)),
        (TransformFamily::Rigid2D, Some(3), None),
        (TransformFamily::CenteredRigid2D, Some(5), None),
        (TransformFamily::Euler2D, Some(3), None),
        (TransformFamily::Similarity2D, Some(4), None),
        (TransformFamily::CenteredSimilarity2D, Some(6), None),
    ];
    for (family, two, three) in expected {
        for (dimension, count) in [(2, two), (3, three)] {
            let parameters = TransformParameters::new(family);
            match count {
                Some(n) => {
                    assert_eq!(parameters.parameter_count(dimension).unwrap(), n, "{family} {dimension}D");
                    assert_eq!(parameters.identity_parameters(dimension).unwrap().len(), n);
                    assert_eq!(parameters.resolved_scales(dimension).unwrap().len(), n);
                }
                None => assert!(parameters.parameter_count(dimension).is_err(), "{family} {dimension}D"),
            }
        }
    }
}

#[test]
fn test_quarter_pi_converts_to_45_degrees() {
    assert!((radians_to_degrees(PI / 4.0) - 45.0).abs() < 1e-12);
}

fn placement_strategy() -> impl Strategy<Value = Placement> {
    (
        -PI..PI,
        -PI..PI,
        0.25f64..4.0,
        prop::array::uniform3(-100.0f64..100.0),
    )
        .prop_map(|(a, b, scale, offset)| {
            let rotation = nalgebra::Rotation3::from_euler_angles(a, b, 0.3).into_inner();
            Placement::from_linear_and_offset(rotation * Matrix3::from_diagonal(&Vector3::new(scale, 1.0, 2.0)), Vector3::from(offset))
        })
}

fn euler_result_strategy() -> impl Strategy<Value = RegistrationResult> {
    (prop::array::uniform3(-1.0f64..1.0), prop::array::uniform3(-20.0f64..20.0), prop::array::uniform3(-50.0f64..50.0))
        .prop_map(|(angles, translation, center)| {
            let mut parameters = angles.to_vec();
            parameters.extend_from_slice(&translation);
            result(TransformFamily::Euler3D, parameters, center.to_vec())
        })
}

proptest! {
    #[test]
    fn prop_angle_conversion_matches_180_over_pi(angle in -10.0f64..10.0) {
        let degrees = radians_to_degrees(angle);
        prop_assert!((degrees - angle * 180.0 / PI).abs() <= 1e-12 * degrees.abs().max(1.0));
    }

    #[test]
    fn prop_inverse_delta_restores_every_placement(
        registration in euler_result_strategy(),
        moving in placement_strategy(),
        fixed in placement_strategy(),
        child in placement_strategy(),
    ) {
        let w2p = moving.inverse().unwrap();
        let applied = apply_registration(&registration, &w2p, &fixed, &moving, vec![(1u32, child)]).unwrap();
        let inverse = applied.inverse_delta().unwrap();

        prop_assert!(inverse.compose(&applied.placement).approx_eq(&moving, 1e-6));
        prop_assert!(inverse.compose(&applied.children[0].placement).approx_eq(&child, 1e-6));
    }

    #[test]
    fn prop_history_undo_restores_pre_registration_state(
        registration in euler_result_strategy(),
        moving in placement_strategy(),
        child in placement_strategy(),
    ) {
        let applied = apply_registration(&registration, &Placement::identity(), &Placement::identity(), &moving, vec![("child", child)]).unwrap();
        let mut history = TransformationHistory::new();
        history.record(&applied);

        let (after, children) = applied.redo();
        let restored = history.undo(PlacementSnapshot::new(after, children)).unwrap();
        prop_assert_eq!(restored.moving, moving);
        prop_assert_eq!(&restored.children, &vec![("child", child)]);

        let redone = history.redo(restored).unwrap();
        prop_assert_eq!(redone.moving, applied.placement);
    }

    #[test]
    fn prop_matrix_matches_reported_affine(registration in euler_result_strategy()) {
        let matrix = registration.matrix().unwrap();
        let map = registration.affine::<3>().unwrap().to_homogeneous().unwrap();
        prop_assert!((matrix - map).norm() < 1e-9);
        let direct = registration_matrix(registration.family, &registration.parameters, &registration.center).unwrap();
        prop_assert_eq!(direct, matrix);
    }
}
