//! Rotation helpers shared by the transform families.

use nalgebra::{Matrix2, Matrix3, Quaternion, UnitQuaternion, Vector3};

/// Radians to degrees as `angle * 45 / atan(1)`.
pub fn radians_to_degrees(angle: f64) -> f64 {
    angle * 45.0 / 1.0f64.atan()
}

pub fn degrees_to_radians(degrees: f64) -> f64 {
    degrees * 1.0f64.atan() / 45.0
}

pub fn rotation_2d(angle: f64) -> Matrix2<f64> {
    let (s, c) = angle.sin_cos();
    Matrix2::new(c, -s, s, c)
}

pub fn rotation_x(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c)
}

pub fn rotation_y(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c)
}

pub fn rotation_z(angle: f64) -> Matrix3<f64> {
    let (s, c) = angle.sin_cos();
    Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
}

/// Euler rotation applying X first, then Y, then Z: `Rz * Ry * Rx`.
pub fn euler_xyz(angle_x: f64, angle_y: f64, angle_z: f64) -> Matrix3<f64> {
    rotation_z(angle_z) * rotation_y(angle_y) * rotation_x(angle_x)
}

/// Rotation matrix of the quaternion `(x, y, z, w)`, normalized first.
///
/// A zero quaternion yields the identity.
pub fn quaternion_matrix(x: f64, y: f64, z: f64, w: f64) -> Matrix3<f64> {
    let q = Quaternion::new(w, x, y, z);
    if q.norm() < f64::EPSILON {
        return Matrix3::identity();
    }
    UnitQuaternion::from_quaternion(q).to_rotation_matrix().into_inner()
}

/// Unit quaternion for the versor right part `v`; `w = sqrt(1 - |v|²)`.
///
/// Vectors longer than one are rescaled onto the unit sphere.
pub fn versor(v: &Vector3<f64>) -> UnitQuaternion<f64> {
    let norm2 = v.norm_squared();
    let q = if norm2 >= 1.0 {
        let n = norm2.sqrt();
        Quaternion::new(0.0, v.x / n, v.y / n, v.z / n)
    } else {
        Quaternion::new((1.0 - norm2).sqrt(), v.x, v.y, v.z)
    };
    UnitQuaternion::from_quaternion(q)
}

/// Right part of a versor, with the sign chosen so that `w >= 0`.
pub fn versor_right_part(q: &UnitQuaternion<f64>) -> Vector3<f64> {
    let v = q.imag();
    if q.w < 0.0 { -v } else { v }
}

pub fn versor_matrix(v: &Vector3<f64>) -> Matrix3<f64> {
    versor(v).to_rotation_matrix().into_inner()
}

/// Versor for a rotation of `angle` about `axis`; a zero axis yields the identity.
pub fn versor_from_axis_angle(axis: &Vector3<f64>, angle: f64) -> UnitQuaternion<f64> {
    let norm = axis.norm();
    if norm < f64::EPSILON {
        return UnitQuaternion::identity();
    }
    let half = angle / 2.0;
    let scaled = axis / norm * half.sin();
    UnitQuaternion::from_quaternion(Quaternion::new(half.cos(), scaled.x, scaled.y, scaled.z))
}
