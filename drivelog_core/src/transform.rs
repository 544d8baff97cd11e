//! Rigid-body transform primitive.
//!
//! A pose is a unit quaternion plus a translation. Applying it to a point
//! gives `R·p + t`. Every frame change in the engine (object → world,
//! world → ego, ego → sensor) goes through this type.
//!
//! Quaternion products are *not* renormalized. Long chains accumulate
//! drift; callers composing many transforms should call
//! [`RigidTransform::renormalize`] themselves.

use nalgebra::{Matrix3xX, Matrix4, Quaternion, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Converts a stored `[w, x, y, z]` quaternion to a unit quaternion.
///
/// This is the single normalization point for quaternions read from disk.
pub fn quaternion_from_wxyz(q: &[f64; 4]) -> UnitQuaternion<f64> {
    UnitQuaternion::new_normalize(Quaternion::new(q[0], q[1], q[2], q[3]))
}

/// Inverse of [`quaternion_from_wxyz`].
pub fn quaternion_to_wxyz(q: &UnitQuaternion<f64>) -> [f64; 4] {
    [q.w, q.i, q.j, q.k]
}

/// Heading of a pose: the first angle of its yaw-pitch-roll decomposition.
pub fn yaw_of(q: &UnitQuaternion<f64>) -> f64 {
    q.euler_angles().2
}

/// Rotation about +z only.
pub fn yaw_rotation(yaw: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw)
}

/// Spherical interpolation between two orientations, `amount` in [0, 1].
///
/// Takes the short arc. Falls back to normalized linear interpolation when
/// the orientations are too close for a stable slerp.
pub fn slerp(q0: &UnitQuaternion<f64>, q1: &UnitQuaternion<f64>, amount: f64) -> UnitQuaternion<f64> {
    q0.try_slerp(q1, amount, 1.0e-9)
        .unwrap_or_else(|| q0.nlerp(q1, amount))
}

/// Rotation + translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    pub fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self { rotation, translation }
    }

    pub fn identity() -> Self {
        Self::new(UnitQuaternion::identity(), Vector3::zeros())
    }

    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self::new(UnitQuaternion::identity(), translation)
    }

    pub fn from_rotation(rotation: UnitQuaternion<f64>) -> Self {
        Self::new(rotation, Vector3::zeros())
    }

    /// Adds `delta` to the translation.
    pub fn translate(&mut self, delta: &Vector3<f64>) {
        self.translation += delta;
    }

    /// Pre-multiplies by `q`: both the orientation and the position are
    /// rotated about the current frame's origin.
    pub fn rotate(&mut self, q: &UnitQuaternion<f64>) {
        self.rotation = q * self.rotation;
        self.translation = q * self.translation;
    }

    pub fn inverse(&self) -> Self {
        let inv = self.rotation.inverse();
        Self::new(inv, -(inv * self.translation))
    }

    /// `self ∘ other`: applies `other` first, then `self`.
    pub fn compose(&self, other: &RigidTransform) -> Self {
        Self::new(
            self.rotation * other.rotation,
            self.rotation * other.translation + self.translation,
        )
    }

    /// Pulls the rotation back onto the unit sphere.
    pub fn renormalize(&mut self) {
        self.rotation = Unit::new_normalize(self.rotation.into_inner());
    }

    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// Transforms every column of a 3×N point matrix.
    pub fn transform_points(&self, points: &Matrix3xX<f64>) -> Matrix3xX<f64> {
        let mut out = self.rotation.to_rotation_matrix().matrix() * points;
        for mut col in out.column_iter_mut() {
            col += self.translation;
        }
        out
    }

    /// Homogeneous 4×4 form.
    pub fn to_matrix(&self) -> Matrix4<f64> {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(self.rotation.to_rotation_matrix().matrix());
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_rotate_moves_translation() {
        let mut pose = RigidTransform::from_translation(Vector3::new(1.0, 0.0, 0.0));
        pose.rotate(&yaw_rotation(FRAC_PI_2));
        assert_relative_eq!(pose.translation, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(yaw_of(&pose.rotation), FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_compose_matches_sequential_application() {
        let a = RigidTransform::new(yaw_rotation(0.3), Vector3::new(1.0, 2.0, 3.0));
        let b = RigidTransform::new(yaw_rotation(-1.1), Vector3::new(-4.0, 0.5, 0.0));
        let p = Vector3::new(0.2, -0.7, 1.5);

        let composed = a.compose(&b).transform_point(&p);
        let sequential = a.transform_point(&b.transform_point(&p));
        assert_relative_eq!(composed, sequential, epsilon = 1e-12);
    }

    #[test]
    fn test_matrix_form() {
        let pose = RigidTransform::new(yaw_rotation(FRAC_PI_2), Vector3::new(1.0, 0.0, 0.0));
        let m = pose.to_matrix();
        let p = m * nalgebra::Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(p.xyz(), Vector3::new(1.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_transform_points_columnwise() {
        let pose = RigidTransform::new(yaw_rotation(FRAC_PI_2), Vector3::new(0.0, 0.0, 1.0));
        let pts = Matrix3xX::from_columns(&[Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 2.0, 0.0)]);
        let out = pose.transform_points(&pts);
        assert_relative_eq!(out.column(0).into_owned(), Vector3::new(0.0, 1.0, 1.0), epsilon = 1e-12);
        assert_relative_eq!(out.column(1).into_owned(), Vector3::new(-2.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_slerp_endpoints() {
        let q0 = quaternion_from_wxyz(&[0.9, 0.1, -0.2, 0.3]);
        let q1 = quaternion_from_wxyz(&[0.2, 0.5, 0.7, -0.1]);

        assert_relative_eq!(slerp(&q0, &q1, 0.0), q0, epsilon = 1e-12);
        assert_relative_eq!(slerp(&q0, &q1, 1.0).angle_to(&q1), 0.0, epsilon = 1e-7);
    }

    #[test]
    fn test_slerp_identical_orientations() {
        let q = quaternion_from_wxyz(&[0.5, 0.5, 0.5, 0.5]);
        assert_relative_eq!(slerp(&q, &q, 0.4), q, epsilon = 1e-12);
    }

    #[test]
    fn test_wxyz_roundtrip() {
        let wxyz = [0.5, -0.5, 0.5, 0.5];
        let q = quaternion_from_wxyz(&wxyz);
        let back = quaternion_to_wxyz(&q);
        for (a, b) in wxyz.iter().zip(back.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_renormalize_removes_drift() {
        let mut pose = RigidTransform::identity();
        let step = yaw_rotation(0.001);
        for _ in 0..10_000 {
            pose.rotate(&step);
        }
        pose.renormalize();
        assert_relative_eq!(pose.rotation.into_inner().norm(), 1.0, epsilon = 1e-12);
    }

    proptest! {
        #[test]
        fn prop_inverse_roundtrip(
            w in -1.0f64..1.0, x in -1.0f64..1.0, y in -1.0f64..1.0, z in -1.0f64..1.0,
            tx in -100.0f64..100.0, ty in -100.0f64..100.0, tz in -100.0f64..100.0,
            px in -50.0f64..50.0, py in -50.0f64..50.0, pz in -50.0f64..50.0,
        ) {
            prop_assume!(w * w + x * x + y * y + z * z > 1e-3);
            let pose = RigidTransform::new(quaternion_from_wxyz(&[w, x, y, z]), Vector3::new(tx, ty, tz));
            let p = Vector3::new(px, py, pz);
            let back = pose.inverse().transform_point(&pose.transform_point(&p));
            prop_assert!((back - p).norm() < 1e-8);
        }
    }
}
