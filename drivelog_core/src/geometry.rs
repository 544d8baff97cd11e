//! 3D boxes, camera projection and box-in-image visibility.

use nalgebra::{Matrix3, Matrix3x4, Matrix3xX, Matrix4, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::records::Token;
use crate::transform::RigidTransform;

/// Minimum depth (meters) for a corner to count as in front of the camera.
pub const FRONT_PLANE_DEPTH: f64 = 0.1;

/// Minimum depth (meters) for a projected corner to count as visible.
pub const VISIBLE_DEPTH: f64 = 1.0;

// ============================================================================
// BOX
// ============================================================================

/// An oriented 3D bounding box with its annotation identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Box3D {
    /// Center in the box's current frame
    pub center: Vector3<f64>,
    /// Width, length, height (meters)
    pub wlh: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
    /// Category name
    pub name: String,
    /// Source annotation token
    pub token: Token,
    /// Velocity in the box's current frame; NaN when unknown
    pub velocity: Vector3<f64>,
}

impl Box3D {
    pub fn new(
        center: Vector3<f64>,
        wlh: Vector3<f64>,
        orientation: UnitQuaternion<f64>,
        name: impl Into<String>,
        token: impl Into<Token>,
    ) -> Self {
        Self {
            center,
            wlh,
            orientation,
            name: name.into(),
            token: token.into(),
            velocity: Vector3::repeat(f64::NAN),
        }
    }

    /// Shifts the center by `delta`.
    pub fn translate(&mut self, delta: &Vector3<f64>) {
        self.center += delta;
    }

    /// Rotates the box about the frame origin.
    pub fn rotate(&mut self, q: &UnitQuaternion<f64>) {
        self.center = q * self.center;
        self.orientation = q * self.orientation;
        self.velocity = q * self.velocity;
    }

    /// Moves the box into a new frame: rotate, then translate.
    pub fn transform(&mut self, pose: &RigidTransform) {
        self.rotate(&pose.rotation);
        self.translate(&pose.translation);
    }

    /// Box frame → current frame.
    pub fn pose(&self) -> RigidTransform {
        RigidTransform::new(self.orientation, self.center)
    }

    /// The 8 corners as columns. First four face forward (+x in the box
    /// frame), last four face backward.
    pub fn corners(&self) -> Matrix3xX<f64> {
        self.scaled_corners(1.0)
    }

    pub fn scaled_corners(&self, wlh_factor: f64) -> Matrix3xX<f64> {
        let w = self.wlh.x * wlh_factor / 2.0;
        let l = self.wlh.y * wlh_factor / 2.0;
        let h = self.wlh.z * wlh_factor / 2.0;

        let xs = [l, l, l, l, -l, -l, -l, -l];
        let ys = [w, -w, -w, w, w, -w, -w, w];
        let zs = [h, h, -h, -h, h, h, -h, -h];

        let local = Matrix3xX::from_fn(8, |r, c| match r {
            0 => xs[c],
            1 => ys[c],
            _ => zs[c],
        });
        self.pose().transform_points(&local)
    }

    /// The four bottom corners (ground contact face).
    pub fn bottom_corners(&self) -> Matrix3x4<f64> {
        let c = self.corners();
        Matrix3x4::from_columns(&[c.column(2), c.column(3), c.column(7), c.column(6)])
    }
}

// ============================================================================
// PROJECTION
// ============================================================================

/// Embeds a 3×3 intrinsic in the top-left of a 4×4 identity.
pub fn pad_view(view: &Matrix3<f64>) -> Matrix4<f64> {
    let mut m = Matrix4::identity();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(view);
    m
}

/// Applies a projective `view` to 3×N points.
///
/// With `normalize`, rows are divided by depth (row 2), giving pixel
/// coordinates for a camera intrinsic.
pub fn view_points(points: &Matrix3xX<f64>, view: &Matrix4<f64>, normalize: bool) -> Matrix3xX<f64> {
    let mut out = Matrix3xX::zeros(points.ncols());
    for (i, p) in points.column_iter().enumerate() {
        let h = view * nalgebra::Vector4::new(p[0], p[1], p[2], 1.0);
        let mut q = h.xyz();
        if normalize {
            let depth = q.z;
            q /= depth;
        }
        out.set_column(i, &q);
    }
    out
}

// ============================================================================
// VISIBILITY
// ============================================================================

/// How much of a box must fall inside the image for it to be kept.
///
/// Every policy also requires the box to reach past the camera's front
/// plane: at least one corner `FRONT_PLANE_DEPTH` meters ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoxVisibility {
    /// All corners project inside the image
    All,
    /// At least one corner projects inside the image
    #[default]
    Any,
    /// All corners lie in front of the camera, image bounds ignored
    InFront,
    /// Only the front-plane requirement
    Always,
}

/// Decides whether a camera-frame box counts as visible.
pub trait BoxVisibilityCheck {
    fn is_visible(
        &self,
        b: &Box3D,
        intrinsic: &Matrix3<f64>,
        image_size: (u32, u32),
        policy: BoxVisibility,
    ) -> bool;
}

/// Corner-projection check against the image rectangle.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrustumCheck;

impl BoxVisibilityCheck for FrustumCheck {
    fn is_visible(
        &self,
        b: &Box3D,
        intrinsic: &Matrix3<f64>,
        image_size: (u32, u32),
        policy: BoxVisibility,
    ) -> bool {
        box_in_image(b, intrinsic, image_size, policy)
    }
}

/// True when `b` (in the camera frame) satisfies `policy`.
///
/// Boxes centered at or behind the focal point, or with no corner past the
/// front plane, fail every policy.
pub fn box_in_image(
    b: &Box3D,
    intrinsic: &Matrix3<f64>,
    image_size: (u32, u32),
    policy: BoxVisibility,
) -> bool {
    if b.center.z <= 0.0 {
        return false;
    }

    let corners = b.corners();
    let in_front: Vec<bool> = corners.row(2).iter().map(|z| *z > FRONT_PLANE_DEPTH).collect();
    if !in_front.iter().any(|f| *f) {
        return false;
    }

    let (width, height) = (image_size.0 as f64, image_size.1 as f64);
    let projected = view_points(&corners, &pad_view(intrinsic), true);
    let visible: Vec<bool> = (0..corners.ncols())
        .map(|i| {
            let (x, y) = (projected[(0, i)], projected[(1, i)]);
            x > 0.0 && x < width && y > 0.0 && y < height && corners[(2, i)] > VISIBLE_DEPTH
        })
        .collect();

    match policy {
        BoxVisibility::All => visible.iter().all(|v| *v),
        BoxVisibility::Any => visible.iter().any(|v| *v),
        BoxVisibility::InFront => in_front.iter().all(|f| *f),
        BoxVisibility::Always => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::transform::yaw_rotation;

    fn intrinsic() -> Matrix3<f64> {
        Matrix3::new(1000.0, 0.0, 800.0, 0.0, 1000.0, 600.0, 0.0, 0.0, 1.0)
    }

    fn unit_box_at(center: Vector3<f64>) -> Box3D {
        Box3D::new(center, Vector3::new(1.0, 1.0, 1.0), UnitQuaternion::identity(), "car", "ann")
    }

    #[test]
    fn test_corners_layout() {
        let b = Box3D::new(
            Vector3::zeros(),
            Vector3::new(2.0, 4.0, 1.0),
            UnitQuaternion::identity(),
            "car",
            "a",
        );
        let c = b.corners();
        assert_eq!(c.ncols(), 8);
        assert_relative_eq!(c.column(0).into_owned(), Vector3::new(2.0, 1.0, 0.5));
        assert_relative_eq!(c.column(6).into_owned(), Vector3::new(-2.0, -1.0, -0.5));

        let bottom = b.bottom_corners();
        for z in bottom.row(2).iter() {
            assert_relative_eq!(*z, -0.5);
        }
    }

    #[test]
    fn test_rotate_carries_velocity() {
        let mut b = unit_box_at(Vector3::new(1.0, 0.0, 0.0));
        b.velocity = Vector3::new(1.0, 0.0, 0.0);
        b.rotate(&yaw_rotation(std::f64::consts::FRAC_PI_2));
        assert_relative_eq!(b.center, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(b.velocity, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_view_points_normalizes_depth() {
        let pts = Matrix3xX::from_columns(&[Vector3::new(1.0, 0.5, 10.0)]);
        let out = view_points(&pts, &pad_view(&intrinsic()), true);
        assert_relative_eq!(out[(0, 0)], 900.0);
        assert_relative_eq!(out[(1, 0)], 650.0);
        assert_relative_eq!(out[(2, 0)], 1.0);
    }

    #[test]
    fn test_box_ahead_is_visible() {
        let b = unit_box_at(Vector3::new(0.0, 0.0, 10.0));
        for policy in [BoxVisibility::All, BoxVisibility::Any, BoxVisibility::InFront, BoxVisibility::Always] {
            assert!(box_in_image(&b, &intrinsic(), (1600, 1200), policy));
        }
    }

    #[test]
    fn test_box_behind_camera_rejected_for_every_policy() {
        let b = unit_box_at(Vector3::new(0.0, 0.0, -10.0));
        for policy in [BoxVisibility::All, BoxVisibility::Any, BoxVisibility::InFront, BoxVisibility::Always] {
            assert!(!box_in_image(&b, &intrinsic(), (1600, 1200), policy));
        }
    }

    #[test]
    fn test_partially_outside_image() {
        // Straddles the right image edge at 10 m depth.
        let b = Box3D::new(
            Vector3::new(8.0, 0.0, 10.0),
            Vector3::new(1.0, 1.0, 1.0),
            UnitQuaternion::identity(),
            "car",
            "a",
        );
        assert!(box_in_image(&b, &intrinsic(), (1600, 1200), BoxVisibility::Any));
        assert!(!box_in_image(&b, &intrinsic(), (1600, 1200), BoxVisibility::All));
    }

    #[test]
    fn test_straddling_front_plane() {
        let b = unit_box_at(Vector3::new(0.0, 0.0, 0.3));
        assert!(box_in_image(&b, &intrinsic(), (1600, 1200), BoxVisibility::Always));
        assert!(!box_in_image(&b, &intrinsic(), (1600, 1200), BoxVisibility::InFront));
    }

    #[test]
    fn test_tall_box_centered_behind_camera_rejected() {
        // Extends 1.5 m past the focal point along the optical axis.
        let b = Box3D::new(
            Vector3::new(0.0, 0.0, -0.5),
            Vector3::new(0.5, 0.5, 4.0),
            UnitQuaternion::identity(),
            "car",
            "a",
        );
        assert!(b.corners().row(2).iter().any(|z| *z > 1.0));
        for policy in [BoxVisibility::All, BoxVisibility::Any, BoxVisibility::InFront, BoxVisibility::Always] {
            assert!(!box_in_image(&b, &intrinsic(), (1600, 1200), policy));
        }
    }
}
