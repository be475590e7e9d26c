//! Mathematical type aliases and projection helpers.

use nalgebra::{Matrix4, Point2, Point3, Vector2, Vector3, Vector4};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 2D vector with [`Real`] components.
pub type Vec2 = Vector2<Real>;
/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 2D point with [`Real`] coordinates.
pub type Pt2 = Point2<Real>;
/// 3D point with [`Real`] coordinates.
pub type Pt3 = Point3<Real>;
/// 4×4 matrix with [`Real`] entries.
pub type Mat4 = Matrix4<Real>;

/// Apply a 4×4 world-to-screen transform to a 3D point and collapse the
/// homogeneous coordinate.
///
/// Returns the projected 2D position in normalized screen space. The caller
/// is responsible for supplying a transform whose `w` row does not vanish at
/// the given point.
pub fn project_point(world_to_screen: &Mat4, point: &Pt3) -> Pt2 {
    let h = world_to_screen * Vector4::new(point.x, point.y, point.z, 1.0);
    Pt2::new(h.x / h.w, h.y / h.w)
}
