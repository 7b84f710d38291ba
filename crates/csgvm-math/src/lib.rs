#![warn(missing_docs)]

//! Math types for the csgvm CSG evaluation engine.
//!
//! Thin wrappers around nalgebra providing the domain types shared by every
//! layer: points, vectors, directions, affine transforms, tolerances,
//! axis-aligned boxes and rays.

mod aabb;
mod ray;

pub use aabb::Aabb3;
pub use ray::Ray;

use nalgebra::{Matrix3, Matrix4, Rotation3, Unit, Vector3};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// Affine placement stored as a homogeneous 4x4 matrix.
///
/// The bottom row is assumed to be `[0, 0, 0, 1]`; every constructor here
/// keeps it that way.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Homogeneous matrix, column vectors on the right.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// No-op placement.
    pub fn identity() -> Self {
        Self::from_matrix(Matrix4::identity())
    }

    /// Wrap a homogeneous affine matrix.
    pub fn from_matrix(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }

    /// Move by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        Self::from_matrix(Matrix4::new_translation(&Vec3::new(dx, dy, dz)))
    }

    /// Per-axis scale factors.
    pub fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self::from_matrix(Matrix4::new_nonuniform_scaling(&Vec3::new(sx, sy, sz)))
    }

    /// Right-handed rotation of `angle` radians about `axis`.
    pub fn rotation(axis: &Dir3, angle: f64) -> Self {
        Self::from_matrix(Rotation3::from_axis_angle(axis, angle).to_homogeneous())
    }

    /// Rotation about +X.
    pub fn rotation_x(angle: f64) -> Self {
        Self::rotation(&Vec3::x_axis(), angle)
    }

    /// Rotation about +Z.
    pub fn rotation_z(angle: f64) -> Self {
        Self::rotation(&Vec3::z_axis(), angle)
    }

    /// Matrix product `self * other`: points go through `other` first.
    pub fn then(&self, other: &Transform) -> Self {
        Self::from_matrix(self.matrix * other.matrix)
    }

    /// The 3x3 block acting on vectors.
    pub fn linear(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    fn offset(&self) -> Vec3 {
        self.matrix.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Map a position.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        Point3::from(self.linear() * p.coords + self.offset())
    }

    /// Map a displacement; translation does not apply.
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        self.linear() * v
    }

    /// Map a surface normal with the inverse transpose of [`Self::linear`].
    ///
    /// The result keeps whatever length the mapping gives it. A singular
    /// linear part returns `n` unchanged.
    pub fn apply_normal(&self, n: &Vec3) -> Vec3 {
        self.linear()
            .try_inverse()
            .map_or(*n, |inv| inv.transpose() * n)
    }

    /// The undoing transform, `None` when singular.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(Self::from_matrix)
    }

    /// False if any entry is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.matrix.iter().all(|v| v.is_finite())
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Tolerance constants for ray/interval comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Intervals shorter than this along the ray are treated as tangent grazes.
    pub degenerate: f64,
    /// Offset applied to the start of secondary rays to avoid re-hitting the
    /// surface they leave from.
    pub ray_offset: f64,
}

impl Tolerance {
    /// Default tolerances (1e-9 degenerate span, 1e-6 ray offset).
    pub const DEFAULT: Self = Self {
        degenerate: 1e-9,
        ray_offset: 1e-6,
    };

    /// Check if an interval span is too short to be a real crossing.
    pub fn is_degenerate_span(&self, t_min: f64, t_max: f64) -> bool {
        !(t_max - t_min > self.degenerate)
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn close(a: Point3, b: Point3) -> bool {
        (a - b).norm() < 1e-12
    }

    #[test]
    fn test_translation_moves_points_not_vectors() {
        let t = Transform::translation(3.0, -2.0, 0.5);
        assert!(close(t.apply_point(&Point3::new(1.0, 1.0, 1.0)), Point3::new(4.0, -1.0, 1.5)));
        let v = Vec3::new(0.0, 1.0, 0.0);
        assert!((t.apply_vec(&v) - v).norm() < 1e-12);
        assert!((t.apply_normal(&v) - v).norm() < 1e-12);
    }

    #[test]
    fn test_quarter_turns() {
        let z = Transform::rotation_z(FRAC_PI_2);
        assert!(close(z.apply_point(&Point3::new(1.0, 0.0, 0.0)), Point3::new(0.0, 1.0, 0.0)));
        let x = Transform::rotation_x(FRAC_PI_2);
        assert!(close(x.apply_point(&Point3::new(0.0, 1.0, 0.0)), Point3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_then_applies_right_operand_first() {
        let moved_then_doubled = Transform::scale(2.0, 2.0, 2.0).then(&Transform::translation(1.0, 0.0, 0.0));
        assert!(close(moved_then_doubled.apply_point(&Point3::origin()), Point3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_inverse_round_trips() {
        let t = Transform::translation(1.0, 2.0, 3.0)
            .then(&Transform::rotation_z(0.7))
            .then(&Transform::scale(2.0, 1.0, 0.5));
        let inv = t.inverse().unwrap();
        let p = Point3::new(-4.0, 0.25, 9.0);
        assert!(close(inv.apply_point(&t.apply_point(&p)), p));
        assert!(Transform::scale(1.0, 0.0, 1.0).inverse().is_none());
    }

    #[test]
    fn test_normal_stays_perpendicular_under_squash() {
        let t = Transform::scale(4.0, 1.0, 1.0);
        let n = t.apply_normal(&Vec3::new(1.0, 1.0, 0.0));
        let tangent = t.apply_vec(&Vec3::new(1.0, -1.0, 0.0));
        assert!(n.dot(&tangent).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_detected() {
        let mut t = Transform::identity();
        assert!(t.is_finite());
        t.matrix[(2, 3)] = f64::INFINITY;
        assert!(!t.is_finite());
    }

    #[test]
    fn test_degenerate_span() {
        let tol = Tolerance::DEFAULT;
        assert!(tol.is_degenerate_span(1.0, 1.0));
        assert!(tol.is_degenerate_span(1.0, 1.0 + 1e-12));
        assert!(!tol.is_degenerate_span(1.0, 1.1));
        assert!(tol.is_degenerate_span(f64::NAN, 1.0));
    }
}
