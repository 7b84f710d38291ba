//! Rays and the ray/box slab test.

use crate::{Aabb3, Dir3, Point3, Vec3};

/// Half-line `origin + t * direction` with a unit direction.
///
/// Keeps the componentwise reciprocal of the direction so box tests are
/// multiplications only.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// Start point.
    pub origin: Point3,
    /// Unit direction.
    pub direction: Dir3,
    recip: Vec3,
}

impl Ray {
    /// Ray towards `direction`, normalized here.
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        Self::from_dir(origin, Dir3::new_normalize(direction))
    }

    /// Ray along an already unit direction.
    pub fn from_dir(origin: Point3, direction: Dir3) -> Self {
        Self {
            origin,
            direction,
            recip: direction.map(f64::recip),
        }
    }

    /// Point at parameter `t`.
    #[inline]
    pub fn at(&self, t: f64) -> Point3 {
        self.origin + self.direction.as_ref() * t
    }

    /// Parameter span of the ray inside `aabb`, clipped to `[t_min, t_max]`.
    ///
    /// `None` when the clipped span is empty. Either range end may be
    /// infinite.
    #[inline]
    pub fn intersect_aabb(&self, aabb: &Aabb3, t_min: f64, t_max: f64) -> Option<(f64, f64)> {
        if aabb.is_empty() {
            return None;
        }
        let mut near = t_min;
        let mut far = t_max;
        for axis in 0..3 {
            let a = (aabb.min[axis] - self.origin[axis]) * self.recip[axis];
            let b = (aabb.max[axis] - self.origin[axis]) * self.recip[axis];
            // NaN (parallel ray on a slab face) leaves the bounds untouched.
            near = near.max(a.min(b));
            far = far.min(a.max(b));
        }
        (near <= far).then_some((near, far))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Aabb3 {
        Aabb3::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
    }

    fn along_x(x: f64, y: f64, dx: f64) -> Ray {
        Ray::new(Point3::new(x, y, 0.5), Vec3::new(dx, 0.0, 0.0))
    }

    #[test]
    fn test_at_uses_unit_direction() {
        let ray = Ray::new(Point3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 3.0, 0.0));
        assert!((ray.at(2.0) - Point3::new(1.0, 2.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_slab_entry_and_exit() {
        let (near, far) = along_x(-5.0, 0.5, 1.0)
            .intersect_aabb(&unit_box(), 0.0, f64::INFINITY)
            .unwrap();
        assert!((near - 5.0).abs() < 1e-10);
        assert!((far - 6.0).abs() < 1e-10);
    }

    #[test]
    fn test_slab_misses() {
        let off_side = along_x(-5.0, 5.0, 1.0);
        assert!(off_side.intersect_aabb(&unit_box(), 0.0, f64::INFINITY).is_none());
        let facing_away = along_x(-5.0, 0.5, -1.0);
        assert!(facing_away.intersect_aabb(&unit_box(), 0.0, f64::INFINITY).is_none());
        let stops_short = along_x(-5.0, 0.5, 1.0);
        assert!(stops_short.intersect_aabb(&unit_box(), 0.0, 4.0).is_none());
        assert!(stops_short.intersect_aabb(&Aabb3::empty(), 0.0, 10.0).is_none());
    }

    #[test]
    fn test_origin_inside_clamps_to_range() {
        let ray = along_x(0.5, 0.5, 1.0);
        let (near, far) = ray.intersect_aabb(&unit_box(), 0.0, f64::INFINITY).unwrap();
        assert_eq!(near, 0.0);
        assert!((far - 0.5).abs() < 1e-10);

        let (near, far) = ray
            .intersect_aabb(&unit_box(), f64::NEG_INFINITY, f64::INFINITY)
            .unwrap();
        assert!((near + 0.5).abs() < 1e-10);
        assert!((far - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_diagonal_ray() {
        let ray = Ray::new(Point3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let (near, far) = ray.intersect_aabb(&unit_box(), 0.0, f64::INFINITY).unwrap();
        let s3 = 3f64.sqrt();
        assert!((near - s3).abs() < 1e-10);
        assert!((far - 2.0 * s3).abs() < 1e-10);
    }
}
