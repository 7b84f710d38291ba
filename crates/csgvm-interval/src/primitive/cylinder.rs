//! Ray/capped-cylinder inside interval.
//!
//! The solid is the infinite cylinder `|P_perp| <= r` clipped by the slab
//! `0 <= (P - base) . axis <= height`.

use super::{quadratic_inside, slab};
use crate::interval::{IntervalList, MaterialId};
use csgvm_math::{Dir3, Point3, Ray, Tolerance};

/// Interval where the ray line is inside the capped cylinder.
pub fn intersect_cylinder(
    ray: &Ray,
    base: &Point3,
    axis: &Dir3,
    radius: f64,
    height: f64,
    material: MaterialId,
    tol: &Tolerance,
) -> IntervalList {
    let a_vec = axis.as_ref();
    let d = ray.direction.as_ref();
    let w = ray.origin - base;

    let mut out = IntervalList::new();
    let Some(caps) = slab(w.dot(a_vec), d.dot(a_vec), 0.0, height, a_vec) else {
        return out;
    };

    // Project onto the plane perpendicular to the axis:
    // |w_perp + t*d_perp|^2 - r^2 <= 0
    let d_perp = d - d.dot(a_vec) * a_vec;
    let w_perp = w - w.dot(a_vec) * a_vec;
    let qa = d_perp.dot(&d_perp);
    let qb = 2.0 * w_perp.dot(&d_perp);
    let qc = w_perp.dot(&w_perp) - radius * radius;

    let [side, _] = quadratic_inside(qa, qb, qc, |t| {
        let p = ray.at(t) - base;
        p - p.dot(a_vec) * a_vec
    });

    if let Some(iv) = side
        .and_then(|s| s.clip(caps))
        .and_then(|s| s.into_interval(material, tol))
    {
        out.push(iv);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use csgvm_math::Vec3;

    fn z_cylinder(ray: &Ray) -> IntervalList {
        // Radius 2, z from 0 to 4.
        intersect_cylinder(
            ray,
            &Point3::origin(),
            &Vec3::z_axis(),
            2.0,
            4.0,
            MaterialId(1),
            &Tolerance::DEFAULT,
        )
    }

    #[test]
    fn test_cylinder_side_hit() {
        let ray = Ray::new(Point3::new(-5.0, 0.0, 1.0), Vec3::x());
        let list = z_cylinder(&ray);
        assert_eq!(list.len(), 1);
        let iv = list.as_slice()[0];
        assert!((iv.t_min - 3.0).abs() < 1e-10);
        assert!((iv.t_max - 7.0).abs() < 1e-10);
        assert!((iv.normal_min + Vec3::x()).norm() < 1e-10);
        assert!((iv.normal_max - Vec3::x()).norm() < 1e-10);
    }

    #[test]
    fn test_cylinder_along_axis_hits_caps() {
        let ray = Ray::new(Point3::new(0.5, 0.0, -3.0), Vec3::z());
        let list = z_cylinder(&ray);
        assert_eq!(list.len(), 1);
        let iv = list.as_slice()[0];
        assert!((iv.t_min - 3.0).abs() < 1e-10);
        assert!((iv.t_max - 7.0).abs() < 1e-10);
        assert_eq!(iv.normal_min, -Vec3::z());
        assert_eq!(iv.normal_max, Vec3::z());
    }

    #[test]
    fn test_cylinder_parallel_outside_misses() {
        let ray = Ray::new(Point3::new(3.0, 0.0, -3.0), Vec3::z());
        assert!(z_cylinder(&ray).is_empty());
    }

    #[test]
    fn test_cylinder_side_ray_above_caps_misses() {
        let ray = Ray::new(Point3::new(-5.0, 0.0, 5.0), Vec3::x());
        assert!(z_cylinder(&ray).is_empty());
    }

    #[test]
    fn test_cylinder_oblique_enters_side_exits_cap() {
        // Starts outside the side at z=2, climbs at 45 degrees.
        let ray = Ray::new(Point3::new(-3.0, 0.0, 2.0), Vec3::new(1.0, 0.0, 1.0));
        let iv = z_cylinder(&ray).as_slice()[0];
        let s = std::f64::consts::SQRT_2;
        assert!((iv.t_min - s).abs() < 1e-10);
        assert!((iv.t_max - 2.0 * s).abs() < 1e-10);
        assert!((iv.normal_min + Vec3::x()).norm() < 1e-10);
        assert!((iv.normal_max - Vec3::z()).norm() < 1e-10);
    }

    #[test]
    fn test_cylinder_tilted_axis() {
        // Axis along +x, ray along -y through the middle.
        let list = intersect_cylinder(
            &Ray::new(Point3::new(1.0, 5.0, 0.0), -Vec3::y()),
            &Point3::origin(),
            &Vec3::x_axis(),
            1.0,
            2.0,
            MaterialId(0),
            &Tolerance::DEFAULT,
        );
        let iv = list.as_slice()[0];
        assert!((iv.t_min - 4.0).abs() < 1e-10);
        assert!((iv.t_max - 6.0).abs() < 1e-10);
        assert!((iv.normal_min - Vec3::y()).norm() < 1e-10);
    }
}
