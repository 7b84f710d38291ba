//! Ray/sphere inside interval (quadratic equation).

use super::quadratic_inside;
use crate::interval::{IntervalList, MaterialId};
use csgvm_math::{Point3, Ray, Tolerance};

/// Interval where the ray line is inside the sphere.
///
/// Returns zero or one interval. Tangent rays produce an empty list.
pub fn intersect_sphere(
    ray: &Ray,
    center: &Point3,
    radius: f64,
    material: MaterialId,
    tol: &Tolerance,
) -> IntervalList {
    let oc = ray.origin - center;
    let d = ray.direction.as_ref();

    // |oc + t*d|^2 - r^2 <= 0
    let a = d.dot(d);
    let b = 2.0 * oc.dot(d);
    let c = oc.dot(&oc) - radius * radius;

    let [span, _] = quadratic_inside(a, b, c, |t| ray.at(t) - center);
    let mut out = IntervalList::new();
    if let Some(iv) = span.and_then(|s| s.into_interval(material, tol)) {
        out.push(iv);
    }
    out
}
