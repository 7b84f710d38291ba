//! Ray/box inside interval (slab method).

use super::{slab, Span};
use crate::interval::{IntervalList, MaterialId};
use csgvm_math::{Point3, Ray, Tolerance, Vec3};

/// Interval where the ray line is inside the axis-aligned box.
///
/// The entry and exit normals are the face normals of the last slab entered
/// and the first slab left.
pub fn intersect_box(
    ray: &Ray,
    center: &Point3,
    half_extents: &Vec3,
    material: MaterialId,
    tol: &Tolerance,
) -> IntervalList {
    let axes = [Vec3::x(), Vec3::y(), Vec3::z()];
    let mut span = Span::full();
    for (i, axis) in axes.iter().enumerate() {
        let Some(s) = slab(
            ray.origin[i],
            ray.direction[i],
            center[i] - half_extents[i],
            center[i] + half_extents[i],
            axis,
        ) else {
            return IntervalList::new();
        };
        match span.clip(s) {
            Some(clipped) => span = clipped,
            None => return IntervalList::new(),
        }
    }

    let mut out = IntervalList::new();
    if let Some(iv) = span.into_interval(material, tol) {
        out.push(iv);
    }
    out
}
