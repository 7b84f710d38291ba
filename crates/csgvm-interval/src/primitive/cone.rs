//! Ray/solid-cone inside interval.
//!
//! With `h = (P - base) . axis` and `k = radius / height`, the solid is
//! `|P_perp|^2 <= k^2 (height - h)^2` restricted to `0 <= h <= height`. The
//! quadratic alone describes a double cone; the slab keeps the lower nappe.

use super::{quadratic_inside, slab};
use crate::interval::{IntervalList, MaterialId};
use csgvm_math::{Dir3, Point3, Ray, Tolerance};

/// Interval where the ray line is inside the cone.
pub fn intersect_cone(
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
    let k2 = (radius / height).powi(2);

    let mut out = IntervalList::new();
    let wa = w.dot(a_vec);
    let da = d.dot(a_vec);
    let Some(caps) = slab(wa, da, 0.0, height, a_vec) else {
        return out;
    };

    let d_perp = d - da * a_vec;
    let w_perp = w - wa * a_vec;
    let rest = height - wa;
    let qa = d_perp.dot(&d_perp) - k2 * da * da;
    let qb = 2.0 * (w_perp.dot(&d_perp) + k2 * rest * da);
    let qc = w_perp.dot(&w_perp) - k2 * rest * rest;

    let spans = quadratic_inside(qa, qb, qc, |t| {
        let p = ray.at(t) - base;
        let h = p.dot(a_vec);
        let g = 2.0 * (p - h * a_vec) + 2.0 * k2 * (height - h) * a_vec;
        // Apex: the gradient vanishes, fall back to the axis.
        if g.norm_squared() < 1e-24 {
            a_vec.into_owned()
        } else {
            g
        }
    });

    for span in spans.into_iter().flatten() {
        if let Some(iv) = span
            .clip(caps)
            .and_then(|s| s.into_interval(material, tol))
        {
            out.push(iv);
        }
    }
    out
}
