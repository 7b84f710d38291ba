//! Ray/torus inside intervals (quartic equation).
//!
//! The torus is `f(P) = (|P|^2 - (R^2 + r^2))^2 - 4 R^2 (r^2 - (P . a)^2) <= 0`
//! in coordinates centered on the torus. Substituting the ray gives a quartic
//! in `t`, solved with Ferrari's method and polished with Newton steps. The
//! ray origin is first moved to its closest approach to the center so the
//! coefficients stay well scaled for distant rays.

use crate::interval::{Interval, IntervalList, MaterialId};
use csgvm_math::{Dir3, Point3, Ray, Tolerance, Vec3};

/// Intervals where the ray line is inside the torus. At most two.
pub fn intersect_torus(
    ray: &Ray,
    center: &Point3,
    axis: &Dir3,
    major_radius: f64,
    minor_radius: f64,
    material: MaterialId,
    tol: &Tolerance,
) -> IntervalList {
    let big_r2 = major_radius * major_radius;
    let small_r2 = minor_radius * minor_radius;
    let a_vec = axis.as_ref();
    let d = ray.direction.as_ref();

    let t_shift = (center - ray.origin).dot(d);
    let o = ray.origin + t_shift * d - center;

    let od = o.dot(d);
    let oo = o.dot(&o);
    let dd = d.dot(d);
    let oa = o.dot(a_vec);
    let da = d.dot(a_vec);

    let k = oo - (big_r2 + small_r2);
    let c4 = dd * dd;
    let c3 = 4.0 * dd * od;
    let c2 = 2.0 * dd * k + 4.0 * od * od + 4.0 * big_r2 * da * da;
    let c1 = 4.0 * k * od + 8.0 * big_r2 * oa * da;
    let c0 = k * k - 4.0 * big_r2 * (small_r2 - oa * oa);

    let mut roots = solve_quartic(c4, c3, c2, c1, c0);
    roots.sort();

    let implicit = |p: &Vec3| {
        let pa = p.dot(a_vec);
        let s = p.norm_squared() - (big_r2 + small_r2);
        s * s - 4.0 * big_r2 * (small_r2 - pa * pa)
    };
    let normal = |s: f64| {
        let p = o + s * d;
        let pa = p.dot(a_vec);
        let g = 4.0 * (p.norm_squared() - (big_r2 + small_r2)) * p + 8.0 * big_r2 * pa * a_vec;
        let len = g.norm();
        if len > 0.0 {
            g / len
        } else {
            g
        }
    };

    let mut out = IntervalList::new();
    let mut open: Option<f64> = None;
    let rs = roots.as_slice();
    for pair in rs.windows(2) {
        let (s0, s1) = (pair[0], pair[1]);
        let inside = s1 > s0 && implicit(&(o + (0.5 * (s0 + s1)) * d)) < 0.0;
        match (inside, open) {
            (true, None) => open = Some(s0),
            (false, Some(start)) => {
                push_span(&mut out, start, s0, t_shift, &normal, material, tol);
                open = None;
            }
            _ => {}
        }
    }
    if let (Some(start), Some(&last)) = (open, rs.last()) {
        push_span(&mut out, start, last, t_shift, &normal, material, tol);
    }
    out
}

fn push_span(
    out: &mut IntervalList,
    s0: f64,
    s1: f64,
    t_shift: f64,
    normal: &impl Fn(f64) -> Vec3,
    material: MaterialId,
    tol: &Tolerance,
) {
    let (t0, t1) = (s0 + t_shift, s1 + t_shift);
    if tol.is_degenerate_span(t0, t1) {
        return;
    }
    out.push(Interval::new(t0, t1, normal(s0), normal(s1), material));
}

/// Up to four real roots, stored inline.
#[derive(Debug, Clone, Copy, Default)]
struct Roots {
    vals: [f64; 4],
    len: usize,
}

impl Roots {
    fn push(&mut self, v: f64) {
        if self.len < 4 && v.is_finite() {
            self.vals[self.len] = v;
            self.len += 1;
        }
    }

    fn as_slice(&self) -> &[f64] {
        &self.vals[..self.len]
    }

    fn sort(&mut self) {
        self.vals[..self.len].sort_by(f64::total_cmp);
    }
}

/// Real roots of `a x^4 + b x^3 + c x^2 + d x + e`.
fn solve_quartic(a: f64, b: f64, c: f64, d: f64, e: f64) -> Roots {
    let mut roots = Roots::default();
    if a.abs() < 1e-300 {
        return roots;
    }

    // x^4 + p x^3 + q x^2 + r x + s
    let (p, q, r, s) = (b / a, c / a, d / a, e / a);

    // Depressed quartic y^4 + a2 y^2 + a1 y + a0 via x = y - p/4
    let p2 = p * p;
    let a2 = q - 3.0 * p2 / 8.0;
    let a1 = r - p * q / 2.0 + p2 * p / 8.0;
    let a0 = s - p * r / 4.0 + p2 * q / 16.0 - 3.0 * p2 * p2 / 256.0;
    let shift = -p / 4.0;

    let scale = a2.abs().max(a1.abs().sqrt()).max(a0.abs().sqrt()).max(1.0);
    if a1.abs() <= 1e-14 * scale * scale.sqrt() {
        // Biquadratic: z^2 + a2 z + a0 with z = y^2
        for z in quadratic_roots(1.0, a2, a0).into_iter().flatten() {
            if z >= 0.0 {
                let y = z.sqrt();
                roots.push(y + shift);
                if y > 0.0 {
                    roots.push(-y + shift);
                }
            }
        }
    } else {
        // Resolvent 8 m^3 + 8 a2 m^2 + (2 a2^2 - 8 a0) m - a1^2 = 0 has a
        // positive root since a1 != 0.
        let m = largest_cubic_root(a2, a2 * a2 / 4.0 - a0, -a1 * a1 / 8.0).max(0.0);
        let sq = (2.0 * m).sqrt();
        if sq > 0.0 {
            let base = a2 / 2.0 + m;
            let skew = a1 / (2.0 * sq);
            // (y^2 + a2/2 + m)^2 = (sq y - a1 / (2 sq))^2
            for y in quadratic_roots(1.0, -sq, base + skew).into_iter().flatten() {
                roots.push(y + shift);
            }
            for y in quadratic_roots(1.0, sq, base - skew).into_iter().flatten() {
                roots.push(y + shift);
            }
        }
    }

    for v in &mut roots.vals[..roots.len] {
        *v = polish(*v, [a, b, c, d, e]);
    }
    roots
}

/// Newton refinement on `coeffs[0] x^4 + ... + coeffs[4]`.
fn polish(mut x: f64, coeffs: [f64; 5]) -> f64 {
    for _ in 0..3 {
        let mut f = 0.0;
        let mut df = 0.0;
        for &c in &coeffs {
            df = df * x + f;
            f = f * x + c;
        }
        if df.abs() < 1e-300 {
            break;
        }
        let step = f / df;
        if !step.is_finite() {
            break;
        }
        x -= step;
    }
    x
}

/// Real roots of `a x^2 + b x + c` (with `a != 0`), smaller first.
fn quadratic_roots(a: f64, b: f64, c: f64) -> [Option<f64>; 2] {
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return [None, None];
    }
    let sq = disc.sqrt();
    let q = -0.5 * (b + b.signum() * sq);
    let (mut r1, mut r2) = if q != 0.0 { (q / a, c / q) } else { (0.0, 0.0) };
    if r1 > r2 {
        std::mem::swap(&mut r1, &mut r2);
    }
    [Some(r1), Some(r2)]
}

/// Largest real root of `x^3 + b x^2 + c x + d`.
fn largest_cubic_root(b: f64, c: f64, d: f64) -> f64 {
    let q = (3.0 * c - b * b) / 9.0;
    let r = (9.0 * b * c - 27.0 * d - 2.0 * b * b * b) / 54.0;
    let disc = q * q * q + r * r;

    let mut x = if disc >= 0.0 {
        let sq = disc.sqrt();
        (r + sq).cbrt() + (r - sq).cbrt() - b / 3.0
    } else {
        let theta = (r / (-q * q * q).sqrt()).clamp(-1.0, 1.0).acos();
        2.0 * (-q).sqrt() * (theta / 3.0).cos() - b / 3.0
    };

    for _ in 0..2 {
        let f = ((x + b) * x + c) * x + d;
        let df = (3.0 * x + 2.0 * b) * x + c;
        if df.abs() < 1e-300 {
            break;
        }
        x -= f / df;
    }
    x
}
