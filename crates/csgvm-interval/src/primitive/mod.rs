//! Analytic primitives and their ray/solid interval functions.
//!
//! Each primitive reports the parameter ranges where the ray line is inside
//! the solid. Ranges cover the whole line (negative `t` included), so a
//! point query can test `t = 0` directly. Convex primitives produce at most
//! one interval; the torus at most two. Spans shorter than
//! [`Tolerance::degenerate`] are tangent grazes and are dropped.

mod box3;
mod cone;
mod cylinder;
mod sphere;
mod torus;

pub use box3::intersect_box;
pub use cone::intersect_cone;
pub use cylinder::intersect_cylinder;
pub use sphere::intersect_sphere;
pub use torus::intersect_torus;

use crate::error::GeometryError;
use crate::interval::{Interval, IntervalList, MaterialId};
use csgvm_math::{Aabb3, Dir3, Point3, Ray, Tolerance, Vec3};

/// Shape discriminant, used by instructions and the cost model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// Sphere.
    Sphere,
    /// Axis-aligned box.
    Box,
    /// Capped cylinder.
    Cylinder,
    /// Solid cone.
    Cone,
    /// Torus.
    Torus,
}

impl PrimitiveKind {
    /// Relative evaluation cost, used to order commutative operands.
    pub fn cost(self) -> u32 {
        match self {
            PrimitiveKind::Sphere => 1,
            PrimitiveKind::Box => 2,
            PrimitiveKind::Cylinder | PrimitiveKind::Cone => 3,
            PrimitiveKind::Torus => 10,
        }
    }

    /// Lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Sphere => "sphere",
            PrimitiveKind::Box => "box",
            PrimitiveKind::Cylinder => "cylinder",
            PrimitiveKind::Cone => "cone",
            PrimitiveKind::Torus => "torus",
        }
    }
}

/// Shape parameters of a primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Sphere of `radius` around `center`.
    Sphere {
        /// Center point.
        center: Point3,
        /// Radius.
        radius: f64,
    },
    /// Axis-aligned box.
    Box {
        /// Center point.
        center: Point3,
        /// Half edge lengths along x, y, z.
        half_extents: Vec3,
    },
    /// Capped cylinder from `base` to `base + axis * height`.
    Cylinder {
        /// Center of the bottom cap.
        base: Point3,
        /// Unit axis.
        axis: Dir3,
        /// Radius.
        radius: f64,
        /// Length along the axis.
        height: f64,
    },
    /// Solid cone with its base disk at `base` and apex at
    /// `base + axis * height`.
    Cone {
        /// Center of the base disk.
        base: Point3,
        /// Unit axis, pointing from base to apex.
        axis: Dir3,
        /// Base radius.
        radius: f64,
        /// Distance from base to apex.
        height: f64,
    },
    /// Torus around `axis` through `center`.
    Torus {
        /// Center point.
        center: Point3,
        /// Unit axis of symmetry.
        axis: Dir3,
        /// Distance from the center to the tube center.
        major_radius: f64,
        /// Tube radius.
        minor_radius: f64,
    },
}

impl Shape {
    /// Sphere at `center`.
    pub fn sphere(center: Point3, radius: f64) -> Self {
        Shape::Sphere { center, radius }
    }

    /// Axis-aligned box centered at `center`.
    pub fn cuboid(center: Point3, half_extents: Vec3) -> Self {
        Shape::Box { center, half_extents }
    }

    /// Capped cylinder.
    pub fn cylinder(base: Point3, axis: Dir3, radius: f64, height: f64) -> Self {
        Shape::Cylinder {
            base,
            axis,
            radius,
            height,
        }
    }

    /// Solid cone.
    pub fn cone(base: Point3, axis: Dir3, radius: f64, height: f64) -> Self {
        Shape::Cone {
            base,
            axis,
            radius,
            height,
        }
    }

    /// Torus.
    pub fn torus(center: Point3, axis: Dir3, major_radius: f64, minor_radius: f64) -> Self {
        Shape::Torus {
            center,
            axis,
            major_radius,
            minor_radius,
        }
    }

    /// The shape discriminant.
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Shape::Sphere { .. } => PrimitiveKind::Sphere,
            Shape::Box { .. } => PrimitiveKind::Box,
            Shape::Cylinder { .. } => PrimitiveKind::Cylinder,
            Shape::Cone { .. } => PrimitiveKind::Cone,
            Shape::Torus { .. } => PrimitiveKind::Torus,
        }
    }

    /// Reject zero, negative or non-finite extents.
    pub fn validate(&self) -> Result<(), GeometryError> {
        let kind = self.kind();
        let fail = |reason: String| Err(GeometryError::Degenerate { kind, reason });
        let point_ok = |p: &Point3| p.iter().all(|v| v.is_finite());
        let axis_ok = |a: &Dir3| a.iter().all(|v| v.is_finite());
        let positive = |v: f64| v.is_finite() && v > 0.0;

        match *self {
            Shape::Sphere { center, radius } => {
                if !point_ok(&center) {
                    return fail("non-finite center".into());
                }
                if !positive(radius) {
                    return fail(format!("radius must be positive, got {radius}"));
                }
            }
            Shape::Box { center, half_extents } => {
                if !point_ok(&center) {
                    return fail("non-finite center".into());
                }
                if !half_extents.iter().all(|&h| positive(h)) {
                    return fail(format!(
                        "half extents must be positive, got ({}, {}, {})",
                        half_extents.x, half_extents.y, half_extents.z
                    ));
                }
            }
            Shape::Cylinder {
                base,
                axis,
                radius,
                height,
            }
            | Shape::Cone {
                base,
                axis,
                radius,
                height,
            } => {
                if !point_ok(&base) || !axis_ok(&axis) {
                    return fail("non-finite base or axis".into());
                }
                if !positive(radius) || !positive(height) {
                    return fail(format!(
                        "radius and height must be positive, got r={radius} h={height}"
                    ));
                }
            }
            Shape::Torus {
                center,
                axis,
                major_radius,
                minor_radius,
            } => {
                if !point_ok(&center) || !axis_ok(&axis) {
                    return fail("non-finite center or axis".into());
                }
                if !positive(major_radius) || !positive(minor_radius) {
                    return fail(format!(
                        "radii must be positive, got R={major_radius} r={minor_radius}"
                    ));
                }
            }
        }
        Ok(())
    }

    /// Conservative (for the box, sphere and torus exact) local bounds.
    pub fn bounds(&self) -> Aabb3 {
        match *self {
            Shape::Sphere { center, radius } => {
                Aabb3::from_center_half_extents(center, Vec3::repeat(radius))
            }
            Shape::Box { center, half_extents } => {
                Aabb3::from_center_half_extents(center, half_extents)
            }
            Shape::Cylinder {
                base,
                axis,
                radius,
                height,
            } => {
                let disk = disk_extent(&axis, radius);
                let top = base + axis.as_ref() * height;
                Aabb3::from_center_half_extents(base, disk)
                    .union(&Aabb3::from_center_half_extents(top, disk))
            }
            Shape::Cone {
                base,
                axis,
                radius,
                height,
            } => {
                let mut bounds = Aabb3::from_center_half_extents(base, disk_extent(&axis, radius));
                bounds.include_point(&(base + axis.as_ref() * height));
                bounds
            }
            Shape::Torus {
                center,
                axis,
                major_radius,
                minor_radius,
            } => {
                let ring = disk_extent(&axis, major_radius);
                Aabb3::from_center_half_extents(center, ring.add_scalar(minor_radius))
            }
        }
    }
}

/// Per-axis half extent of a disk of `radius` perpendicular to `axis`.
fn disk_extent(axis: &Dir3, radius: f64) -> Vec3 {
    axis.map(|a| radius * (1.0 - a * a).max(0.0).sqrt())
}

/// An immutable primitive: shape plus material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Primitive {
    /// Shape parameters.
    pub shape: Shape,
    /// Material reported by intervals of this primitive.
    pub material: MaterialId,
}

impl Primitive {
    /// Validate and build a primitive.
    pub fn new(shape: Shape, material: MaterialId) -> Result<Self, GeometryError> {
        shape.validate()?;
        Ok(Self { shape, material })
    }

    /// The shape discriminant.
    pub fn kind(&self) -> PrimitiveKind {
        self.shape.kind()
    }

    /// Local bounds of the solid.
    pub fn bounds(&self) -> Aabb3 {
        self.shape.bounds()
    }

    /// Intervals where the ray line is inside the solid, ordered by `t`.
    pub fn intersect(&self, ray: &Ray) -> IntervalList {
        let tol = Tolerance::DEFAULT;
        let m = self.material;
        match self.shape {
            Shape::Sphere { center, radius } => intersect_sphere(ray, &center, radius, m, &tol),
            Shape::Box { center, half_extents } => {
                intersect_box(ray, &center, &half_extents, m, &tol)
            }
            Shape::Cylinder {
                base,
                axis,
                radius,
                height,
            } => intersect_cylinder(ray, &base, &axis, radius, height, m, &tol),
            Shape::Cone {
                base,
                axis,
                radius,
                height,
            } => intersect_cone(ray, &base, &axis, radius, height, m, &tol),
            Shape::Torus {
                center,
                axis,
                major_radius,
                minor_radius,
            } => intersect_torus(ray, &center, &axis, major_radius, minor_radius, m, &tol),
        }
    }
}

/// A convex inside-range along the ray with its boundary normals.
///
/// Infinite ends carry a zero normal.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Span {
    pub t0: f64,
    pub t1: f64,
    pub n0: Vec3,
    pub n1: Vec3,
}

impl Span {
    pub fn full() -> Self {
        Self {
            t0: f64::NEG_INFINITY,
            t1: f64::INFINITY,
            n0: Vec3::zeros(),
            n1: Vec3::zeros(),
        }
    }

    /// Intersection of two spans, keeping the normal of whichever constraint
    /// is binding at each end.
    pub fn clip(self, other: Span) -> Option<Span> {
        let (t0, n0) = if other.t0 > self.t0 {
            (other.t0, other.n0)
        } else {
            (self.t0, self.n0)
        };
        let (t1, n1) = if other.t1 < self.t1 {
            (other.t1, other.n1)
        } else {
            (self.t1, self.n1)
        };
        (t1 >= t0).then_some(Span { t0, t1, n0, n1 })
    }

    /// Convert to an interval, dropping tangent grazes and unbounded spans.
    pub fn into_interval(self, material: MaterialId, tol: &Tolerance) -> Option<Interval> {
        if !self.t0.is_finite() || !self.t1.is_finite() || tol.is_degenerate_span(self.t0, self.t1) {
            return None;
        }
        Some(Interval::new(self.t0, self.t1, self.n0, self.n1, material))
    }
}

/// Slab constraint `lo <= o + t * d <= hi` along a unit vector `u`, where `o`
/// and `d` are the ray origin/direction projected onto `u`.
pub(crate) fn slab(o: f64, d: f64, lo: f64, hi: f64, u: &Vec3) -> Option<Span> {
    if d.abs() < 1e-15 {
        return (lo <= o && o <= hi).then(Span::full);
    }
    let t_lo = (lo - o) / d;
    let t_hi = (hi - o) / d;
    if d > 0.0 {
        Some(Span {
            t0: t_lo,
            t1: t_hi,
            n0: -u,
            n1: *u,
        })
    } else {
        Some(Span {
            t0: t_hi,
            t1: t_lo,
            n0: *u,
            n1: -u,
        })
    }
}

/// Solution set of `a t^2 + b t + c <= 0` as up to two spans, with boundary
/// normals from `grad` (the gradient of the implicit function at a point
/// parameter `t`, normalized here).
pub(crate) fn quadratic_inside(
    a: f64,
    b: f64,
    c: f64,
    grad: impl Fn(f64) -> Vec3,
) -> [Option<Span>; 2] {
    let normal = |t: f64| {
        let g = grad(t);
        let len = g.norm();
        if len > 0.0 {
            g / len
        } else {
            g
        }
    };
    let scale = a.abs().max(b.abs()).max(c.abs());
    if scale == 0.0 {
        return [Some(Span::full()), None];
    }

    if a.abs() <= 1e-12 * scale {
        // Linear: b t + c <= 0
        if b.abs() <= 1e-12 * scale {
            return [(c <= 0.0).then(Span::full), None];
        }
        let root = -c / b;
        let span = if b > 0.0 {
            Span {
                t0: f64::NEG_INFINITY,
                t1: root,
                n0: Vec3::zeros(),
                n1: normal(root),
            }
        } else {
            Span {
                t0: root,
                t1: f64::INFINITY,
                n0: normal(root),
                n1: Vec3::zeros(),
            }
        };
        return [Some(span), None];
    }

    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        // No real roots: the sign of `a` decides everywhere.
        return [(a < 0.0).then(Span::full), None];
    }
    let sqrt_disc = disc.sqrt();
    let q = -0.5 * (b + b.signum() * sqrt_disc);
    let (mut r1, mut r2) = if q != 0.0 { (q / a, c / q) } else { (0.0, 0.0) };
    if r1 > r2 {
        std::mem::swap(&mut r1, &mut r2);
    }

    if a > 0.0 {
        [
            Some(Span {
                t0: r1,
                t1: r2,
                n0: normal(r1),
                n1: normal(r2),
            }),
            None,
        ]
    } else {
        [
            Some(Span {
                t0: f64::NEG_INFINITY,
                t1: r1,
                n0: Vec3::zeros(),
                n1: normal(r1),
            }),
            Some(Span {
                t0: r2,
                t1: f64::INFINITY,
                n0: normal(r2),
                n1: Vec3::zeros(),
            }),
        ]
    }
}
