//! Axis-aligned bounding boxes.
//!
//! Used for node bounds in the CSG tree, program-local bounds, instance world
//! bounds and BVH nodes.

use crate::{Point3, Transform, Vec3};

/// Box spanned by two corners.
///
/// Any axis with `min > max` (or a NaN bound) makes the box empty. The empty
/// box is the identity of [`Aabb3::union`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3 {
    /// Lower corner.
    pub min: Point3,
    /// Upper corner.
    pub max: Point3,
}

impl Aabb3 {
    /// Box from its two corners, taken as given.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Inverted box that grows from nothing under [`Aabb3::include_point`].
    pub fn empty() -> Self {
        Self {
            min: Point3::from(Vec3::repeat(f64::INFINITY)),
            max: Point3::from(Vec3::repeat(f64::NEG_INFINITY)),
        }
    }

    /// Box around `center` reaching `half` along each axis.
    pub fn from_center_half_extents(center: Point3, half: Vec3) -> Self {
        Self::new(center - half, center + half)
    }

    /// True if the box contains no points.
    pub fn is_empty(&self) -> bool {
        !self.min.iter().zip(self.max.iter()).all(|(lo, hi)| lo <= hi)
    }

    /// Grow to cover `p`.
    pub fn include_point(&mut self, p: &Point3) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &Aabb3) -> Aabb3 {
        match (self.is_empty(), other.is_empty()) {
            (true, _) => *other,
            (_, true) => *self,
            _ => Aabb3::new(self.min.inf(&other.min), self.max.sup(&other.max)),
        }
    }

    /// Overlap region of both boxes; empty when they are disjoint.
    pub fn intersection(&self, other: &Aabb3) -> Aabb3 {
        let out = Aabb3::new(self.min.sup(&other.min), self.max.inf(&other.max));
        if out.is_empty() {
            Aabb3::empty()
        } else {
            out
        }
    }

    /// Shared points exist, boundary contact included.
    pub fn overlaps(&self, other: &Aabb3) -> bool {
        (0..3).all(|axis| self.min[axis] <= other.max[axis] && other.min[axis] <= self.max[axis])
    }

    /// `p` is inside or on the boundary.
    pub fn contains_point(&self, p: &Point3) -> bool {
        (0..3).all(|axis| self.min[axis] <= p[axis] && p[axis] <= self.max[axis])
    }

    /// Push every face outward by `margin`. Empty boxes stay empty.
    pub fn expand(&mut self, margin: f64) {
        if self.is_empty() {
            return;
        }
        let pad = Vec3::repeat(margin);
        self.min -= pad;
        self.max += pad;
    }

    /// Midpoint of the corners. Meaningless for an empty box.
    pub fn center(&self) -> Point3 {
        nalgebra::center(&self.min, &self.max)
    }

    /// Edge lengths along each axis.
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    fn corners(&self) -> impl Iterator<Item = Point3> + '_ {
        (0..8u8).map(move |bits| {
            let pick = |axis: usize| {
                if bits & (1 << axis) == 0 {
                    self.min[axis]
                } else {
                    self.max[axis]
                }
            };
            Point3::new(pick(0), pick(1), pick(2))
        })
    }

    /// Box around the eight corners after `t`.
    pub fn transformed(&self, t: &Transform) -> Aabb3 {
        let mut out = Aabb3::empty();
        if !self.is_empty() {
            for c in self.corners() {
                out.include_point(&t.apply_point(&c));
            }
        }
        out
    }
}

impl Default for Aabb3 {
    fn default() -> Self {
        Self::empty()
    }
}
