//! Ray-parameter intervals and the fixed-capacity interval list.

use csgvm_math::Vec3;

/// Maximum number of intervals any list holds. Combinator results that would
/// exceed this are merged down (see [`IntervalList::from_overflowing`]).
pub const MAX_INTERVALS: usize = 4;

/// Material identifier carried by intervals.
///
/// [`MaterialId::NONE`] is the "no override" sentinel used by CSG nodes and
/// instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

impl MaterialId {
    /// Sentinel meaning "no material / no override".
    pub const NONE: MaterialId = MaterialId(u32::MAX);

    /// True for the sentinel.
    #[inline]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// Treat `self` as an override: returns `self` unless it is the sentinel,
    /// in which case `inner` passes through.
    #[inline]
    pub fn override_of(self, inner: MaterialId) -> MaterialId {
        if self.is_none() {
            inner
        } else {
            self
        }
    }
}

impl Default for MaterialId {
    fn default() -> Self {
        Self::NONE
    }
}

impl std::fmt::Display for MaterialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            write!(f, "-")
        } else {
            write!(f, "m{}", self.0)
        }
    }
}

/// A `[t_min, t_max]` segment where a ray is inside a solid.
///
/// `normal_min` is the outward surface normal where the ray enters,
/// `normal_max` where it leaves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    /// Entry parameter.
    pub t_min: f64,
    /// Exit parameter.
    pub t_max: f64,
    /// Outward normal at the entry boundary.
    pub normal_min: Vec3,
    /// Outward normal at the exit boundary.
    pub normal_max: Vec3,
    /// Material of the segment.
    pub material: MaterialId,
}

impl Interval {
    /// Create an interval.
    pub fn new(t_min: f64, t_max: f64, normal_min: Vec3, normal_max: Vec3, material: MaterialId) -> Self {
        Self {
            t_min,
            t_max,
            normal_min,
            normal_max,
            material,
        }
    }

    fn placeholder() -> Self {
        Self::new(0.0, 0.0, Vec3::zeros(), Vec3::zeros(), MaterialId::NONE)
    }

    /// Length along the ray.
    #[inline]
    pub fn length(&self) -> f64 {
        self.t_max - self.t_min
    }

    /// True if `t` lies in the closed interval.
    #[inline]
    pub fn contains(&self, t: f64) -> bool {
        self.t_min <= t && t <= self.t_max
    }

    /// True if the interval overlaps the closed range `[t_min, t_max]`.
    #[inline]
    pub fn overlaps(&self, t_min: f64, t_max: f64) -> bool {
        self.t_max >= t_min && self.t_min <= t_max
    }
}

/// The first surface crossing of an interval list inside a parameter range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    /// Ray parameter of the crossing.
    pub t: f64,
    /// Outward surface normal at the crossing.
    pub normal: Vec3,
    /// Material of the crossed segment.
    pub material: MaterialId,
    /// `true` when the ray enters the solid here, `false` when it exits
    /// (the range started inside the solid).
    pub entering: bool,
}

/// Sorted, non-overlapping list of at most [`MAX_INTERVALS`] intervals.
///
/// Stored inline so the interpreter never allocates.
#[derive(Clone, Copy)]
pub struct IntervalList {
    items: [Interval; MAX_INTERVALS],
    len: u8,
}

impl IntervalList {
    /// Empty list.
    pub fn new() -> Self {
        Self {
            items: [Interval::placeholder(); MAX_INTERVALS],
            len: 0,
        }
    }

    /// List holding one interval.
    pub fn single(interval: Interval) -> Self {
        let mut list = Self::new();
        list.items[0] = interval;
        list.len = 1;
        list
    }

    /// Number of intervals.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// True when the list holds no intervals.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The intervals as a slice, ordered by `t_min`.
    #[inline]
    pub fn as_slice(&self) -> &[Interval] {
        &self.items[..self.len as usize]
    }

    /// Iterate over the intervals.
    pub fn iter(&self) -> std::slice::Iter<'_, Interval> {
        self.as_slice().iter()
    }

    /// Remove all intervals.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Append an interval after the current last one.
    ///
    /// Returns `false` (and leaves the list unchanged) when the list is full.
    /// Callers are responsible for keeping the list sorted and disjoint.
    pub fn push(&mut self, interval: Interval) -> bool {
        if self.len() == MAX_INTERVALS {
            return false;
        }
        self.items[self.len()] = interval;
        self.len += 1;
        true
    }

    /// Build a list from a sorted, disjoint slice of any length.
    ///
    /// While more than [`MAX_INTERVALS`] remain, the adjacent pair with the
    /// smallest gap is merged into one segment spanning both. Equal gaps merge
    /// the pair nearest the ray origin first. The merged segment keeps the
    /// nearer segment's entry normal and material and the farther segment's
    /// exit normal, so the result always covers the true solid.
    ///
    /// Returns the list and whether any merge happened.
    pub fn from_overflowing(spans: &mut [Interval]) -> (Self, bool) {
        let mut count = spans.len();
        let merged = count > MAX_INTERVALS;
        while count > MAX_INTERVALS {
            count = merge_smallest_gap(spans, count);
        }
        let mut list = Self::new();
        for &iv in &spans[..count] {
            list.push(iv);
        }
        (list, merged)
    }

    /// Replace every interval's material with `material` unless it is the
    /// [`MaterialId::NONE`] sentinel.
    pub fn with_material_override(mut self, material: MaterialId) -> Self {
        if !material.is_none() {
            for iv in &mut self.items[..self.len as usize] {
                iv.material = material;
            }
        }
        self
    }

    /// Keep only intervals that overlap `[t_min, t_max]`. Intervals are not
    /// clipped, so their boundary normals stay meaningful.
    pub fn retain_overlapping(&self, t_min: f64, t_max: f64) -> Self {
        let mut out = Self::new();
        for iv in self.iter().filter(|iv| iv.overlaps(t_min, t_max)) {
            out.push(*iv);
        }
        out
    }

    /// True if any interval overlaps `[t_min, t_max]`.
    pub fn any_overlapping(&self, t_min: f64, t_max: f64) -> bool {
        self.iter().any(|iv| iv.overlaps(t_min, t_max))
    }

    /// True if some interval contains parameter `t`.
    pub fn contains(&self, t: f64) -> bool {
        self.iter().any(|iv| iv.contains(t))
    }

    /// First boundary crossing with `t` in `[t_min, t_max]`.
    pub fn first_crossing(&self, t_min: f64, t_max: f64) -> Option<Crossing> {
        for iv in self.iter() {
            if iv.t_min > t_max {
                break;
            }
            if iv.t_min >= t_min {
                return Some(Crossing {
                    t: iv.t_min,
                    normal: iv.normal_min,
                    material: iv.material,
                    entering: true,
                });
            }
            if iv.t_max >= t_min && iv.t_max <= t_max {
                return Some(Crossing {
                    t: iv.t_max,
                    normal: iv.normal_max,
                    material: iv.material,
                    entering: false,
                });
            }
        }
        None
    }

    /// Apply `f` to every interval in place (used to move intervals between
    /// parameterizations).
    pub fn map(mut self, mut f: impl FnMut(Interval) -> Interval) -> Self {
        for iv in &mut self.items[..self.len as usize] {
            *iv = f(*iv);
        }
        self
    }
}

impl Default for IntervalList {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for IntervalList {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl std::fmt::Debug for IntervalList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a IntervalList {
    type Item = &'a Interval;
    type IntoIter = std::slice::Iter<'a, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Merge the adjacent pair with the smallest gap; returns the new count.
pub(crate) fn merge_smallest_gap(spans: &mut [Interval], count: usize) -> usize {
    if count < 2 {
        return count;
    }
    let mut best = 0;
    let mut best_gap = f64::INFINITY;
    for i in 0..count - 1 {
        let gap = spans[i + 1].t_min - spans[i].t_max;
        if gap < best_gap {
            best_gap = gap;
            best = i;
        }
    }
    let far = spans[best + 1];
    let near = &mut spans[best];
    near.t_max = far.t_max;
    near.normal_max = far.normal_max;
    for i in best + 1..count - 1 {
        spans[i] = spans[i + 1];
    }
    count - 1
}
