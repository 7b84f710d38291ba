//! Boolean combinators over interval lists.
//!
//! All three operations share one sweep: the endpoints of both lists are
//! walked in `t` order, each operand's inside/outside state is tracked, and a
//! segment is emitted wherever the operation's predicate holds. Events at the
//! same `t` are applied together, so touching segments merge in a union and
//! never produce zero-length output.

use crate::interval::{merge_smallest_gap, Interval, IntervalList, MaterialId, MAX_INTERVALS};
use csgvm_math::Vec3;

/// CSG boolean operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BooleanOp {
    /// Union: inside either operand.
    Union,
    /// Intersection: inside both operands.
    Intersect,
    /// Difference: inside the left operand and not the right one.
    Difference,
}

impl BooleanOp {
    /// Membership predicate given the operands' inside states.
    #[inline]
    pub fn eval(self, in_a: bool, in_b: bool) -> bool {
        match self {
            BooleanOp::Union => in_a || in_b,
            BooleanOp::Intersect => in_a && in_b,
            BooleanOp::Difference => in_a && !in_b,
        }
    }

    /// True for operations whose result does not depend on operand order.
    #[inline]
    pub fn is_commutative(self) -> bool {
        !matches!(self, BooleanOp::Difference)
    }

    /// Short lowercase name, used in disassembly.
    pub fn name(self) -> &'static str {
        match self {
            BooleanOp::Union => "union",
            BooleanOp::Intersect => "intersect",
            BooleanOp::Difference => "difference",
        }
    }
}

/// Result of a combinator.
#[derive(Debug, Clone, Copy)]
pub struct Combined {
    /// The combined intervals.
    pub intervals: IntervalList,
    /// True if the raw result exceeded [`MAX_INTERVALS`] and was merged down.
    pub capped: bool,
}

/// Union of two interval lists.
pub fn union(a: &IntervalList, b: &IntervalList) -> IntervalList {
    combine(BooleanOp::Union, a, b).intervals
}

/// Intersection of two interval lists.
pub fn intersect(a: &IntervalList, b: &IntervalList) -> IntervalList {
    combine(BooleanOp::Intersect, a, b).intervals
}

/// `a` minus `b`. Boundaries contributed by `b` have their normals flipped.
pub fn difference(a: &IntervalList, b: &IntervalList) -> IntervalList {
    combine(BooleanOp::Difference, a, b).intervals
}

/// One endpoint of an operand interval.
#[derive(Clone, Copy)]
struct Event {
    entering: bool,
    normal: Vec3,
    material: MaterialId,
}

/// Boundary chosen for an output endpoint.
#[derive(Clone, Copy)]
struct Boundary {
    t: f64,
    normal: Vec3,
    material: MaterialId,
}

#[inline]
fn event_t(list: &IntervalList, idx: usize) -> f64 {
    let iv = &list.as_slice()[idx / 2];
    if idx % 2 == 0 {
        iv.t_min
    } else {
        iv.t_max
    }
}

#[inline]
fn event_at(list: &IntervalList, idx: usize) -> Event {
    let iv = &list.as_slice()[idx / 2];
    if idx % 2 == 0 {
        Event {
            entering: true,
            normal: iv.normal_min,
            material: iv.material,
        }
    } else {
        Event {
            entering: false,
            normal: iv.normal_max,
            material: iv.material,
        }
    }
}

/// Pick the operand event that forms an output boundary.
///
/// `opening` selects entry boundaries of the result. The left operand wins
/// when both qualify. For a difference, right-operand boundaries are flipped:
/// the cut surface faces out of the remaining solid.
fn pick_boundary(op: BooleanOp, opening: bool, a: Option<Event>, b: Option<Event>) -> Option<(Vec3, MaterialId)> {
    if let Some(ev) = a {
        if ev.entering == opening {
            return Some((ev.normal, ev.material));
        }
    }
    if let Some(ev) = b {
        let flips = op == BooleanOp::Difference;
        if ev.entering != flips && opening || ev.entering == flips && !opening {
            let normal = if flips { -ev.normal } else { ev.normal };
            return Some((normal, ev.material));
        }
    }
    a.or(b).map(|ev| (ev.normal, ev.material))
}

/// Combine two sorted, disjoint interval lists.
///
/// The output is sorted and disjoint. When it would exceed
/// [`MAX_INTERVALS`], adjacent segments are merged smallest gap first (a
/// superset of the true result, see [`IntervalList::from_overflowing`]).
pub fn combine(op: BooleanOp, a: &IntervalList, b: &IntervalList) -> Combined {
    const CAP: usize = MAX_INTERVALS * 2;
    let mut buf = [Interval::new(0.0, 0.0, Vec3::zeros(), Vec3::zeros(), MaterialId::NONE); CAP];
    let mut count = 0usize;
    let mut capped = false;

    let (na, nb) = (a.len() * 2, b.len() * 2);
    let (mut ia, mut ib) = (0usize, 0usize);
    let (mut in_a, mut in_b) = (false, false);
    let mut open: Option<Boundary> = None;

    while ia < na || ib < nb {
        let ta = if ia < na { event_t(a, ia) } else { f64::INFINITY };
        let tb = if ib < nb { event_t(b, ib) } else { f64::INFINITY };
        let t = ta.min(tb);
        if t.is_nan() {
            break;
        }
        let was = op.eval(in_a, in_b);

        let mut ev_a = None;
        while ia < na && event_t(a, ia) == t {
            let ev = event_at(a, ia);
            in_a = ev.entering;
            ev_a = Some(ev);
            ia += 1;
        }
        let mut ev_b = None;
        while ib < nb && event_t(b, ib) == t {
            let ev = event_at(b, ib);
            in_b = ev.entering;
            ev_b = Some(ev);
            ib += 1;
        }

        let now = op.eval(in_a, in_b);
        if !was && now {
            open = pick_boundary(op, true, ev_a, ev_b).map(|(normal, material)| Boundary {
                t,
                normal,
                material,
            });
        } else if was && !now {
            if let (Some(start), Some((normal, _))) = (open.take(), pick_boundary(op, false, ev_a, ev_b)) {
                if t > start.t {
                    if count == CAP {
                        count = merge_smallest_gap(&mut buf, count);
                        capped = true;
                    }
                    buf[count] = Interval::new(start.t, t, start.normal, normal, start.material);
                    count += 1;
                }
            }
        }
    }

    let (intervals, merged) = IntervalList::from_overflowing(&mut buf[..count]);
    Combined {
        intervals,
        capped: capped || merged,
    }
}
