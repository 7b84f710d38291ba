#![warn(missing_docs)]

//! Ray intervals, interval boolean algebra and primitive interval functions
//! for the csgvm CSG engine.
//!
//! A solid seen along a ray is a sorted list of `[t_min, t_max]` segments
//! where the ray is inside it. Primitives produce these lists analytically;
//! [`combine`] merges two lists under union, intersection or difference.
//! Lists hold at most [`MAX_INTERVALS`] entries and never allocate.

mod algebra;
mod error;
mod interval;
pub mod primitive;

pub use algebra::{combine, difference, intersect, union, BooleanOp, Combined};
pub use error::GeometryError;
pub use interval::{Crossing, Interval, IntervalList, MaterialId, MAX_INTERVALS};
pub use primitive::{Primitive, PrimitiveKind, Shape};
