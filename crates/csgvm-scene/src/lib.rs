#![warn(missing_docs)]

//! World placement, broad phase and collision queries for csgvm programs.
//!
//! An [`Instance`] places a shared [`CompiledProgram`](csgvm_program::CompiledProgram)
//! at a transform. A [`Scene`] owns instances and a [`Bvh`] over their world
//! bounds; it is immutable once built, so any number of threads can query it
//! with their own [`EvalCache`](csgvm_program::EvalCache). [`SceneSlot`]
//! swaps whole scene generations between query batches.

mod bvh;
mod instance;
pub mod query;
mod scene;
mod settings;
mod slot;

pub use bvh::{Bvh, BvhNode};
pub use instance::{Hit, Instance};
pub use query::Contact;
pub use scene::{Scene, SceneHit};
pub use settings::{BvhSettings, QuerySettings, MAX_BVH_DEPTH};
pub use slot::{SceneSlot, Snapshot};
