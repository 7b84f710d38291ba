#![warn(missing_docs)]

//! csgvm: analytic CSG solids evaluated by a compiled stack machine.
//!
//! Solids are authored as a [`CsgTree`] of primitives (sphere, box,
//! cylinder, cone, torus) combined by union, intersection and difference.
//! The tree compiles into a flat [`CompiledProgram`] that maps a ray to the
//! list of parameter intervals where the ray is inside the solid. Programs
//! are placed in the world as [`Instance`]s, indexed by a [`Bvh`] inside a
//! [`Scene`], and queried for closest hits, occlusion, containment, signed
//! distance and sphere contacts.
//!
//! # Example
//!
//! ```
//! use csgvm::prelude::*;
//! use std::sync::Arc;
//!
//! let mut tree = CsgTree::new();
//! let ball = tree.add_primitive(Shape::sphere(Point3::origin(), 1.0), MaterialId(0))?;
//! let cube = tree.add_primitive(Shape::cuboid(Point3::origin(), Vec3::repeat(0.6)), MaterialId(0))?;
//! let cut = tree.difference(ball, cube)?;
//! tree.mark_root(cut)?;
//!
//! let settings = Settings::default();
//! let program = Arc::new(tree.compile(&settings.compile)?);
//! let here = Instance::new(program.clone(), Transform::identity())?;
//! let there = Instance::new(program, Transform::translation(10.0, 0.0, 0.0))?;
//! let scene = Scene::new(vec![here, there], &settings.bvh)?;
//!
//! let mut cache = EvalCache::new();
//! let ray = Ray::new(Point3::new(10.0, 0.0, -5.0), Vec3::z());
//! let hit = scene.closest_hit(&ray, 0.0, f64::INFINITY, &mut cache).unwrap();
//! assert_eq!(hit.instance, 1);
//! assert!((hit.hit.t - 4.0).abs() < 1e-9);
//! # Ok::<(), CsgError>(())
//! ```

mod config;

pub use config::{ConfigError, Settings};

pub use csgvm_interval as interval;
pub use csgvm_math as math;
pub use csgvm_program as program;
pub use csgvm_scene as scene;

pub use csgvm_interval::{
    BooleanOp, GeometryError, Interval, IntervalList, MaterialId, Primitive, PrimitiveKind, Shape,
    MAX_INTERVALS,
};
pub use csgvm_math::{Aabb3, Dir3, Point3, Ray, Transform, Vec3};
pub use csgvm_program::{
    execute, execute_shadow, CompileError, CompileSettings, CompiledProgram, CsgError, CsgRef,
    CsgTree, EvalCache, EvalStats, Instruction, NodeId, PrimitiveId, StructuralError,
};
pub use csgvm_scene::{
    Bvh, BvhSettings, Contact, Hit, Instance, QuerySettings, Scene, SceneHit, SceneSlot, Snapshot,
};

/// Everything needed to build and query scenes.
pub mod prelude {
    pub use crate::Settings;
    pub use csgvm_interval::{BooleanOp, MaterialId, Shape};
    pub use csgvm_math::{Point3, Ray, Transform, Vec3};
    pub use csgvm_program::{CompileSettings, CsgError, CsgTree, EvalCache};
    pub use csgvm_scene::{Instance, Scene};
}
