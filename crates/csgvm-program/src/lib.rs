#![warn(missing_docs)]

//! CSG trees, the program compiler and the stack machine interpreter.
//!
//! A [`CsgTree`] is built from primitives and boolean nodes, then compiled
//! into a [`CompiledProgram`]: a flat post-order instruction buffer with its
//! own primitive table. [`execute`] runs a program against a ray and returns
//! the same intervals as [`CsgTree::evaluate`], the recursive reference
//! evaluator.
//!
//! ```
//! use csgvm_interval::{MaterialId, Shape};
//! use csgvm_math::{Point3, Ray, Vec3};
//! use csgvm_program::{execute, CompileSettings, CsgTree, EvalCache};
//!
//! let mut tree = CsgTree::new();
//! let ball = tree.add_primitive(Shape::sphere(Point3::origin(), 1.0), MaterialId(0))?;
//! let cube = tree.add_primitive(Shape::cuboid(Point3::origin(), Vec3::repeat(0.6)), MaterialId(1))?;
//! let cut = tree.difference(ball, cube)?;
//! tree.mark_root(cut)?;
//!
//! let program = tree.compile(&CompileSettings::default())?;
//! let mut cache = EvalCache::for_program(&program);
//! let ray = Ray::new(Point3::new(0.0, 0.0, -5.0), Vec3::z());
//! let hits = execute(&program, &ray, 0.0, f64::INFINITY, &mut cache);
//! assert_eq!(hits.len(), 2);
//! # Ok::<(), csgvm_program::CsgError>(())
//! ```

mod compiler;
mod error;
mod instruction;
mod interpreter;
mod settings;
mod tree;

pub use compiler::compile;
pub use error::{CompileError, CsgError, Result, StructuralError};
pub use instruction::{CompiledProgram, Instruction, MAX_STACK_DEPTH};
pub use interpreter::{execute, execute_shadow, EvalCache, EvalStats};
pub use settings::CompileSettings;
pub use tree::{CsgNode, CsgRef, CsgTree, NodeId, PrimitiveId};
