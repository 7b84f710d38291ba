//! Error taxonomy for building, compiling and placing CSG programs.
//!
//! Everything here is raised at authoring or compile time. A program that
//! compiled successfully never produces an error at query time.

use crate::tree::{NodeId, PrimitiveId};
use csgvm_interval::GeometryError;
use thiserror::Error;

/// Malformed tree structure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralError {
    /// A primitive id that was never returned by the builder.
    #[error("unknown primitive {id} referenced by {context}")]
    UnknownPrimitive {
        /// The offending id.
        id: PrimitiveId,
        /// Where the reference came from.
        context: String,
    },

    /// A node id that was never returned by the builder.
    #[error("unknown node {id} referenced by {context}")]
    UnknownNode {
        /// The offending id.
        id: NodeId,
        /// Where the reference came from.
        context: String,
    },

    /// `compile` or `evaluate` called before `mark_root`.
    #[error("tree has no root")]
    NoRoot,

    /// The tree is deeper than the configured maximum.
    #[error("tree depth {depth} at {node} exceeds limit {limit}")]
    TreeTooDeep {
        /// Root of the offending subtree.
        node: NodeId,
        /// Its depth.
        depth: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The compiled program needs more stack than the interpreter allows.
    #[error("program needs stack depth {required}, limit is {limit}")]
    StackTooDeep {
        /// Required depth.
        required: usize,
        /// Interpreter limit.
        limit: usize,
    },
}

/// Invalid instruction layout in a compiled program.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// An instruction is inconsistent with the ones around it.
    #[error("invalid instruction at {offset}: {reason}")]
    InvalidLayout {
        /// Instruction offset.
        offset: usize,
        /// What is wrong.
        reason: String,
    },
}

/// Any error raised by the csgvm construction APIs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CsgError {
    /// Malformed tree.
    #[error(transparent)]
    Structural(#[from] StructuralError),

    /// Malformed instruction buffer.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Degenerate primitive.
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// An instance transform cannot be inverted.
    #[error("singular transform: {0}")]
    SingularTransform(String),

    /// Settings out of range.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

/// Result type for csgvm operations.
pub type Result<T> = std::result::Result<T, CsgError>;
