//! Error types for primitive construction.

use crate::primitive::PrimitiveKind;
use thiserror::Error;

/// Errors raised when building a primitive.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// Zero, negative or non-finite extents.
    #[error("degenerate {}: {reason}", kind.name())]
    Degenerate {
        /// Shape that failed validation.
        kind: PrimitiveKind,
        /// What was wrong with it.
        reason: String,
    },
}
