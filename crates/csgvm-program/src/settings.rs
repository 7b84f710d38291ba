//! Compiler settings.

use crate::error::{CsgError, Result};
use crate::instruction::MAX_STACK_DEPTH;
use serde::{Deserialize, Serialize};

/// Compilation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileSettings {
    /// Deepest tree accepted, counting the leaf level. Must stay below
    /// [`MAX_STACK_DEPTH`].
    pub max_tree_depth: usize,
    /// Drop subtrees whose bounds prove they contribute nothing.
    pub dead_code_elimination: bool,
    /// Compile shared subtrees once and recall the stored result.
    pub dedup_shared_subtrees: bool,
    /// Emit the cheaper operand of a commutative node first.
    pub reorder_operands: bool,
    /// Skip the second operand of an intersection or difference when the
    /// first one is empty.
    pub early_reject: bool,
}

impl Default for CompileSettings {
    fn default() -> Self {
        Self {
            max_tree_depth: 32,
            dead_code_elimination: true,
            dedup_shared_subtrees: true,
            reorder_operands: true,
            early_reject: true,
        }
    }
}

impl CompileSettings {
    /// Settings with every optimization turned off.
    pub fn unoptimized() -> Self {
        Self {
            dead_code_elimination: false,
            dedup_shared_subtrees: false,
            reorder_operands: false,
            early_reject: false,
            ..Self::default()
        }
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if self.max_tree_depth == 0 || self.max_tree_depth >= MAX_STACK_DEPTH {
            return Err(CsgError::InvalidSettings(format!(
                "max_tree_depth must be between 1 and {}, got {}",
                MAX_STACK_DEPTH - 1,
                self.max_tree_depth
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(CompileSettings::default().validate().is_ok());
        assert!(CompileSettings::unoptimized().validate().is_ok());
    }

    #[test]
    fn test_depth_limit_range() {
        let mut s = CompileSettings::default();
        s.max_tree_depth = 0;
        assert!(s.validate().is_err());
        s.max_tree_depth = MAX_STACK_DEPTH;
        assert!(matches!(s.validate(), Err(CsgError::InvalidSettings(_))));
    }
}
