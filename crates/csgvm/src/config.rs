//! Aggregate settings with TOML loading.

use csgvm_program::{CompileSettings, CsgError};
use csgvm_scene::{BvhSettings, QuerySettings};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The text is not valid TOML for [`Settings`].
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error(transparent)]
    Invalid(#[from] CsgError),
}

/// Every tunable of the engine, one table per layer.
///
/// ```toml
/// [compile]
/// max_tree_depth = 24
/// early_reject = false
///
/// [bvh]
/// max_leaf_size = 2
///
/// [query]
/// probe_directions = 6
/// ```
///
/// Missing tables and keys keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Compiler settings.
    pub compile: CompileSettings,
    /// BVH construction settings.
    pub bvh: BvhSettings,
    /// Collision and distance query settings.
    pub query: QuerySettings,
}

impl Settings {
    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate a TOML settings file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        log::debug!("loading settings from {}", path.as_ref().display());
        Self::from_toml_str(&text)
    }

    /// Serialize to TOML text.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// Validate every section.
    pub fn validate(&self) -> csgvm_program::Result<()> {
        self.compile.validate()?;
        self.bvh.validate()?;
        self.query.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_default() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_tables() {
        let text = r#"
            [compile]
            max_tree_depth = 24
            early_reject = false

            [bvh]
            max_leaf_size = 2

            [query]
            probe_directions = 6
        "#;
        let settings = Settings::from_toml_str(text).unwrap();
        assert_eq!(settings.compile.max_tree_depth, 24);
        assert!(!settings.compile.early_reject);
        assert!(settings.compile.dead_code_elimination);
        assert_eq!(settings.bvh.max_leaf_size, 2);
        assert_eq!(settings.bvh.max_depth, 32);
        assert_eq!(settings.query.probe_directions, 6);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let err = Settings::from_toml_str("[compile]\nmax_tree_depth = 500\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(CsgError::InvalidSettings(_))));
    }

    #[test]
    fn test_bad_syntax() {
        let err = Settings::from_toml_str("[bvh\nmax_depth = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_round_trip_through_text() {
        let mut settings = Settings::default();
        settings.query.probe_directions = 6;
        settings.bvh.max_depth = 16;
        let text = settings.to_toml_string().unwrap();
        assert_eq!(Settings::from_toml_str(&text).unwrap(), settings);
    }
}
