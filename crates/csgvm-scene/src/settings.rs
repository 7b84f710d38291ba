//! BVH and query settings.

use csgvm_math::{Dir3, Tolerance, Vec3};
use csgvm_program::{CsgError, Result};
use serde::{Deserialize, Serialize};

/// Deepest BVH accepted by [`BvhSettings::validate`].
pub const MAX_BVH_DEPTH: usize = 64;

/// BVH construction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BvhSettings {
    /// A node with at most this many instances becomes a leaf.
    pub max_leaf_size: usize,
    /// Depth at which splitting stops regardless of leaf size.
    pub max_depth: usize,
}

impl Default for BvhSettings {
    fn default() -> Self {
        Self {
            max_leaf_size: 4,
            max_depth: 32,
        }
    }
}

impl BvhSettings {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if self.max_leaf_size == 0 {
            return Err(CsgError::InvalidSettings(
                "max_leaf_size must be at least 1".into(),
            ));
        }
        if self.max_depth == 0 || self.max_depth > MAX_BVH_DEPTH {
            return Err(CsgError::InvalidSettings(format!(
                "max_depth must be between 1 and {MAX_BVH_DEPTH}, got {}",
                self.max_depth
            )));
        }
        Ok(())
    }
}

/// Parameters of the collision and distance queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Distance secondary rays start away from the surface they leave.
    pub ray_offset: f64,
    /// Directions probed by signed distance: 6 (axes) or 14 (axes and
    /// diagonals).
    pub probe_directions: usize,
    /// Direction of the containment ray. Any non-zero vector; normalized on
    /// use.
    pub containment_direction: [f64; 3],
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            ray_offset: Tolerance::DEFAULT.ray_offset,
            probe_directions: 14,
            // Off-axis so it rarely runs along faces of boxes and cylinders.
            containment_direction: [0.5773, 0.5774, 0.5775],
        }
    }
}

impl QuerySettings {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if !(self.ray_offset.is_finite() && self.ray_offset >= 0.0) {
            return Err(CsgError::InvalidSettings(format!(
                "ray_offset must be finite and non-negative, got {}",
                self.ray_offset
            )));
        }
        if self.probe_directions != 6 && self.probe_directions != 14 {
            return Err(CsgError::InvalidSettings(format!(
                "probe_directions must be 6 or 14, got {}",
                self.probe_directions
            )));
        }
        let [x, y, z] = self.containment_direction;
        let v = Vec3::new(x, y, z);
        if !(v.iter().all(|c| c.is_finite()) && v.norm() > 1e-12) {
            return Err(CsgError::InvalidSettings(
                "containment_direction must be a finite non-zero vector".into(),
            ));
        }
        Ok(())
    }

    /// Normalized containment direction.
    pub fn containment_dir(&self) -> Dir3 {
        let [x, y, z] = self.containment_direction;
        Dir3::new_normalize(Vec3::new(x, y, z))
    }

    /// The probe directions used by signed distance queries.
    pub fn probes(&self) -> &'static [Vec3] {
        let all = probe_table();
        &all[..self.probe_directions.min(all.len())]
    }
}

const D: f64 = 0.577_350_269_189_625_8; // 1/sqrt(3)

/// Six axis directions followed by the eight cube diagonals, unit length.
fn probe_table() -> &'static [Vec3; 14] {
    static TABLE: [Vec3; 14] = [
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(-1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(0.0, -1.0, 0.0),
        Vec3::new(0.0, 0.0, 1.0),
        Vec3::new(0.0, 0.0, -1.0),
        Vec3::new(D, D, D),
        Vec3::new(D, D, -D),
        Vec3::new(D, -D, D),
        Vec3::new(D, -D, -D),
        Vec3::new(-D, D, D),
        Vec3::new(-D, D, -D),
        Vec3::new(-D, -D, D),
        Vec3::new(-D, -D, -D),
    ];
    &TABLE
}
