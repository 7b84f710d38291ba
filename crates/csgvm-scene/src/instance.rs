//! World placement of a compiled program.
//!
//! An instance owns nothing but a shared program handle, a transform and an
//! optional material override, so any number of placements can reuse one
//! compilation. Queries transform the
//! world ray into program space, rescaling the parameter range by the length
//! of the transformed direction, and transform results back: parameters are
//! always reported in world units.

use csgvm_interval::{Interval, IntervalList, MaterialId};
use csgvm_math::{Aabb3, Dir3, Point3, Ray, Transform, Vec3};
use csgvm_program::{execute, execute_shadow, CompiledProgram, CsgError, EvalCache, Result};
use nalgebra::Matrix3;
use std::sync::Arc;

/// Smallest accepted `|det|` relative to the cube of the linear part's
/// scale.
const SINGULAR_RATIO: f64 = 1e-12;

/// Closest surface crossing of a world ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// World ray parameter.
    pub t: f64,
    /// World hit point.
    pub point: Point3,
    /// Unit outward surface normal in world space.
    pub normal: Vec3,
    /// Material of the crossed segment.
    pub material: MaterialId,
    /// `true` when the ray enters the solid, `false` when the range started
    /// inside and this is the exit.
    pub entering: bool,
}

/// One compiled program placed in the world.
#[derive(Debug, Clone)]
pub struct Instance {
    program: Arc<CompiledProgram>,
    local_to_world: Transform,
    world_to_local: Transform,
    normal_matrix: Matrix3<f64>,
    world_bounds: Aabb3,
    material: MaterialId,
}

impl Instance {
    /// Place `program` with `local_to_world`.
    ///
    /// Fails with [`CsgError::SingularTransform`] if the transform has
    /// non-finite entries or cannot be inverted.
    pub fn new(program: Arc<CompiledProgram>, local_to_world: Transform) -> Result<Self> {
        if !local_to_world.is_finite() {
            return Err(CsgError::SingularTransform(
                "transform has non-finite entries".into(),
            ));
        }
        let linear = local_to_world.linear();
        let det = linear.determinant();
        // Compare against the cube of the mean column length so uniformly
        // tiny or huge placements pass and only flattened ones fail.
        let size = linear.norm() / 3f64.sqrt();
        if !det.is_finite() || det.abs() <= SINGULAR_RATIO * size.powi(3) {
            return Err(CsgError::SingularTransform(format!(
                "linear part has determinant {det}"
            )));
        }
        let world_to_local = local_to_world
            .inverse()
            .filter(Transform::is_finite)
            .ok_or_else(|| CsgError::SingularTransform("transform cannot be inverted".into()))?;
        // Inverse transpose of the local-to-world linear part.
        let normal_matrix = world_to_local.linear().transpose();
        let world_bounds = if program.is_empty() {
            Aabb3::empty()
        } else {
            program.local_bounds().transformed(&local_to_world)
        };
        Ok(Self {
            program,
            local_to_world,
            world_to_local,
            normal_matrix,
            world_bounds,
            material: MaterialId::NONE,
        })
    }

    /// Replace every material the program reports with `material`.
    /// [`MaterialId::NONE`] restores the program's own materials.
    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.material = material;
        self
    }

    /// Material override, [`MaterialId::NONE`] when unset.
    pub fn material(&self) -> MaterialId {
        self.material
    }

    /// Program placed by this instance.
    pub fn program(&self) -> &Arc<CompiledProgram> {
        &self.program
    }

    /// Local-to-world transform.
    pub fn transform(&self) -> &Transform {
        &self.local_to_world
    }

    /// World-to-local transform.
    pub fn inverse_transform(&self) -> &Transform {
        &self.world_to_local
    }

    /// Conservative world-space bounds.
    pub fn world_bounds(&self) -> Aabb3 {
        self.world_bounds
    }

    /// Map a world ray into program space.
    ///
    /// Returns the local ray and the factor turning world parameters into
    /// local ones.
    fn to_local(&self, ray: &Ray) -> Option<(Ray, f64)> {
        let d = self.world_to_local.apply_vec(ray.direction.as_ref());
        let scale = d.norm();
        if !(scale.is_finite() && scale > 0.0) {
            return None;
        }
        let origin = self.world_to_local.apply_point(&ray.origin);
        Some((Ray::from_dir(origin, Dir3::new_unchecked(d / scale)), scale))
    }

    /// Transform a program-space normal to a unit world normal.
    pub fn world_normal(&self, local: &Vec3) -> Vec3 {
        let n = self.normal_matrix * local;
        let len = n.norm();
        if len > 0.0 && len.is_finite() {
            n / len
        } else {
            *local
        }
    }

    /// Intervals of the world ray overlapping `[t_min, t_max]`, in world
    /// parameters with world normals.
    pub fn intervals(&self, ray: &Ray, t_min: f64, t_max: f64, cache: &mut EvalCache) -> IntervalList {
        if ray.intersect_aabb(&self.world_bounds, t_min, t_max).is_none() {
            return IntervalList::new();
        }
        let Some((local, scale)) = self.to_local(ray) else {
            return IntervalList::new();
        };
        execute(&self.program, &local, t_min * scale, t_max * scale, cache).map(|iv| {
            Interval::new(
                iv.t_min / scale,
                iv.t_max / scale,
                self.world_normal(&iv.normal_min),
                self.world_normal(&iv.normal_max),
                self.material.override_of(iv.material),
            )
        })
    }

    /// First surface crossing of the world ray within `[t_min, t_max]`.
    pub fn closest_hit(&self, ray: &Ray, t_min: f64, t_max: f64, cache: &mut EvalCache) -> Option<Hit> {
        ray.intersect_aabb(&self.world_bounds, t_min, t_max)?;
        let (local, scale) = self.to_local(ray)?;
        let (lt_min, lt_max) = (t_min * scale, t_max * scale);
        let crossing = execute(&self.program, &local, lt_min, lt_max, cache).first_crossing(lt_min, lt_max)?;
        let t = crossing.t / scale;
        Some(Hit {
            t,
            point: ray.at(t),
            normal: self.world_normal(&crossing.normal),
            material: self.material.override_of(crossing.material),
            entering: crossing.entering,
        })
    }

    /// True if the instance has any solid within `[t_min, t_max]` along the
    /// ray.
    pub fn occluded(&self, ray: &Ray, t_min: f64, t_max: f64, cache: &mut EvalCache) -> bool {
        if ray.intersect_aabb(&self.world_bounds, t_min, t_max).is_none() {
            return false;
        }
        match self.to_local(ray) {
            Some((local, scale)) => execute_shadow(&self.program, &local, t_min * scale, t_max * scale, cache),
            None => false,
        }
    }
}
