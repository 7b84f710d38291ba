//! Instances plus the BVH built over them.

use crate::bvh::Bvh;
use crate::instance::{Hit, Instance};
use crate::query::{self, Contact};
use crate::settings::{BvhSettings, QuerySettings};
use csgvm_math::{Aabb3, Point3, Ray, Vec3};
use csgvm_program::{EvalCache, Result};
use rayon::prelude::*;

/// Closest hit over a whole scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneHit {
    /// Index of the instance that was hit.
    pub instance: usize,
    /// The hit itself, in world space.
    pub hit: Hit,
}

/// Immutable set of placed instances, ready for concurrent queries.
#[derive(Debug, Clone)]
pub struct Scene {
    instances: Vec<Instance>,
    bvh: Bvh,
    query: QuerySettings,
}

impl Scene {
    /// Build the BVH over `instances` with default query settings.
    pub fn new(instances: Vec<Instance>, bvh: &BvhSettings) -> Result<Self> {
        Self::with_settings(instances, bvh, QuerySettings::default())
    }

    /// Build the BVH over `instances`.
    pub fn with_settings(instances: Vec<Instance>, bvh: &BvhSettings, query: QuerySettings) -> Result<Self> {
        bvh.validate()?;
        query.validate()?;
        let bounds: Vec<Aabb3> = instances.iter().map(Instance::world_bounds).collect();
        let bvh = Bvh::build(&bounds, bvh);
        Ok(Self {
            instances,
            bvh,
            query,
        })
    }

    /// Placed instances, in the order given at construction.
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// True if the scene has no instances.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// The acceleration structure.
    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    /// Query settings.
    pub fn query_settings(&self) -> &QuerySettings {
        &self.query
    }

    /// World bounds of every non-empty instance.
    pub fn bounds(&self) -> Aabb3 {
        self.bvh.bounds()
    }

    /// Closest surface crossing within `[t_min, t_max]` over all instances.
    pub fn closest_hit(&self, ray: &Ray, t_min: f64, t_max: f64, cache: &mut EvalCache) -> Option<SceneHit> {
        let mut best: Option<SceneHit> = None;
        self.bvh.traverse_ray(ray, t_min, t_max, |id, limit| {
            if let Some(hit) = self.instances[id].closest_hit(ray, t_min, *limit, cache) {
                if best.map_or(true, |b| hit.t < b.hit.t) {
                    *limit = hit.t;
                    best = Some(SceneHit { instance: id, hit });
                }
            }
            false
        });
        best
    }

    /// True if anything lies along the ray within `[t_min, t_max]`.
    pub fn occluded(&self, ray: &Ray, t_min: f64, t_max: f64, cache: &mut EvalCache) -> bool {
        let mut hit = false;
        self.bvh.traverse_ray(ray, t_min, t_max, |id, limit| {
            hit = self.instances[id].occluded(ray, t_min, *limit, cache);
            hit
        });
        hit
    }

    /// Shadow ray from `point` (offset off the surface along `dir`) up to
    /// `max_distance`.
    pub fn shadowed(&self, point: &Point3, dir: &Vec3, max_distance: f64, cache: &mut EvalCache) -> bool {
        let ray = Ray::new(*point, *dir);
        self.occluded(&ray, self.query.ray_offset, max_distance, cache)
    }

    /// Indices of instances whose world bounds overlap `aabb`, ascending.
    pub fn instances_overlapping(&self, aabb: &Aabb3) -> Vec<usize> {
        let mut out = Vec::new();
        self.bvh.traverse_overlapping(aabb, |id| {
            if self.instances[id].world_bounds().overlaps(aabb) {
                out.push(id);
            }
        });
        out.sort_unstable();
        out
    }

    /// True if `point` lies inside any instance.
    pub fn contains_point(&self, point: &Point3, cache: &mut EvalCache) -> bool {
        let probe = Aabb3::new(*point, *point);
        let mut inside = false;
        self.bvh.traverse_overlapping(&probe, |id| {
            if !inside {
                inside = query::is_inside(&self.instances[id], point, &self.query, cache);
            }
        });
        inside
    }

    /// Signed distance estimate of `point` to the closest instance among
    /// those whose bounds lie within `search_radius`. Infinite when none
    /// qualifies.
    pub fn signed_distance(&self, point: &Point3, search_radius: f64, cache: &mut EvalCache) -> f64 {
        let mut reach = Aabb3::new(*point, *point);
        reach.expand(search_radius);
        let mut best = f64::INFINITY;
        self.bvh.traverse_overlapping(&reach, |id| {
            let d = query::signed_distance(&self.instances[id], point, &self.query, cache);
            best = best.min(d);
        });
        best
    }

    /// Contacts of a sphere with every instance it overlaps, ordered by
    /// instance index.
    pub fn contacts_sphere(&self, center: &Point3, radius: f64, cache: &mut EvalCache) -> Vec<Contact> {
        let reach = Aabb3::from_center_half_extents(*center, Vec3::repeat(radius));
        let mut contacts = Vec::new();
        for id in self.instances_overlapping(&reach) {
            if let Some(mut contact) = query::contact_sphere(&self.instances[id], center, radius, &self.query, cache) {
                contact.instance = id;
                contacts.push(contact);
            }
        }
        contacts
    }

    /// [`Scene::closest_hit`] for a batch of rays, in parallel with one
    /// cache per worker.
    pub fn closest_hits_par(&self, rays: &[Ray], t_min: f64, t_max: f64) -> Vec<Option<SceneHit>> {
        rays.par_iter()
            .map_init(EvalCache::new, |cache, ray| self.closest_hit(ray, t_min, t_max, cache))
            .collect()
    }

    /// [`Scene::occluded`] for a batch of rays, in parallel.
    pub fn occluded_par(&self, rays: &[Ray], t_min: f64, t_max: f64) -> Vec<bool> {
        rays.par_iter()
            .map_init(EvalCache::new, |cache, ray| self.occluded(ray, t_min, t_max, cache))
            .collect()
    }
}
