//! Containment, signed distance and sphere contact, all answered by casting
//! rays through the instance's program.
//!
//! Signed distance is a ray-probe estimate: along each probed direction the
//! first crossing is exact, and the minimum over directions is an upper bound
//! of the true distance that is exact whenever the closest surface point lies
//! on a probe.

use crate::instance::Instance;
use crate::settings::QuerySettings;
use csgvm_interval::MaterialId;
use csgvm_math::{Aabb3, Dir3, Point3, Ray, Vec3};
use csgvm_program::EvalCache;

/// Sphere against instance contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Index of the touched instance in its scene (0 for a standalone
    /// instance query).
    pub instance: usize,
    /// Closest surface point found.
    pub point: Point3,
    /// Outward surface normal at `point`.
    pub normal: Vec3,
    /// Overlap depth: sphere radius minus signed distance of its center.
    pub penetration: f64,
    /// Material at `point`.
    pub material: MaterialId,
}

/// Containment along the configured direction.
pub fn is_inside(instance: &Instance, point: &Point3, settings: &QuerySettings, cache: &mut EvalCache) -> bool {
    is_inside_along(instance, point, &settings.containment_dir(), cache)
}

/// True if `point` lies inside the solid, decided by the interval containing
/// `t = 0` on the ray from `point` along `dir`.
pub fn is_inside_along(instance: &Instance, point: &Point3, dir: &Dir3, cache: &mut EvalCache) -> bool {
    if !instance.world_bounds().contains_point(point) {
        return false;
    }
    let ray = Ray::from_dir(*point, *dir);
    instance.intervals(&ray, 0.0, 0.0, cache).contains(0.0)
}

/// Signed distance estimate of `point` to the surface (negative inside),
/// with the direction toward the closest surface point found.
///
/// `None` when no probe reaches the surface, for example for an empty
/// instance.
pub fn signed_distance_dir(
    instance: &Instance,
    point: &Point3,
    settings: &QuerySettings,
    cache: &mut EvalCache,
) -> Option<(f64, Dir3)> {
    let inside = is_inside(instance, point, settings, cache);
    let nearest = |dir: Dir3, cache: &mut EvalCache| {
        let ray = Ray::from_dir(*point, dir);
        instance
            .closest_hit(&ray, 0.0, f64::INFINITY, cache)
            .map(|hit| (hit.t, dir))
    };

    let mut best: Option<(f64, Dir3)> = None;
    let mut consider = |candidate: Option<(f64, Dir3)>| {
        if let Some((t, dir)) = candidate {
            if best.map_or(true, |(b, _)| t < b) {
                best = Some((t, dir));
            }
        }
    };

    if !inside {
        let to_center = instance.world_bounds().center() - point;
        if let Some(dir) = Dir3::try_new(to_center, 1e-12) {
            consider(nearest(dir, cache));
        }
    }
    for probe in settings.probes() {
        consider(nearest(Dir3::new_unchecked(*probe), cache));
    }

    best.map(|(t, dir)| if inside { (-t, dir) } else { (t, dir) })
}

/// Signed distance estimate of `point` (negative inside). Infinite when
/// no surface is reachable.
pub fn signed_distance(instance: &Instance, point: &Point3, settings: &QuerySettings, cache: &mut EvalCache) -> f64 {
    signed_distance_dir(instance, point, settings, cache).map_or(f64::INFINITY, |(d, _)| d)
}

/// Contact between a sphere and the instance, if they overlap.
pub fn contact_sphere(
    instance: &Instance,
    center: &Point3,
    radius: f64,
    settings: &QuerySettings,
    cache: &mut EvalCache,
) -> Option<Contact> {
    let mut reach = Aabb3::from_center_half_extents(*center, Vec3::repeat(radius));
    reach.expand(settings.ray_offset);
    if !instance.world_bounds().overlaps(&reach) {
        return None;
    }
    let (distance, dir) = signed_distance_dir(instance, center, settings, cache)?;
    if distance > radius {
        return None;
    }
    // Recover the surface point and normal along the winning probe.
    let ray = Ray::from_dir(*center, dir);
    let hit = instance.closest_hit(&ray, 0.0, f64::INFINITY, cache)?;
    Some(Contact {
        instance: 0,
        point: hit.point,
        normal: hit.normal,
        penetration: radius - distance,
        material: hit.material,
    })
}
