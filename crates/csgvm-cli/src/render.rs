//! Depth image rendering through the scene BVH.

use csgvm::prelude::*;
use csgvm::{Aabb3, EvalStats};
use image::GrayImage;
use rayon::prelude::*;

/// Pinhole camera looking at a target point.
pub struct Camera {
    eye: Point3,
    forward: Vec3,
    right: Vec3,
    up: Vec3,
    /// Tangent of half the vertical field of view.
    half_fov: f64,
}

impl Camera {
    /// Camera at `eye` looking toward `target`, with vertical field of view
    /// `fov` in radians.
    pub fn look_at(eye: Point3, target: Point3, fov: f64) -> Self {
        let forward = (target - eye).normalize();
        let world_up = if forward.z.abs() > 0.99 { Vec3::y() } else { Vec3::z() };
        let right = forward.cross(&world_up).normalize();
        let up = right.cross(&forward);
        Self {
            eye,
            forward,
            right,
            up,
            half_fov: (fov * 0.5).tan(),
        }
    }

    /// Camera framing `bounds` from above and to the side.
    pub fn framing(bounds: &Aabb3) -> Self {
        let center = bounds.center();
        let radius = bounds.extent().norm().max(1.0) * 0.5;
        let eye = center + Vec3::new(0.6, -1.0, 0.9).normalize() * radius * 2.4;
        Self::look_at(eye, center, 50f64.to_radians())
    }

    /// Primary ray through pixel `(x, y)` of a `width` by `height` image.
    pub fn ray(&self, x: u32, y: u32, width: u32, height: u32) -> Ray {
        let aspect = width as f64 / height as f64;
        let u = (2.0 * (x as f64 + 0.5) / width as f64 - 1.0) * self.half_fov * aspect;
        let v = (1.0 - 2.0 * (y as f64 + 0.5) / height as f64) * self.half_fov;
        Ray::new(self.eye, self.forward + self.right * u + self.up * v)
    }

    /// Camera position.
    pub fn eye(&self) -> Point3 {
        self.eye
    }
}

/// Rendered depth image plus how much work it took.
pub struct DepthImage {
    /// Grayscale depth: near is bright, background is black.
    pub image: GrayImage,
    /// Pixels that hit something.
    pub covered: usize,
    /// Interpreter counters summed over all workers.
    pub stats: EvalStats,
}

/// Render the closest-hit depth of every pixel, rows in parallel.
pub fn render_depth(scene: &Scene, camera: &Camera, width: u32, height: u32) -> DepthImage {
    let rows: Vec<(Vec<f64>, EvalStats)> = (0..height)
        .into_par_iter()
        .map_init(EvalCache::new, |cache, y| {
            cache.reset_stats();
            let row: Vec<f64> = (0..width)
                .map(|x| {
                    let ray = camera.ray(x, y, width, height);
                    scene
                        .closest_hit(&ray, 0.0, f64::INFINITY, cache)
                        .map_or(f64::INFINITY, |h| h.hit.t)
                })
                .collect();
            (row, *cache.stats())
        })
        .collect();

    let mut stats = EvalStats::default();
    let mut near = f64::INFINITY;
    let mut far = 0.0f64;
    for (row, s) in &rows {
        stats.invocations += s.invocations;
        stats.primitive_evals += s.primitive_evals;
        stats.cache_hits += s.cache_hits;
        stats.overflow_merges += s.overflow_merges;
        stats.early_rejects += s.early_rejects;
        for &t in row.iter().filter(|t| t.is_finite()) {
            near = near.min(t);
            far = far.max(t);
        }
    }

    let span = (far - near).max(1e-9);
    let mut covered = 0;
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for (row, _) in &rows {
        for &t in row {
            if t.is_finite() {
                covered += 1;
                // Keep hits visibly brighter than the background.
                let shade = 1.0 - (t - near) / span;
                pixels.push((40.0 + shade * 215.0).round() as u8);
            } else {
                pixels.push(0);
            }
        }
    }
    let image = GrayImage::from_raw(width, height, pixels).unwrap_or_else(|| GrayImage::new(width, height));
    DepthImage {
        image,
        covered,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csgvm::Settings;

    #[test]
    fn test_center_pixel_hits_framed_scene() {
        let settings = Settings::default();
        let scene = crate::demo::scene(&settings).unwrap();
        let camera = Camera::look_at(Point3::new(0.0, 0.0, 40.0), Point3::origin(), 0.8);
        let depth = render_depth(&scene, &camera, 32, 24);
        assert_eq!(depth.image.dimensions(), (32, 24));
        assert!(depth.covered > 0);
        assert!(depth.covered < 32 * 24);
        assert!(depth.stats.invocations > 0);
    }

    #[test]
    fn test_camera_center_ray_points_at_target() {
        let camera = Camera::look_at(Point3::new(0.0, -10.0, 0.0), Point3::origin(), 1.0);
        let ray = camera.ray(50, 50, 101, 101);
        assert!((ray.direction.as_ref() - Vec3::y()).norm() < 1e-12);
    }
}
