//! BVH-accelerated scene queries over a grid of instanced programs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use csgvm_interval::{MaterialId, Shape};
use csgvm_math::{Point3, Ray, Transform, Vec3};
use csgvm_program::{CompileSettings, CsgTree, EvalCache};
use csgvm_scene::{BvhSettings, Instance, Scene};
use std::sync::Arc;

fn grid_scene(n: usize) -> Scene {
    let mut tree = CsgTree::new();
    let ball = tree
        .add_primitive(Shape::sphere(Point3::origin(), 1.0), MaterialId(0))
        .unwrap();
    let cube = tree
        .add_primitive(Shape::cuboid(Point3::origin(), Vec3::repeat(0.75)), MaterialId(1))
        .unwrap();
    let root = tree.intersect(ball, cube).unwrap();
    tree.mark_root(root).unwrap();
    let program = Arc::new(tree.compile(&CompileSettings::default()).unwrap());

    let mut instances = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            let at = Transform::translation(3.0 * i as f64, 3.0 * j as f64, 0.0);
            instances.push(Instance::new(program.clone(), at).unwrap());
        }
    }
    Scene::new(instances, &BvhSettings::default()).unwrap()
}

fn camera_rays(n: usize, extent: f64) -> Vec<Ray> {
    let mut rays = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            let px = x as f64 / n as f64 * extent;
            let py = y as f64 / n as f64 * extent;
            rays.push(Ray::new(Point3::new(px, py, -10.0), Vec3::new(0.05, 0.05, 1.0)));
        }
    }
    rays
}

fn bench_scene(c: &mut Criterion) {
    let mut group = c.benchmark_group("scene");
    for n in [8usize, 32] {
        let scene = grid_scene(n);
        let rays = camera_rays(64, 3.0 * n as f64);
        group.throughput(Throughput::Elements(rays.len() as u64));

        group.bench_with_input(BenchmarkId::new("closest_hit", n), &rays, |b, rays| {
            let mut cache = EvalCache::new();
            b.iter(|| {
                for ray in rays {
                    black_box(scene.closest_hit(ray, 0.0, f64::INFINITY, &mut cache));
                }
            })
        });
        group.bench_with_input(BenchmarkId::new("occluded", n), &rays, |b, rays| {
            let mut cache = EvalCache::new();
            b.iter(|| {
                for ray in rays {
                    black_box(scene.occluded(ray, 0.0, f64::INFINITY, &mut cache));
                }
            })
        });
        group.bench_with_input(BenchmarkId::new("closest_hits_par", n), &rays, |b, rays| {
            b.iter(|| black_box(scene.closest_hits_par(rays, 0.0, f64::INFINITY)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_scene);
criterion_main!(benches);
