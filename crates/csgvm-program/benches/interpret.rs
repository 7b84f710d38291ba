//! Interpreter throughput against the recursive tree walk.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use csgvm_interval::{MaterialId, Shape};
use csgvm_math::{Point3, Ray, Vec3};
use csgvm_program::{execute, execute_shadow, CompileSettings, CsgRef, CsgTree, EvalCache};

/// A plate with a grid of `n * n` cylindrical holes, capped by a torus rim.
fn perforated_plate(n: usize) -> CsgTree {
    let mut tree = CsgTree::new();
    let extent = n as f64;
    let plate = tree
        .add_primitive(
            Shape::cuboid(Point3::origin(), Vec3::new(extent, extent, 0.25)),
            MaterialId(0),
        )
        .unwrap();
    let mut holes: Option<CsgRef> = None;
    for i in 0..n {
        for j in 0..n {
            let x = 2.0 * i as f64 - extent + 1.0;
            let y = 2.0 * j as f64 - extent + 1.0;
            let hole = tree
                .add_primitive(
                    Shape::cylinder(Point3::new(x, y, -1.0), Vec3::z_axis(), 0.4, 2.0),
                    MaterialId(1),
                )
                .unwrap();
            holes = Some(match holes {
                Some(acc) => tree.union(acc, hole).unwrap().into(),
                None => hole.into(),
            });
        }
    }
    let body = match holes {
        Some(h) => tree.difference(plate, h).unwrap().into(),
        None => CsgRef::from(plate),
    };
    let rim = tree
        .add_primitive(
            Shape::torus(Point3::origin(), Vec3::z_axis(), extent, 0.3),
            MaterialId(2),
        )
        .unwrap();
    let root = tree.union(body, rim).unwrap();
    tree.mark_root(root).unwrap();
    tree
}

fn rays(count: usize, extent: f64) -> Vec<Ray> {
    let mut rng = fastrand::Rng::with_seed(7);
    (0..count)
        .map(|_| {
            let x = (rng.f64() * 2.0 - 1.0) * extent;
            let y = (rng.f64() * 2.0 - 1.0) * extent;
            let dir = Vec3::new(rng.f64() * 0.2 - 0.1, rng.f64() * 0.2 - 0.1, 1.0);
            Ray::new(Point3::new(x, y, -10.0), dir)
        })
        .collect()
}

fn bench_interpret(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpret");
    for n in [2usize, 4] {
        let tree = perforated_plate(n);
        let program = tree.compile(&CompileSettings::default()).unwrap();
        let plain = tree.compile(&CompileSettings::unoptimized()).unwrap();
        let rays = rays(256, n as f64 + 1.0);

        group.bench_with_input(BenchmarkId::new("reference", n), &rays, |b, rays| {
            b.iter(|| {
                for ray in rays {
                    black_box(tree.evaluate(ray, 0.0, f64::INFINITY).unwrap());
                }
            })
        });
        group.bench_with_input(BenchmarkId::new("unoptimized", n), &rays, |b, rays| {
            let mut cache = EvalCache::for_program(&plain);
            b.iter(|| {
                for ray in rays {
                    black_box(execute(&plain, ray, 0.0, f64::INFINITY, &mut cache));
                }
            })
        });
        group.bench_with_input(BenchmarkId::new("optimized", n), &rays, |b, rays| {
            let mut cache = EvalCache::for_program(&program);
            b.iter(|| {
                for ray in rays {
                    black_box(execute(&program, ray, 0.0, f64::INFINITY, &mut cache));
                }
            })
        });
        group.bench_with_input(BenchmarkId::new("shadow", n), &rays, |b, rays| {
            let mut cache = EvalCache::for_program(&program);
            b.iter(|| {
                for ray in rays {
                    black_box(execute_shadow(&program, ray, 0.0, f64::INFINITY, &mut cache));
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_interpret);
criterion_main!(benches);
