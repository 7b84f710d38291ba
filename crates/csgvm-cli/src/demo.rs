//! Built-in demo solids and scene.

use csgvm::prelude::*;
use csgvm::{CsgRef, Dir3};
use std::f64::consts::PI;
use std::sync::Arc;

/// Unit sphere minus a centered box of half extent 0.6.
pub fn sphere_minus_box() -> Result<CsgTree, CsgError> {
    let mut tree = CsgTree::new();
    let ball = tree.add_primitive(Shape::sphere(Point3::origin(), 1.0), MaterialId(0))?;
    let cube = tree.add_primitive(Shape::cuboid(Point3::origin(), Vec3::repeat(0.6)), MaterialId(0))?;
    let cut = tree.difference(ball, cube)?;
    tree.mark_root(cut)?;
    Ok(tree)
}

/// A flanged hub: a plate ringed by a torus, a tapered boss, a through bore
/// and four bolt holes.
///
/// The boss is referenced twice (by the body and by a collar around the
/// bore), so the compiled program stores it once and recalls it.
pub fn hub() -> Result<CsgTree, CsgError> {
    let mut tree = CsgTree::new();
    let z = Vec3::z_axis();

    let plate = tree.add_primitive(
        Shape::cuboid(Point3::origin(), Vec3::new(2.0, 2.0, 0.25)),
        MaterialId(1),
    )?;
    let rim = tree.add_primitive(Shape::torus(Point3::origin(), z, 2.0, 0.3), MaterialId(4))?;
    let boss = tree.add_primitive(
        Shape::cylinder(Point3::new(0.0, 0.0, -0.25), z, 1.0, 1.5),
        MaterialId(2),
    )?;
    let taper = tree.add_primitive(
        Shape::cone(Point3::new(0.0, 0.0, 1.25), Dir3::new_normalize(Vec3::z()), 1.0, 1.0),
        MaterialId(2),
    )?;
    let bore = tree.add_primitive(
        Shape::cylinder(Point3::new(0.0, 0.0, -1.0), z, 0.45, 4.0),
        MaterialId(3),
    )?;
    let core = tree.add_primitive(
        Shape::cylinder(Point3::new(0.0, 0.0, -1.0), z, 0.5, 4.0),
        MaterialId(3),
    )?;

    let mut bolts: Option<CsgRef> = None;
    for k in 0..4 {
        let angle = PI / 4.0 + k as f64 * PI / 2.0;
        let at = Point3::new(1.4 * angle.cos(), 1.4 * angle.sin(), -1.0);
        let hole = tree.add_primitive(Shape::cylinder(at, z, 0.2, 2.0), MaterialId(3))?;
        bolts = Some(match bolts {
            Some(acc) => tree.union(acc, hole)?.into(),
            None => hole.into(),
        });
    }

    let flange = tree.union(plate, rim)?;
    let raised = tree.union(boss, taper)?;
    let body = tree.union(flange, raised)?;
    let mut part: CsgRef = tree.difference(body, bore)?.into();
    if let Some(bolts) = bolts {
        part = tree.difference(part, bolts)?.into();
    }
    let collar = tree.difference(raised, core)?;
    let root = tree.union(part, collar)?;
    tree.mark_root(root)?;
    Ok(tree)
}

/// A grid of hubs and cut spheres in assorted placements.
pub fn scene(settings: &Settings) -> Result<Scene, CsgError> {
    let hub = Arc::new(hub()?.compile(&settings.compile)?);
    let cut = Arc::new(sphere_minus_box()?.compile(&settings.compile)?);

    let mut instances = Vec::new();
    for i in 0..4 {
        for j in 0..4 {
            let x = (i as f64 - 1.5) * 5.0;
            let y = (j as f64 - 1.5) * 5.0;
            let spin = Transform::rotation_z(0.3 * (i + j) as f64);
            let tilt = Transform::rotation_x(0.4 * i as f64 - 0.6);
            let at = Transform::translation(x, y, 0.0).then(&spin).then(&tilt);
            let (program, placement) = if (i + j) % 3 == 2 {
                (&cut, at.then(&Transform::scale(1.5, 1.0, 1.5)))
            } else {
                (&hub, at)
            };
            let mut instance = Instance::new(Arc::clone(program), placement)?;
            if j == 3 {
                // Top row painted uniformly.
                instance = instance.with_material(MaterialId(7));
            }
            instances.push(instance);
        }
    }
    Scene::with_settings(instances, &settings.bvh, settings.query.clone())
}
