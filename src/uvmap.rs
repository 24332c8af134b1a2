//! Texture parametrizations.
//!
//! Each map takes a point roughly inside the unit cube around the origin
//! and returns `(u, v)` in `[0, 1)`. The 2D maps project onto the XY plane;
//! the curved maps wrap around the Z axis.

use std::f64::consts::PI;

use crate::consts::EPSILON;
use crate::vector::Vec3;

const TWO_PI: f64 = 2.0 * PI;

fn clamp_unit(v: f64) -> f64 {
    v.max(-1.0).min(1.0)
}

/// Angle around Z as a fraction of a turn, measured from +Y.
fn around_z(x: f64, y: f64) -> f64 {
    let r = (x * x + y * y).sqrt();
    if r <= EPSILON {
        return 0.0;
    }

    let u = clamp_unit(y / r).acos() / TWO_PI;
    if x > 0.0 { 1.0 - u } else { u }
}

/// Flat projection with one tile spanning `[-1, 1]` in x and y.
pub fn plane_map(p: Vec3) -> (f64, f64) {
    let x = p.x * 0.5 + 0.5;
    let y = 0.5 - p.y * 0.5;

    (x - x.floor(), y - y.floor())
}

/// A unit disc in the XY plane stretched onto the unit square.
pub fn disc_map(p: Vec3) -> (f64, f64) {
    let x = p.x * 0.5 + 0.5;
    let y = p.y * 0.5 + 0.5;
    let x = (x - x.floor()) * 2.0 - 1.0;
    let y = (y - y.floor()) * 2.0 - 1.0;

    if x.abs() < EPSILON && y.abs() < EPSILON {
        return (0.5, 0.5);
    }
    if x * x + y * y >= 1.0 {
        return (0.0, 0.0);
    }

    let r = (1.0 - y * y).sqrt() * 2.0;
    let u = if r.abs() > EPSILON { x / r + 0.5 } else if x > 0.0 { 1.0 } else { 0.0 };
    let r = (1.0 - x * x).sqrt() * 2.0;
    let v = if r.abs() > EPSILON { 0.5 - y / r } else if y > 0.0 { 0.0 } else { 1.0 };

    (u, v)
}

/// Sphere with its poles on the Z axis.
pub fn sphere_map(p: Vec3) -> (f64, f64) {
    let r = p.magnitude();
    if r < EPSILON {
        return (0.0, 0.5);
    }

    let v = clamp_unit(-p.z / r).acos() / PI;
    (around_z(p.x, p.y), v)
}

/// Torus around the Z axis with a unit major radius.
pub fn torus_map(p: Vec3) -> (f64, f64) {
    let r = (p.x * p.x + p.y * p.y).sqrt();
    if r <= EPSILON {
        return (0.0, 0.0);
    }

    let (rx, ry) = (p.x / r, p.y / r);
    let u = around_z(p.x, p.y);

    // angle around the tube, from the inner rim
    let tube = Vec3::new(p.x - rx, p.y - ry, p.z);
    let len = tube.magnitude();
    if len <= EPSILON {
        return (u, 0.0);
    }

    let c = clamp_unit(-(tube.x * rx + tube.y * ry) / len);
    let v = c.acos() / TWO_PI;
    (u, if p.z > 0.0 { 1.0 - v } else { v })
}

/// Cube face and face coordinates for a direction.
///
/// Faces are numbered -X, +X, -Y, +Y, -Z, +Z.
pub fn environment_map(d: Vec3) -> (usize, f64, f64) {
    let (ax, ay, az) = (d.x.abs(), d.y.abs(), d.z.abs());

    let (face, du, dv, dn) = if ax > az && ax > ay {
        if d.x < 0.0 { (0, d.y, d.z, ax) } else { (1, -d.y, d.z, ax) }
    } else if ay > az {
        if d.y < 0.0 { (2, -d.x, d.z, ay) } else { (3, d.x, d.z, ay) }
    } else if d.z < 0.0 {
        (4, d.x, d.y, az)
    } else {
        (5, d.x, -d.y, az)
    };

    if dn <= 0.0 {
        return (face, 0.5, 0.5);
    }

    let t = 0.5 / dn;
    (face, t * du + 0.5, t * dv + 0.5)
}

/* Tests */

#[test]
fn plane_map_tiles() {
    assert_eq!(plane_map(Vec3::new(0.0, 0.0, 0.0)), (0.5, 0.5));
    let (u, v) = plane_map(Vec3::new(1.5, -1.5, 0.0));
    assert!((u - 0.25).abs() < 1e-12 && (v - 0.25).abs() < 1e-12);
}

#[test]
fn sphere_map_poles_and_equator() {
    let (_, v) = sphere_map(Vec3::new(0.0, 0.0, -1.0));
    assert!(v.abs() < 1e-12);
    let (_, v) = sphere_map(Vec3::new(0.0, 0.0, 1.0));
    assert!((v - 1.0).abs() < 1e-12);

    let (u, v) = sphere_map(Vec3::new(0.0, 1.0, 0.0));
    assert!(u.abs() < 1e-12 && (v - 0.5).abs() < 1e-12);
    let (u, _) = sphere_map(Vec3::new(-1.0, 0.0, 0.0));
    assert!((u - 0.25).abs() < 1e-12);
    let (u, _) = sphere_map(Vec3::new(1.0, 0.0, 0.0));
    assert!((u - 0.75).abs() < 1e-12);
}

#[test]
fn disc_map_center() {
    assert_eq!(disc_map(Vec3::zero()), (0.5, 0.5));
    assert_eq!(disc_map(Vec3::new(0.99, 0.99, 0.0)), (0.0, 0.0));
}

#[test]
fn environment_faces() {
    assert_eq!(environment_map(Vec3::new(-1.0, 0.0, 0.0)).0, 0);
    assert_eq!(environment_map(Vec3::new(1.0, 0.2, 0.0)).0, 1);
    assert_eq!(environment_map(Vec3::new(0.0, -1.0, 0.0)).0, 2);
    assert_eq!(environment_map(Vec3::new(0.1, 1.0, 0.0)).0, 3);
    assert_eq!(environment_map(Vec3::new(0.0, 0.0, -1.0)).0, 4);
    let (face, u, v) = environment_map(Vec3::new(0.0, 0.3, 1.0));
    assert_eq!(face, 5);
    assert!((u - 0.5).abs() < 1e-12 && (v - 0.35).abs() < 1e-12);
}
