use std::f64::consts::PI;
use std::rc::Rc;

use crate::consts::{ EPSILON, HUGE };
use crate::draw::{ perpendicular, polyline, ring, LineSink };
use crate::intersect::{ HitLocal, HitSink, Scan };
use crate::ray::Ray;
use crate::shape::{ pad, Object, ObjectKind, Primitive };
use crate::vector::Vec3;
use crate::xform::dir_to_matrix;

/// A cone frustum between a base and an end point.
///
/// The lateral surface satisfies `x² + z² = (base_radius - slope·y)²` in a
/// frame whose Y axis runs from the base to the end point.
#[derive(Clone, Debug, PartialEq)]
pub struct Cone {
    pub base: Vec3,
    pub end: Vec3,
    pub base_radius: f64,
    pub end_radius: f64,
    pub closed: bool,

    height: f64,
    slope: f64,

    // Rows of the rotation into the cone frame
    rx: Vec3,
    ry: Vec3,
    rz: Vec3,
}

impl Cone {
    pub fn new(base: Vec3, end: Vec3, base_radius: f64, end_radius: f64, closed: bool) -> Cone {
        let axis = end - base;
        let height = axis.magnitude().max(EPSILON);
        let (rx, ry, rz) = dir_to_matrix(axis);

        Cone {
            base,
            end,
            base_radius,
            end_radius,
            closed,
            height,
            slope: (base_radius - end_radius) / height,
            rx,
            ry,
            rz,
        }
    }

    /// Expresses an offset from the base point in the cone frame.
    fn to_frame(&self, v: Vec3) -> Vec3 {
        Vec3::new(v.dot(&self.rx), v.dot(&self.ry), v.dot(&self.rz))
    }

    fn from_frame(&self, v: Vec3) -> Vec3 {
        self.rx * v.x + self.ry * v.y + self.rz * v.z
    }
}

/// Creates a cone object. Equal radii make a cylinder.
pub fn make_cone(base: Vec3, end: Vec3, base_radius: f64, end_radius: f64, closed: bool) -> Object {
    let cone = Cone::new(base, end, base_radius, end_radius, closed);
    Object::new(ObjectKind::Cone(Rc::new(cone)))
}

impl Primitive for Cone {
    fn intersect<'a>(&'a self, ray: &Ray, hits: &mut HitSink<'_, 'a>, _scan: &Scan<'_, 'a>) {
        let (dir, scale) = ray.unit_dir();
        if scale == 0.0 {
            return;
        }

        let o = self.to_frame(ray.origin - self.base);
        let d = self.to_frame(dir);

        // Lateral surface, using |d| == 1
        let ssq = self.slope * self.slope;
        let k = self.base_radius * self.slope;
        let dy2 = d.y * d.y;
        let qa = 1.0 - dy2 - dy2 * ssq;
        let qb = 2.0 * (o.x * d.x + o.z * d.z + d.y * (k - ssq * o.y));
        let qc = o.x * o.x + o.z * o.z + o.y * (2.0 * k - ssq * o.y)
            - self.base_radius * self.base_radius;

        let disc = qb * qb - 4.0 * qa * qc;
        if disc < 0.0 {
            return;
        }
        let disc = disc.sqrt();
        let ct1 = (-qb + disc) / (2.0 * qa);
        let ct2 = (-qb - disc) / (2.0 * qa);

        // Distances to the base and end planes
        let (bpt, ept, lo, hi) = if d.y.abs() > EPSILON {
            let bpt = -o.y / d.y;
            let ept = (self.height - o.y) / d.y;
            let (lo, hi) = if bpt < ept { (bpt, ept) } else { (ept, bpt) };
            if hi < EPSILON {
                return;
            }
            (bpt, ept, lo, hi)
        } else {
            if o.y < 0.0 || o.y > self.height {
                return;
            }
            (-1.0, -1.0, -HUGE, HUGE)
        };

        let mut found = [0.0; 4];
        let mut n = 0;
        let mut keep = |t: f64| {
            let t = t / scale;
            if t > ray.tmin && t < ray.tmax {
                found[n] = t;
                n += 1;
            }
        };

        for ct in [ct1, ct2].iter() {
            if *ct > lo && *ct < hi {
                keep(*ct);
            }
        }

        if self.closed {
            let within = |t: f64, r: f64| {
                let (x, z) = (o.x + t * d.x, o.z + t * d.z);
                x * x + z * z < r * r
            };
            if within(bpt, self.base_radius) {
                keep(bpt);
            }
            if within(ept, self.end_radius) {
                keep(ept);
            }
        }

        for t in found[..n].iter() {
            hits.push(*t, false);
        }
        hits.alternate();
    }

    fn normal(&self, p: Vec3, _local: &HitLocal) -> Vec3 {
        let q = self.to_frame(p - self.base);

        if self.closed {
            if q.y < EPSILON {
                return self.base - self.end;
            }
            if (q.y - self.height).abs() < EPSILON {
                return self.end - self.base;
            }
        }

        let s = self.slope;
        self.from_frame(Vec3::new(q.x, s * (self.base_radius - s * q.y), q.z))
    }

    fn is_inside(&self, p: Vec3) -> bool {
        let q = self.to_frame(p - self.base);
        let r = self.base_radius - q.y * self.slope;

        q.x * q.x + q.z * q.z - r * r <= 0.0 && q.y >= 0.0 && q.y <= self.height
    }

    /// Angle around the axis and fraction of the height.
    fn uv(&self, p: Vec3, _local: &HitLocal) -> (f64, f64) {
        let q = self.to_frame(p - self.base);
        let v = q.y / self.height;

        let rad = (q.x * q.x + q.z * q.z).sqrt();
        if rad <= EPSILON {
            return (0.0, v);
        }

        let u = (q.z / rad).max(-1.0).min(1.0).acos() / (2.0 * PI);
        (if q.x > 0.0 { 1.0 - u } else { u }, v)
    }

    fn extents(&self) -> (Vec3, Vec3) {
        let mut bmin = Vec3::zero();
        let mut bmax = Vec3::zero();
        let (br, er) = (self.base_radius.abs(), self.end_radius.abs());

        for i in 0..3 {
            // Half width of a unit circle around the axis, along axis i
            let w = (1.0 - self.ry[i] * self.ry[i]).max(0.0).sqrt();
            bmin[i] = (self.base[i] - w * br).min(self.end[i] - w * er);
            bmax[i] = (self.base[i] + w * br).max(self.end[i] + w * er);
        }

        pad(bmin, bmax)
    }

    /// Rings around both ends joined by a line every 30 degrees.
    fn draw(&self, sink: &mut dyn LineSink, to_world: &dyn Fn(Vec3) -> Vec3) {
        let axis = (self.end - self.base) / self.height;
        let a = perpendicular(axis);
        let b = axis.cross(&a);

        let bottom: Vec<Vec3> = ring(self.base, a, b, self.base_radius, 12)
            .into_iter().map(|p| to_world(p)).collect();
        let top: Vec<Vec3> = ring(self.end, a, b, self.end_radius, 12)
            .into_iter().map(|p| to_world(p)).collect();

        polyline(sink, &bottom, true);
        polyline(sink, &top, true);
        for (p, q) in bottom.iter().zip(top.iter()) {
            sink.move_to(*p);
            sink.line_to(*q);
        }
    }
}

/* Tests */

#[cfg(test)]
use crate::stats::Stats;

#[cfg(test)]
fn hits_of(obj: &Object, ray: &Ray) -> Vec<(f64, bool)> {
    let stats = Stats::new();
    let scan = Scan::new(&stats).with_all(true);
    let mut pool = Vec::new();
    obj.intersect(ray, &scan, &mut pool);
    pool.iter().map(|h| (h.t, h.entering)).collect()
}

#[cfg(test)]
fn near(a: &[(f64, bool)], b: &[(f64, bool)]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b.iter()).all(|(x, y)| (x.0 - y.0).abs() < 1e-9 && x.1 == y.1)
}

#[test]
fn open_cylinder_across_axis() {
    let c = make_cone(Vec3::zero(), Vec3::new(0.0, 0.0, 2.0), 1.0, 1.0, false);
    let r = Ray::new(Vec3::new(-5.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0));

    assert!(near(&hits_of(&c, &r), &[(4.0, true), (6.0, false)]));
}

#[test]
fn open_cylinder_along_axis_misses() {
    let c = make_cone(Vec3::zero(), Vec3::new(0.0, 0.0, 2.0), 1.0, 1.0, false);
    let r = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));

    assert!(hits_of(&c, &r).is_empty());
}

#[test]
fn closed_cylinder_caps() {
    let c = make_cone(Vec3::zero(), Vec3::new(0.0, 0.0, 2.0), 1.0, 1.0, true);
    let r = Ray::new(Vec3::new(0.5, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));

    assert!(near(&hits_of(&c, &r), &[(5.0, true), (7.0, false)]));
}

#[test]
fn cone_narrows_to_tip() {
    // Base radius 1 at z = 0, closing to a point at z = 1
    let c = make_cone(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0), 1.0, 0.0, false);
    let r = Ray::new(Vec3::new(-5.0, 0.0, 0.5), Vec3::new(1.0, 0.0, 0.0));

    assert!(near(&hits_of(&c, &r), &[(4.5, true), (5.5, false)]));
}

#[test]
fn cone_side_normal() {
    let c = Cone::new(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0), 1.0, 0.0, false);
    let n = c.normal(Vec3::new(0.5, 0.0, 0.5), &HitLocal::None).normalize();

    let want = Vec3::new(1.0, 0.0, 1.0).normalize();
    assert!((n - want).magnitude() < 1e-9);
}

#[test]
fn cone_inside_and_extents() {
    let c = Cone::new(Vec3::zero(), Vec3::new(0.0, 0.0, 2.0), 1.0, 0.5, true);
    assert!(c.is_inside(Vec3::new(0.0, 0.0, 1.0)));
    assert!(!c.is_inside(Vec3::new(0.9, 0.0, 1.9)));
    assert!(!c.is_inside(Vec3::new(0.0, 0.0, 2.5)));

    let (bmin, bmax) = c.extents();
    assert_eq!(bmin, Vec3::new(-1.0, -1.0, 0.0));
    assert_eq!(bmax, Vec3::new(1.0, 1.0, 2.0));
}
