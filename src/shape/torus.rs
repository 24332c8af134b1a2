use std::f64::consts::PI;

use crate::consts::EPSILON;
use crate::draw::{ polyline, ring, LineSink };
use crate::intersect::{ HitLocal, HitSink, Scan };
use crate::ray::Ray;
use crate::shape::{ Object, ObjectKind, Primitive };
use crate::solve::solve_poly;
use crate::uvmap::torus_map;
use crate::vector::Vec3;

/// A torus around the Z axis through `center`.
///
/// The surface is the quartic
///
/// ```text
/// (|p|² + R² - r²)² = 4R²(x² + y²)
/// ```
///
/// with `R` the distance from the center to the middle of the tube and `r`
/// the tube radius.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Torus {
    pub center: Vec3,
    pub major: f64,
    pub minor: f64,

    major_sq: f64,
    minor_sq: f64,

    // Squared radius of the bounding sphere
    bound_sq: f64,
}

impl Torus {
    pub fn new(center: Vec3, major: f64, minor: f64) -> Torus {
        let major = major.abs().max(EPSILON);
        let minor = minor.abs();

        Torus {
            center,
            major,
            minor,
            major_sq: major * major,
            minor_sq: minor * minor,
            bound_sq: (major + minor) * (major + minor),
        }
    }
}

pub fn make_torus(center: Vec3, major: f64, minor: f64) -> Object {
    Object::new(ObjectKind::Torus(Torus::new(center, major, minor)))
}

impl Primitive for Torus {
    fn intersect<'a>(&'a self, ray: &Ray, hits: &mut HitSink<'_, 'a>, _scan: &Scan<'_, 'a>) {
        let (d, scale) = ray.unit_dir();
        if scale == 0.0 {
            return;
        }

        // Work along the unit direction, so the window scales too
        let (lo, hi) = (ray.tmin * scale, ray.tmax * scale);
        let o = ray.origin - self.center;

        let c0 = d.x * o.x + d.y * o.y;
        let c1 = c0 + d.z * o.z;
        let c2 = o.x * o.x + o.y * o.y;
        let c3 = c2 + o.z * o.z;

        // Bounding sphere
        let b = 2.0 * c1;
        let disc = b * b - 4.0 * (c3 - self.bound_sq);
        if disc < EPSILON {
            return;
        }
        let disc = disc.sqrt();
        let t1 = (-b - disc) * 0.5;
        let t2 = (-b + disc) * 0.5;
        if (t1 < lo && t2 < lo) || (t1 > hi && t2 > hi) {
            return;
        }

        // Slab between the top and bottom of the tube
        let r = self.minor;
        let (z1, z2) = (o.z + t1 * d.z, o.z + t2 * d.z);
        if (z1 > r && z2 > r) || (z1 < -r && z2 < -r) {
            return;
        }

        // Straight down the hole
        if r < self.major && d.z.abs() > EPSILON {
            let hole = (self.major - r) * (self.major - r);
            let through = |z: f64| {
                let t = (z - o.z) / d.z;
                let (x, y) = (o.x + t * d.x, o.y + t * d.y);
                x * x + y * y < hole
            };
            if through(r) && through(-r) {
                return;
            }
        }

        let k = c3 + self.major_sq - self.minor_sq;
        let coeffs = [
            k * k - 4.0 * self.major_sq * c2,
            4.0 * c1 * k - 8.0 * self.major_sq * c0,
            2.0 * k + 4.0 * (c1 * c1 - self.major_sq * (1.0 - d.z * d.z)),
            4.0 * c1,
            1.0,
        ];

        let roots = solve_poly(&coeffs, lo, hi);
        if roots.is_empty() {
            return;
        }

        for t in roots.iter() {
            hits.push(*t / scale, false);
        }
        hits.alternate();
    }

    fn normal(&self, p: Vec3, _local: &HitLocal) -> Vec3 {
        let p = p - self.center;
        let a = p.magnitude_squared() + self.major_sq - self.minor_sq;
        let b = a - 2.0 * self.major_sq;

        Vec3::new(p.x * b, p.y * b, p.z * a)
    }

    fn is_inside(&self, p: Vec3) -> bool {
        let p = p - self.center;
        let ring = p.magnitude_squared() + self.major_sq - self.minor_sq;

        ring * ring - 4.0 * self.major_sq * (p.x * p.x + p.y * p.y) <= 0.0
    }

    fn uv(&self, p: Vec3, _local: &HitLocal) -> (f64, f64) {
        torus_map((p - self.center) / self.major)
    }

    fn extents(&self) -> (Vec3, Vec3) {
        let w = self.major + self.minor + EPSILON;
        let h = self.minor + EPSILON;
        let half = Vec3::new(w, w, h);

        (self.center - half, self.center + half)
    }

    /// The inner and outer rims, the top and bottom circles, and eight
    /// cross sections of the tube.
    fn draw(&self, sink: &mut dyn LineSink, to_world: &dyn Fn(Vec3) -> Vec3) {
        let (ex, ey, ez) = (Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 1.0));
        let mut stroke = |points: Vec<Vec3>| {
            let points: Vec<Vec3> = points.into_iter().map(|p| to_world(p)).collect();
            polyline(&mut *sink, &points, true);
        };

        let (big, small) = (self.major, self.minor);
        stroke(ring(self.center, ex, ey, big - small, 16));
        stroke(ring(self.center, ex, ey, big + small, 16));
        stroke(ring(self.center + ez * small, ex, ey, big, 16));
        stroke(ring(self.center - ez * small, ex, ey, big, 16));

        for i in 0..8 {
            let angle = i as f64 * PI / 4.0;
            let out = Vec3::new(angle.cos(), angle.sin(), 0.0);
            stroke(ring(self.center + out * big, out, ez, small, 8));
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
fn close(got: &[(f64, bool)], want: &[(f64, bool)]) -> bool {
    got.len() == want.len()
        && got.iter().zip(want.iter()).all(|(a, b)| (a.0 - b.0).abs() < 1e-6 && a.1 == b.1)
}

#[test]
fn ray_through_both_sides_of_the_tube() {
    let t = make_torus(Vec3::zero(), 2.0, 0.5);
    let r = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));

    assert!(close(&hits_of(&t, &r), &[(2.5, true), (3.5, false), (6.5, true), (7.5, false)]));
}

#[test]
fn unnormalized_direction_keeps_t() {
    let t = make_torus(Vec3::zero(), 2.0, 0.5);
    let r = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0));

    assert!(close(&hits_of(&t, &r), &[(1.25, true), (1.75, false), (3.25, true), (3.75, false)]));
}

#[test]
fn ray_down_the_hole_misses() {
    let t = make_torus(Vec3::zero(), 2.0, 0.5);
    let r = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));

    assert!(hits_of(&t, &r).is_empty());
}

#[test]
fn ray_down_through_the_tube() {
    let t = make_torus(Vec3::new(0.0, 0.0, 1.0), 2.0, 0.5);
    let r = Ray::new(Vec3::new(2.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));

    assert!(close(&hits_of(&t, &r), &[(5.5, true), (6.5, false)]));
}

#[test]
fn ray_starting_in_the_tube() {
    let t = make_torus(Vec3::zero(), 2.0, 0.5);
    let r = Ray::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0));

    assert!(close(&hits_of(&t, &r), &[(0.5, false)]));
}

#[test]
fn torus_normal_and_inside() {
    let t = Torus::new(Vec3::zero(), 2.0, 0.5);

    let n = t.normal(Vec3::new(2.5, 0.0, 0.0), &HitLocal::None).normalize();
    assert_eq!(n, Vec3::new(1.0, 0.0, 0.0));
    let n = t.normal(Vec3::new(0.0, 2.0, 0.5), &HitLocal::None).normalize();
    assert_eq!(n, Vec3::new(0.0, 0.0, 1.0));

    assert!(t.is_inside(Vec3::new(2.0, 0.0, 0.0)));
    assert!(!t.is_inside(Vec3::zero()));
    assert!(!t.is_inside(Vec3::new(0.0, 3.0, 0.0)));
}

#[test]
fn torus_extents() {
    let t = Torus::new(Vec3::new(1.0, 0.0, 0.0), 2.0, 0.5);
    let (bmin, bmax) = t.extents();

    assert_eq!(bmin, Vec3::new(-1.5, -2.5, -0.5));
    assert_eq!(bmax, Vec3::new(3.5, 2.5, 0.5));
}
