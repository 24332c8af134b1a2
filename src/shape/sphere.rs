use crate::consts::EPSILON;
use crate::draw::{ polyline, LineSink };
use crate::intersect::{ HitLocal, HitSink, Scan };
use crate::ray::Ray;
use crate::shape::{ Object, ObjectKind, Primitive };
use crate::uvmap::sphere_map;
use crate::vector::Vec3;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f64,

    /// Squared radius.
    rsq: f64,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f64) -> Sphere {
        Sphere { center, radius, rsq: radius * radius }
    }
}

/// Creates a sphere object.
pub fn make_sphere(center: Vec3, radius: f64) -> Object {
    Object::new(ObjectKind::Sphere(Sphere::new(center, radius)))
}

impl Primitive for Sphere {
    fn intersect<'a>(&'a self, ray: &Ray, hits: &mut HitSink<'_, 'a>, _scan: &Scan<'_, 'a>) {
        let b = ray.origin - self.center;
        let d = ray.dir;

        let qa = d.dot(&d);
        let qb = d.dot(&b) * 2.0;
        let qc = b.dot(&b) - self.rsq;

        let disc = qb * qb - 4.0 * qa * qc;
        if disc < 0.0 {
            return;
        }

        let disc = disc.sqrt();
        let mut t1 = (-qb - disc) / (2.0 * qa);
        let mut t2 = (-qb + disc) / (2.0 * qa);
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }

        if t2 <= ray.tmin || t1 >= ray.tmax {
            return;
        }

        if t1 > ray.tmin {
            hits.push(t1, true);
            if t2 < ray.tmax {
                hits.push(t2, false);
            }
        } else if t2 < ray.tmax {
            // Starting inside
            hits.push(t2, false);
        }
    }

    fn normal(&self, p: Vec3, _local: &HitLocal) -> Vec3 {
        p - self.center
    }

    fn is_inside(&self, p: Vec3) -> bool {
        (p - self.center).magnitude_squared() <= self.rsq
    }

    fn uv(&self, p: Vec3, _local: &HitLocal) -> (f64, f64) {
        sphere_map(p - self.center)
    }

    fn extents(&self) -> (Vec3, Vec3) {
        let r = Vec3::splat(self.radius.abs() + EPSILON);
        (self.center - r, self.center + r)
    }

    /// Twelve meridians from pole to pole.
    fn draw(&self, sink: &mut dyn LineSink, to_world: &dyn Fn(Vec3) -> Vec3) {
        let step = std::f64::consts::PI / 6.0;

        for m in 0..12 {
            let lon = m as f64 * step;
            let points: Vec<Vec3> = (1..6)
                .map(|k| {
                    let lat = k as f64 * step;
                    let p = Vec3::new(lat.sin() * lon.cos(), lat.sin() * lon.sin(), lat.cos());
                    to_world(self.center + p * self.radius)
                })
                .collect();
            polyline(sink, &points, false);
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

#[test]
fn ray_through_center() {
    let s = make_sphere(Vec3::zero(), 1.0);
    let r = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));

    assert_eq!(hits_of(&s, &r), vec![(4.0, true), (6.0, false)]);
}

#[test]
fn ray_misses() {
    let s = make_sphere(Vec3::zero(), 1.0);
    let r = Ray::new(Vec3::new(0.0, 2.0, -5.0), Vec3::new(0.0, 0.0, 1.0));

    assert!(hits_of(&s, &r).is_empty());
}

#[test]
fn ray_from_inside() {
    let s = make_sphere(Vec3::zero(), 1.0);
    let r = Ray::new(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0));

    assert_eq!(hits_of(&s, &r), vec![(1.0, false)]);
}

#[test]
fn sphere_behind_ray() {
    let s = make_sphere(Vec3::zero(), 1.0);
    let r = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, 1.0));

    assert!(hits_of(&s, &r).is_empty());
}

#[test]
fn window_clips_far_hit() {
    let s = make_sphere(Vec3::zero(), 1.0);
    let r = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0))
        .with_range(0.001, 5.0);

    assert_eq!(hits_of(&s, &r), vec![(4.0, true)]);
}

#[test]
fn inverse_sphere_swaps_entering() {
    use crate::shape::ObjectFlags;

    let s = make_sphere(Vec3::zero(), 1.0).with_flags(ObjectFlags::INVERSE);
    let r = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));

    assert_eq!(hits_of(&s, &r), vec![(4.0, false), (6.0, true)]);
}

#[test]
fn normal_is_radial() {
    let c = Vec3::new(1.0, -2.0, 3.0);
    let s = make_sphere(c, 2.5);

    for dir in [Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.3, -0.4, 0.5), Vec3::new(-1.0, -1.0, 1.0)].iter() {
        let u = dir.normalize();
        let n = s.normal(c + u * 2.5, &HitLocal::None);
        assert!((n.magnitude() - 1.0).abs() < 1e-6);
        assert!((n - u).magnitude() < 1e-6);
    }
}

#[test]
fn translated_sphere_hits() {
    use crate::xform::Action;

    let mut s = make_sphere(Vec3::zero(), 1.0);
    s.transform(Action::Translate, Vec3::new(5.0, 0.0, 0.0));
    let r = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
    assert!(hits_of(&s, &r).is_empty());

    let mut s = make_sphere(Vec3::zero(), 1.0);
    s.transform(Action::Scale, Vec3::new(2.0, 2.0, 2.0));
    assert_eq!(hits_of(&s, &r), vec![(3.0, true), (7.0, false)]);
}

#[test]
fn stats_count_tests_and_hits() {
    let stats = Stats::new();
    let s = make_sphere(Vec3::zero(), 1.0);
    let mut pool = Vec::new();
    let scan = Scan::new(&stats);

    s.intersect(&Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0)), &scan, &mut pool);
    s.intersect(&Ray::new(Vec3::new(0.0, 5.0, -5.0), Vec3::new(0.0, 0.0, 1.0)), &scan, &mut pool);

    assert_eq!(stats.sphere.tests.get(), 2);
    assert_eq!(stats.sphere.hits.get(), 1);
}
