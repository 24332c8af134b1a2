use crate::consts::EPSILON;
use crate::draw::{ box_edges, LineSink };
use crate::intersect::{ intersect_box, HitLocal, HitSink, Scan };
use crate::ray::Ray;
use crate::shape::{ Object, ObjectKind, Primitive };
use crate::vector::Vec3;

// Face matching tolerance for normals
const FACE_EPSILON: f64 = 1.0e-4;

/// An axis aligned box. Corners are ordered on construction.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Cube {
    pub bmin: Vec3,
    pub bmax: Vec3,
}

impl Cube {
    pub fn new(a: Vec3, b: Vec3) -> Cube {
        Cube { bmin: a.min(&b), bmax: a.max(&b) }
    }

    /// Containment in the box grown by `pad` on every side.
    pub fn contains(&self, p: Vec3, pad: f64) -> bool {
        (0..3).all(|i| p[i] >= self.bmin[i] - pad && p[i] <= self.bmax[i] + pad)
    }
}

/// Creates a box object spanning two opposite corners.
pub fn make_box(a: Vec3, b: Vec3) -> Object {
    Object::new(ObjectKind::Cube(Cube::new(a, b)))
}

impl Primitive for Cube {
    fn intersect<'a>(&'a self, ray: &Ray, hits: &mut HitSink<'_, 'a>, _scan: &Scan<'_, 'a>) {
        let (t1, t2) = match intersect_box(ray.origin, ray.dir, self.bmin, self.bmax) {
            Some(span) => span,
            None => return,
        };

        if t2 <= ray.tmin || t1 >= ray.tmax {
            return;
        }

        if t1 > ray.tmin {
            hits.push(t1, true);
            if t2 < ray.tmax {
                hits.push(t2, false);
            }
        } else if t2 < ray.tmax {
            hits.push(t2, false);
        }
    }

    fn normal(&self, p: Vec3, _local: &HitLocal) -> Vec3 {
        let near = |a: f64, b: f64| (a - b).abs() < FACE_EPSILON;

        if near(p.x, self.bmax.x) {
            Vec3::new(1.0, 0.0, 0.0)
        } else if near(p.x, self.bmin.x) {
            Vec3::new(-1.0, 0.0, 0.0)
        } else if near(p.y, self.bmax.y) {
            Vec3::new(0.0, 1.0, 0.0)
        } else if near(p.y, self.bmin.y) {
            Vec3::new(0.0, -1.0, 0.0)
        } else if near(p.z, self.bmax.z) {
            Vec3::new(0.0, 0.0, 1.0)
        } else {
            Vec3::new(0.0, 0.0, -1.0)
        }
    }

    /// Points on the faces count as outside. `Object` tests inverted boxes
    /// against a grown box so the faces stay outside for them too.
    fn is_inside(&self, p: Vec3) -> bool {
        self.contains(p, -EPSILON)
    }

    fn uv(&self, _p: Vec3, _local: &HitLocal) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn extents(&self) -> (Vec3, Vec3) {
        (self.bmin, self.bmax)
    }

    fn draw(&self, sink: &mut dyn LineSink, to_world: &dyn Fn(Vec3) -> Vec3) {
        box_edges(sink, self.bmin, self.bmax, to_world);
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
fn corners_are_ordered() {
    let c = Cube::new(Vec3::new(1.0, -1.0, 2.0), Vec3::new(-1.0, 1.0, -2.0));
    assert_eq!(c.bmin, Vec3::new(-1.0, -1.0, -2.0));
    assert_eq!(c.bmax, Vec3::new(1.0, 1.0, 2.0));
}

#[test]
fn ray_hits_each_face() {
    let b = make_box(Vec3::splat(-1.0), Vec3::splat(1.0));
    let cases = [
        (Vec3::new(5.0, 0.5, 0.0), Vec3::new(-1.0, 0.0, 0.0), 4.0, 6.0),
        (Vec3::new(-5.0, 0.5, 0.0), Vec3::new(1.0, 0.0, 0.0), 4.0, 6.0),
        (Vec3::new(0.5, 5.0, 0.0), Vec3::new(0.0, -1.0, 0.0), 4.0, 6.0),
        (Vec3::new(0.5, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0), 4.0, 6.0),
        (Vec3::new(0.0, 0.5, 0.0), Vec3::new(0.0, 0.0, 1.0), 1.0, 1.0),
    ];

    for (origin, dir, t1, t2) in cases.iter() {
        let hits = hits_of(&b, &Ray::new(*origin, *dir));
        if t1 == t2 {
            assert_eq!(hits, vec![(*t1, false)]);
        } else {
            assert_eq!(hits, vec![(*t1, true), (*t2, false)]);
        }
    }
}

#[test]
fn ray_misses_box() {
    let b = make_box(Vec3::splat(-1.0), Vec3::splat(1.0));
    let r = Ray::new(Vec3::new(-2.0, 0.0, 0.0), Vec3::new(0.2673, 0.5345, 0.8018));
    assert!(hits_of(&b, &r).is_empty());

    let r = Ray::new(Vec3::new(2.0, 2.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
    assert!(hits_of(&b, &r).is_empty());
}

#[test]
fn face_normals() {
    let c = Cube::new(Vec3::splat(-1.0), Vec3::splat(1.0));
    let none = HitLocal::None;

    assert_eq!(c.normal(Vec3::new(1.0, 0.5, -0.8), &none), Vec3::new(1.0, 0.0, 0.0));
    assert_eq!(c.normal(Vec3::new(-1.0, -0.2, 0.9), &none), Vec3::new(-1.0, 0.0, 0.0));
    assert_eq!(c.normal(Vec3::new(-0.4, 1.0, -0.1), &none), Vec3::new(0.0, 1.0, 0.0));
    assert_eq!(c.normal(Vec3::new(0.3, -1.0, -0.7), &none), Vec3::new(0.0, -1.0, 0.0));
    assert_eq!(c.normal(Vec3::new(-0.6, 0.3, 1.0), &none), Vec3::new(0.0, 0.0, 1.0));
    assert_eq!(c.normal(Vec3::new(0.4, 0.4, -1.0), &none), Vec3::new(0.0, 0.0, -1.0));
}

#[test]
fn inside_excludes_faces() {
    let c = Cube::new(Vec3::splat(-1.0), Vec3::splat(1.0));
    assert!(c.is_inside(Vec3::zero()));
    assert!(!c.is_inside(Vec3::new(1.0, 0.0, 0.0)));
    assert!(!c.is_inside(Vec3::new(1.5, 0.0, 0.0)));
}

#[test]
fn inverted_box_faces_stay_outside() {
    use crate::shape::ObjectFlags;

    let b = make_box(Vec3::splat(-1.0), Vec3::splat(1.0)).with_flags(ObjectFlags::INVERSE);
    assert!(!b.is_inside(Vec3::zero()));
    assert!(!b.is_inside(Vec3::new(1.0, 0.0, 0.0)));
    assert!(b.is_inside(Vec3::new(1.5, 0.0, 0.0)));
}
