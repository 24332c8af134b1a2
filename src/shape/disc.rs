use crate::consts::EPSILON;
use crate::draw::{ perpendicular, polyline, ring, LineSink };
use crate::intersect::{ HitLocal, HitSink, Scan };
use crate::ray::Ray;
use crate::shape::{ Object, ObjectFlags, ObjectKind, Primitive };
use crate::uvmap::disc_map;
use crate::vector::Vec3;

/// A flat disc, or an annulus when the inner radius is non-zero.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Disc {
    pub center: Vec3,
    pub normal: Vec3,
    pub inner_radius: f64,
    pub outer_radius: f64,

    // Plane offset, n·p + d = 0 on the disc
    d: f64,

    // Squared radii
    in_sq: f64,
    out_sq: f64,
}

impl Disc {
    /// The radii may be given in either order.
    pub fn new(center: Vec3, normal: Vec3, r1: f64, r2: f64) -> Disc {
        let normal = normal.normalize();
        let (inner, outer) = (r1.abs().min(r2.abs()), r1.abs().max(r2.abs()));

        Disc {
            center,
            normal,
            inner_radius: inner,
            outer_radius: outer,
            d: -normal.dot(&center),
            in_sq: inner * inner,
            out_sq: outer * outer,
        }
    }

    /// In-plane axes used for texture coordinates and drawing.
    fn axes(&self) -> (Vec3, Vec3) {
        let a = perpendicular(self.normal);
        (a, self.normal.cross(&a))
    }
}

/// Creates a disc object. Shadow rays never test a disc against itself.
pub fn make_disc(center: Vec3, normal: Vec3, inner_radius: f64, outer_radius: f64) -> Object {
    Object::new(ObjectKind::Disc(Disc::new(center, normal, inner_radius, outer_radius)))
        .with_flags(ObjectFlags::NO_SELF_INTERSECT)
}

impl Primitive for Disc {
    fn intersect<'a>(&'a self, ray: &Ray, hits: &mut HitSink<'_, 'a>, _scan: &Scan<'_, 'a>) {
        let denom = self.normal.dot(&ray.dir);
        if denom.abs() < EPSILON {
            return;
        }

        let t = -(self.normal.dot(&ray.origin) + self.d) / denom;
        if t < ray.tmin || t > ray.tmax {
            return;
        }

        let dsq = (ray.position(t) - self.center).magnitude_squared();
        if dsq < self.in_sq || dsq > self.out_sq {
            return;
        }

        hits.push(t, denom < 0.0);
    }

    fn normal(&self, _p: Vec3, _local: &HitLocal) -> Vec3 {
        self.normal
    }

    /// The half space behind the disc's plane.
    fn is_inside(&self, p: Vec3) -> bool {
        self.normal.dot(&p) + self.d <= 0.0
    }

    fn uv(&self, p: Vec3, _local: &HitLocal) -> (f64, f64) {
        if self.outer_radius < EPSILON {
            return (0.5, 0.5);
        }

        let (a, b) = self.axes();
        let q = p - self.center;
        disc_map(Vec3::new(q.dot(&a), q.dot(&b), 0.0) / self.outer_radius)
    }

    fn extents(&self) -> (Vec3, Vec3) {
        let mut bmin = self.center;
        let mut bmax = self.center;

        for i in 0..3 {
            let w = (1.0 - self.normal[i] * self.normal[i]).max(0.0).sqrt();
            let r = w * self.outer_radius + EPSILON;
            bmin[i] -= r;
            bmax[i] += r;
        }

        (bmin, bmax)
    }

    fn draw(&self, sink: &mut dyn LineSink, to_world: &dyn Fn(Vec3) -> Vec3) {
        let (a, b) = self.axes();

        for r in [self.inner_radius, self.outer_radius].iter() {
            if *r > EPSILON {
                let points: Vec<Vec3> = ring(self.center, a, b, *r, 12)
                    .into_iter().map(|p| to_world(p)).collect();
                polyline(sink, &points, true);
            }
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
fn disc_front_and_back() {
    let d = make_disc(Vec3::zero(), Vec3::new(0.0, 0.0, 2.0), 0.0, 1.0);

    let down = Ray::new(Vec3::new(0.5, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
    assert_eq!(hits_of(&d, &down), vec![(5.0, true)]);

    let up = Ray::new(Vec3::new(0.5, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
    assert_eq!(hits_of(&d, &up), vec![(5.0, false)]);
}

#[test]
fn annulus_has_a_hole() {
    let d = make_disc(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0), 2.0, 1.0);

    let center = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
    assert!(hits_of(&d, &center).is_empty());

    let ring = Ray::new(Vec3::new(1.5, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
    assert_eq!(hits_of(&d, &ring).len(), 1);

    let outside = Ray::new(Vec3::new(2.5, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
    assert!(hits_of(&d, &outside).is_empty());
}

#[test]
fn parallel_ray_misses() {
    let d = make_disc(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0), 0.0, 1.0);
    let r = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
    assert!(hits_of(&d, &r).is_empty());
}

#[test]
fn disc_inside_is_below_plane() {
    let d = Disc::new(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, 1.0), 0.0, 1.0);
    assert!(d.is_inside(Vec3::new(10.0, 0.0, 0.0)));
    assert!(!d.is_inside(Vec3::new(0.0, 0.0, 2.0)));
}

#[test]
fn tilted_disc_extents() {
    let d = Disc::new(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0), 0.0, 2.0);
    let (bmin, bmax) = d.extents();
    assert_eq!(bmin, Vec3::new(-2.0, -2.0, 0.0));
    assert_eq!(bmax, Vec3::new(2.0, 2.0, 0.0));
}

#[test]
fn disc_self_shadow_flag() {
    let d = make_disc(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0), 0.0, 1.0);
    assert!(d.flags.contains(ObjectFlags::NO_SELF_INTERSECT));
}
