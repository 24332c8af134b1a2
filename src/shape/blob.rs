use std::cell::RefCell;
use std::mem::size_of;
use std::rc::Rc;

use crate::consts::{ EPSILON, HUGE };
use crate::error::{ RayError, Result };
use crate::intersect::{ HitLocal, HitSink, Scan };
use crate::ray::Ray;
use crate::shape::{ pad, Object, ObjectKind, Primitive };
use crate::solve::solve_poly;
use crate::vector::Vec3;

/// Intervals of influence shorter than this are ignored.
const MIN_INTERVAL: f64 = 0.001;

#[derive(Copy, Clone, Debug, PartialEq)]
enum Shape {
    Sphere,

    /// Half a sphere, on the side away from `dir`.
    Hemisphere { dir: Vec3 },

    /// The body of a cylinder element. `axis` runs from `loc` to the far end.
    Cylinder { axis: Vec3, dir: Vec3, len: f64, end: Vec3 },

    /// Influence below `rad` along `dir`.
    Plane { dir: Vec3 },
}

/// One field element.
///
/// The field falls off from `field` at the element to zero at `rad` as
/// `r4·s² + r2·s + field`, where `s` is the squared distance (the plain
/// distance for planes).
#[derive(Copy, Clone, Debug, PartialEq)]
struct Element {
    loc: Vec3,
    rad: f64,
    rsq: f64,
    field: f64,
    r2: f64,
    r4: f64,
    shape: Shape,
}

impl Element {
    fn new(loc: Vec3, rad: f64, field: f64, shape: Shape) -> Element {
        let rsq = rad * rad;
        Element {
            loc,
            rad,
            rsq,
            field,
            r2: -2.0 * field / rsq,
            r4: field / (rsq * rsq),
            shape,
        }
    }

    /// The stretch of a unit direction ray inside the element's influence,
    /// clipped to `[lo, hi]`.
    fn interval(&self, o: Vec3, d: Vec3, lo: f64, hi: f64) -> Option<(f64, f64)> {
        let rel = o - self.loc;

        let (mut t1, mut t2) = match self.shape {
            Shape::Sphere | Shape::Hemisphere { .. } => {
                let a = -rel.dot(&d);
                let disc = self.rsq - (rel.magnitude_squared() - a * a);
                if disc < 0.0 {
                    return None;
                }
                let disc = disc.sqrt();
                (a - disc, a + disc)
            },
            Shape::Cylinder { axis, .. } => {
                let lsq = axis.magnitude_squared();
                let k = rel - axis * (rel.dot(&axis) / lsq);
                let kd = d - axis * (d.dot(&axis) / lsq);

                let a = kd.magnitude_squared();
                let b = 2.0 * kd.dot(&k);
                let c = k.magnitude_squared() - self.rsq;

                if a < EPSILON {
                    // Along the axis: inside the radius everywhere or nowhere
                    if c > 0.0 {
                        return None;
                    }
                    (lo, hi)
                } else {
                    let disc = b * b - 4.0 * a * c;
                    if disc < 0.0 {
                        return None;
                    }
                    let disc = disc.sqrt();
                    let (r1, r2) = ((-b - disc) / (2.0 * a), (-b + disc) / (2.0 * a));
                    (r1.min(r2), r1.max(r2))
                }
            },
            Shape::Plane { dir } => {
                let den = dir.dot(&d);
                let num = dir.dot(&rel) - self.rad;

                if den.abs() > EPSILON {
                    let t = -num / den;
                    if num > 0.0 {
                        if t < lo {
                            return None;
                        }
                        (t, hi)
                    } else if t < lo {
                        (lo, hi)
                    } else {
                        (lo, t)
                    }
                } else {
                    if num > 0.0 {
                        return None;
                    }
                    (lo, hi)
                }
            },
        };

        if t2 < lo {
            return None;
        }
        t1 = t1.max(lo);

        match self.shape {
            Shape::Hemisphere { dir } => {
                // Keep the side where rel·dir <= 0
                let (t1c, t2c) = clip_half(dir.dot(&rel), dir.dot(&d), t1, t2, lo)?;
                t1 = t1c;
                t2 = t2c;
            },
            Shape::Cylinder { dir, end, .. } => {
                let den = dir.dot(&d);
                let base = dir.dot(&rel);
                let top = dir.dot(&(o - end));

                if den.abs() > EPSILON {
                    // Above the base plane, then below the end plane
                    let (a, b) = clip_half(-base, -den, t1, t2, lo)?;
                    let (a, b) = clip_half(top, den, a, b, lo)?;
                    t1 = a;
                    t2 = b;
                } else if base < 0.0 || top > 0.0 {
                    return None;
                }
            },
            _ => (),
        }

        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        if t1 > hi || t2 <= lo || (t2 - t1).abs() < MIN_INTERVAL {
            return None;
        }

        Some((t1.max(lo), t2.min(hi)))
    }

    /// Density along the ray as a quartic in `t`, lowest power first.
    fn coefficients(&self, o: Vec3, d: Vec3) -> [f64; 5] {
        let rel = o - self.loc;
        let (r2, r4) = (self.r2, self.r4);

        match self.shape {
            Shape::Plane { dir } => {
                let p1 = dir.dot(&d);
                let p0 = dir.dot(&rel);
                [
                    r4 * p0 * p0 + r2 * p0 + self.field,
                    2.0 * r4 * p0 * p1 + r2 * p1,
                    r4 * p1 * p1,
                    0.0,
                    0.0,
                ]
            },
            Shape::Cylinder { axis, .. } => {
                let lsq = axis.magnitude_squared();
                let k = rel - axis * (rel.dot(&axis) / lsq);
                let kd = d - axis * (d.dot(&axis) / lsq);

                let a = kd.magnitude_squared();
                let b = k.dot(&kd);
                let c = k.magnitude_squared();
                let e = 4.0 * r4 * b;
                [
                    c * (r4 * c + r2) + self.field,
                    c * e + 2.0 * r2 * b,
                    e * b + a * (2.0 * r4 * c + r2),
                    a * e,
                    r4 * a * a,
                ]
            },
            _ => {
                let b = rel.dot(&d);
                let c = rel.magnitude_squared();
                let e = 4.0 * r4 * b;
                [
                    c * (r4 * c + r2) + self.field,
                    c * e + 2.0 * r2 * b,
                    e * b + 2.0 * r4 * c + r2,
                    e,
                    r4,
                ]
            },
        }
    }

    /// The offset that the field is measured along and the field's argument,
    /// or `None` outside the element's influence.
    fn reach(&self, p: Vec3) -> Option<(Vec3, f64)> {
        let rel = p - self.loc;

        match self.shape {
            Shape::Cylinder { dir, len, .. } => {
                let t = rel.dot(&dir);
                if t < 0.0 || t >= len {
                    return None;
                }
                let radial = rel - dir * t;
                let s = radial.magnitude_squared();
                if s >= self.rsq { None } else { Some((radial, s)) }
            },
            Shape::Plane { dir } => {
                let s = rel.dot(&dir);
                if s >= self.rad { None } else { Some((dir, s)) }
            },
            Shape::Sphere | Shape::Hemisphere { .. } => {
                let s = rel.magnitude_squared();
                if s >= self.rsq {
                    return None;
                }
                if let Shape::Hemisphere { dir } = self.shape {
                    if rel.dot(&dir) > 0.0 {
                        return None;
                    }
                }
                Some((rel, s))
            },
        }
    }

    fn density(&self, p: Vec3) -> f64 {
        match self.reach(p) {
            Some((_, s)) => s * (s * self.r4 + self.r2) + self.field,
            None => 0.0,
        }
    }

    /// Outward facing gradient contribution.
    fn gradient(&self, p: Vec3) -> Vec3 {
        match self.reach(p) {
            Some((dir, s)) if matches!(self.shape, Shape::Plane { .. }) => {
                dir * -(2.0 * self.r4 * s + self.r2)
            },
            Some((rel, s)) => rel * -(4.0 * self.r4 * s + 2.0 * self.r2),
            None => Vec3::zero(),
        }
    }
}

/// Clips `[t1, t2]` to where `num + den·t <= 0`. `None` when nothing is
/// left.
fn clip_half(num: f64, den: f64, t1: f64, t2: f64, lo: f64) -> Option<(f64, f64)> {
    if den.abs() <= EPSILON {
        return if num > 0.0 { None } else { Some((t1, t2)) };
    }

    if num.abs() < EPSILON {
        if den > 0.0 || t2 < lo {
            return None;
        }
        return Some((t1.max(lo), t2));
    }

    let t3 = -num / den;
    if num > 0.0 {
        if t2 < t3 || t3 < 0.0 {
            return None;
        }
        Some((t1.max(t3), t2))
    } else if t3 >= 0.0 {
        if t1 > t3 {
            return None;
        }
        Some((t1, t2.min(t3)))
    } else {
        Some((t1, t2))
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct Event {
    t: f64,
    entering: bool,
    elem: usize,
}

/// A blobby surface: the level set where the summed field of its elements
/// reaches `threshold`.
#[derive(Debug)]
pub struct Blob {
    threshold: f64,
    elements: Vec<Element>,

    /// Optional bounding objects in the blob's space. A ray missing all of
    /// them misses the blob.
    bounds: Vec<Object>,

    events: RefCell<Vec<Event>>,
}

/// Collects blob elements. Cylinders add three elements each.
#[derive(Debug)]
pub struct BlobBuilder {
    threshold: f64,
    elements: Vec<Element>,
    bounds: Vec<Object>,
}

impl BlobBuilder {
    pub fn new(threshold: f64) -> BlobBuilder {
        BlobBuilder { threshold, elements: Vec::new(), bounds: Vec::new() }
    }

    pub fn add_sphere(&mut self, center: Vec3, radius: f64, field: f64) -> &mut BlobBuilder {
        self.elements.push(Element::new(center, radius, field, Shape::Sphere));
        self
    }

    /// A cylinder between two points with rounded ends.
    pub fn add_cylinder(&mut self, p1: Vec3, p2: Vec3, radius: f64, field: f64) -> &mut BlobBuilder {
        let axis = p2 - p1;
        let dir = axis.normalize();

        let body = Shape::Cylinder { axis, dir, len: axis.magnitude(), end: p2 };
        self.elements.push(Element::new(p1, radius, field, body));
        self.elements.push(Element::new(p1, radius, field, Shape::Hemisphere { dir }));
        self.elements.push(Element::new(p2, radius, field, Shape::Hemisphere { dir: -dir }));
        self
    }

    /// A field that is strongest at `point` and reaches `dist` along `dir`.
    pub fn add_plane(&mut self, point: Vec3, dir: Vec3, dist: f64, field: f64) -> &mut BlobBuilder {
        let shape = Shape::Plane { dir: dir.normalize() };
        self.elements.push(Element::new(point, dist, field, shape));
        self
    }

    pub fn add_bound(&mut self, bound: Object) -> &mut BlobBuilder {
        self.bounds.push(bound);
        self
    }

    pub fn finish(self) -> Result<Object> {
        if self.elements.is_empty() {
            return Err(RayError::EmptyBlob);
        }

        let blob = Blob {
            threshold: self.threshold,
            events: RefCell::new(Vec::with_capacity(self.elements.len() * 2)),
            elements: self.elements,
            bounds: self.bounds,
        };

        Ok(Object::new(ObjectKind::Blob(Rc::new(blob))))
    }
}

impl Blob {
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn mem_size(&self) -> usize {
        self.elements.len() * (size_of::<Element>() + 2 * size_of::<Event>())
            + self.bounds.iter().map(Object::mem_size).sum::<usize>()
    }

    /// Summed field strength at `p`.
    pub fn density(&self, p: Vec3) -> f64 {
        self.elements.iter().map(|e| e.density(p)).sum()
    }
}

/// Derivative of a quartic given lowest power first.
fn slope(c: &[f64; 5], t: f64) -> f64 {
    c[1] + t * (2.0 * c[2] + t * (3.0 * c[3] + t * 4.0 * c[4]))
}

impl Primitive for Blob {
    fn intersect<'a>(&'a self, ray: &Ray, hits: &mut HitSink<'_, 'a>, scan: &Scan<'_, 'a>) {
        if !self.bounds.is_empty() && !hits.probe(&self.bounds, ray, scan) {
            return;
        }

        let (d, scale) = ray.unit_dir();
        if scale < EPSILON {
            return;
        }
        let (lo, hi) = (ray.tmin * scale, ray.tmax * scale);
        let o = ray.origin;

        let mut events = self.events.borrow_mut();
        events.clear();
        for (i, e) in self.elements.iter().enumerate() {
            if let Some((t1, t2)) = e.interval(o, d, lo, hi) {
                events.push(Event { t: t1, entering: true, elem: i });
                events.push(Event { t: t2, entering: false, elem: i });
            }
        }
        if events.is_empty() {
            return;
        }
        events.sort_by(|a, b| a.t.partial_cmp(&b.t).unwrap_or(std::cmp::Ordering::Equal));

        let reset = [-self.threshold, 0.0, 0.0, 0.0, 0.0];
        let mut sum = reset;
        let mut inside = 0;
        let mut found = false;

        for (i, ev) in events.iter().enumerate() {
            let c = self.elements[ev.elem].coefficients(o, d);
            if ev.entering {
                inside += 1;
                for k in 0..5 {
                    sum[k] += c[k];
                }
            } else {
                inside -= 1;
                if inside > 0 {
                    for k in 0..5 {
                        sum[k] -= c[k];
                    }
                } else {
                    sum = reset;
                }
            }

            let next = match events.get(i + 1) {
                Some(next) => next.t,
                None => break,
            };
            if inside == 0 || ev.t >= next {
                continue;
            }

            let roots = solve_poly(&sum, ev.t, next);
            for t in roots.iter() {
                // Rising through the threshold means going inside
                hits.push(*t / scale, slope(&sum, *t) > 0.0);
                found = true;
            }
            if found && !hits.all {
                break;
            }
        }
    }

    /// Negative gradient of the summed field.
    fn normal(&self, p: Vec3, _local: &HitLocal) -> Vec3 {
        self.elements.iter().fold(Vec3::zero(), |n, e| n + e.gradient(p))
    }

    fn is_inside(&self, p: Vec3) -> bool {
        self.density(p) > self.threshold
    }

    fn uv(&self, _p: Vec3, _local: &HitLocal) -> (f64, f64) {
        (0.0, 0.0)
    }

    /// The union of the bound objects if any, else of the elements. A plane
    /// element makes the blob unbounded.
    fn extents(&self) -> (Vec3, Vec3) {
        if !self.bounds.is_empty() {
            return self.bounds.iter().skip(1).fold(self.bounds[0].extents(), |(lo, hi), b| {
                let (bmin, bmax) = b.extents();
                (lo.min(&bmin), hi.max(&bmax))
            });
        }

        let mut bmin = Vec3::splat(HUGE);
        let mut bmax = Vec3::splat(-HUGE);
        for e in self.elements.iter() {
            match e.shape {
                // Covered by its end caps
                Shape::Cylinder { .. } => continue,
                Shape::Plane { .. } => return (Vec3::splat(-HUGE), Vec3::splat(HUGE)),
                _ => {
                    bmin = bmin.min(&(e.loc - Vec3::splat(e.rad)));
                    bmax = bmax.max(&(e.loc + Vec3::splat(e.rad)));
                },
            }
        }

        pad(bmin, bmax)
    }
}

/* Tests */

#[cfg(test)]
use crate::shape::make_sphere;
#[cfg(test)]
use crate::stats::Stats;

#[cfg(test)]
fn hits_of(obj: &Object, ray: &Ray) -> Vec<(f64, bool)> {
    hits_with(obj, ray, true)
}

#[cfg(test)]
fn hits_with(obj: &Object, ray: &Ray, all: bool) -> Vec<(f64, bool)> {
    let stats = Stats::new();
    let scan = Scan::new(&stats).with_all(all);
    let mut pool = Vec::new();
    obj.intersect(ray, &scan, &mut pool);
    pool.iter().map(|h| (h.t, h.entering)).collect()
}

#[cfg(test)]
fn close(got: &[(f64, bool)], want: &[(f64, bool)]) -> bool {
    got.len() == want.len()
        && got.iter().zip(want.iter()).all(|(a, b)| (a.0 - b.0).abs() < 1e-5 && a.1 == b.1)
}

// Where a unit field of radius 1 falls to 0.5
#[cfg(test)]
const HALF: f64 = 0.541196;

#[test]
fn empty_blob_is_an_error() {
    assert!(matches!(BlobBuilder::new(0.5).finish(), Err(RayError::EmptyBlob)));
}

#[test]
fn single_sphere_element() {
    let mut b = BlobBuilder::new(0.5);
    b.add_sphere(Vec3::zero(), 1.0, 1.0);
    let blob = b.finish().unwrap();

    let r = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
    assert!(close(&hits_of(&blob, &r), &[(5.0 - HALF, true), (5.0 + HALF, false)]));

    let r = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0));
    assert!(close(&hits_of(&blob, &r), &[((5.0 - HALF) / 2.0, true), ((5.0 + HALF) / 2.0, false)]));
}

#[test]
fn first_hit_knows_it_enters() {
    let mut b = BlobBuilder::new(0.5);
    b.add_cylinder(Vec3::new(0.0, 0.0, -1.0), Vec3::new(0.0, 0.0, 1.0), 1.0, 1.0);
    let blob = b.finish().unwrap();

    let r = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
    assert!(close(&hits_with(&blob, &r, false), &[(4.0 - HALF, true)]));

    let r = Ray::new(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0));
    assert!(close(&hits_with(&blob, &r, false), &[(1.0 + HALF, false)]));
}

#[test]
fn two_spheres_merge() {
    let mut b = BlobBuilder::new(0.5);
    b.add_sphere(Vec3::new(-0.5, 0.0, 0.0), 1.0, 1.0)
        .add_sphere(Vec3::new(0.5, 0.0, 0.0), 1.0, 1.0);
    let blob = b.finish().unwrap();

    let r = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
    assert!(close(&hits_of(&blob, &r), &[(4.5 - HALF, true), (5.5 + HALF, false)]));
    assert!(blob.is_inside(Vec3::zero()));
    assert!(!blob.is_inside(Vec3::new(0.0, 0.9, 0.0)));
}

#[test]
fn cylinder_capped_by_hemispheres() {
    let mut b = BlobBuilder::new(0.5);
    b.add_cylinder(Vec3::new(0.0, 0.0, -1.0), Vec3::new(0.0, 0.0, 1.0), 1.0, 1.0);
    let blob = b.finish().unwrap();

    let across = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
    assert!(close(&hits_of(&blob, &across), &[(5.0 - HALF, true), (5.0 + HALF, false)]));

    let along = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
    assert!(close(&hits_of(&blob, &along), &[(4.0 - HALF, true), (6.0 + HALF, false)]));
}

#[test]
fn blob_normal_points_out() {
    let mut b = BlobBuilder::new(0.5);
    b.add_sphere(Vec3::zero(), 1.0, 1.0);
    let blob = b.finish().unwrap();

    let n = blob.normal(Vec3::new(HALF, 0.0, 0.0), &HitLocal::None);
    assert_eq!(n, Vec3::new(1.0, 0.0, 0.0));
}

#[test]
fn bound_objects_gate_the_blob() {
    let mut b = BlobBuilder::new(0.5);
    b.add_sphere(Vec3::zero(), 1.0, 1.0)
        .add_bound(make_sphere(Vec3::zero(), 1.0));
    let blob = b.finish().unwrap();

    let r = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
    assert_eq!(hits_of(&blob, &r).len(), 2);

    let (bmin, bmax) = blob.extents();
    assert_eq!(bmin, Vec3::splat(-1.0));
    assert_eq!(bmax, Vec3::splat(1.0));
}

#[test]
fn plane_element_is_unbounded() {
    let mut b = BlobBuilder::new(0.5);
    b.add_plane(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0), 1.0, 1.0);
    let blob = b.finish().unwrap();

    let (bmin, bmax) = blob.extents();
    assert_eq!(bmin, Vec3::splat(-HUGE));
    assert_eq!(bmax, Vec3::splat(HUGE));
    assert!(blob.is_inside(Vec3::new(5.0, 5.0, -3.0)));
}
