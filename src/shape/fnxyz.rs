use std::fmt;
use std::rc::Rc;

use serde::{ Deserialize, Serialize };

use crate::consts::{ EPSILON, HUGE };
use crate::intersect::{ intersect_box, HitLocal, HitSink, Scan };
use crate::ray::Ray;
use crate::shape::{ Object, ObjectKind, Primitive };
use crate::vector::Vec3;

/// Relative tolerance on root positions.
const REL_ERROR: f64 = 1e-10;

/// Regula falsi gives up after this many steps.
const MAX_ITER: usize = 800;

/// Half the edge of the cube probed for normals.
const PROBE: f64 = 0.01;

const DEFAULT_STEPS: f64 = 32.0;

/// A scalar field whose zero set is a surface. Negative values are inside.
pub trait FieldFn: fmt::Debug {
    fn eval(&self, p: Vec3) -> f64;
}

/// One `coef·x^i·y^j·z^k` term.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolyTerm {
    pub coef: f64,
    #[serde(default)]
    pub x: u32,
    #[serde(default)]
    pub y: u32,
    #[serde(default)]
    pub z: u32,
}

/// A polynomial in x, y and z.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PolyField {
    pub terms: Vec<PolyTerm>,
}

impl PolyField {
    pub fn new(terms: Vec<PolyTerm>) -> PolyField {
        PolyField { terms }
    }

    /// `x² + y² + z² - r²`
    pub fn sphere(radius: f64) -> PolyField {
        PolyField::new(vec![
            PolyTerm { coef: 1.0, x: 2, y: 0, z: 0 },
            PolyTerm { coef: 1.0, x: 0, y: 2, z: 0 },
            PolyTerm { coef: 1.0, x: 0, y: 0, z: 2 },
            PolyTerm { coef: -radius * radius, x: 0, y: 0, z: 0 },
        ])
    }
}

impl FieldFn for PolyField {
    fn eval(&self, p: Vec3) -> f64 {
        self.terms.iter()
            .map(|t| t.coef * p.x.powi(t.x as i32) * p.y.powi(t.y as i32) * p.z.powi(t.z as i32))
            .sum()
    }
}

/// The zero set of a field, searched for inside a box.
///
/// Rays are cut into steps no longer than one grid cell along any axis, and
/// each step with a sign change is polished to a root.
#[derive(Debug)]
pub struct FnXyz {
    field: Box<dyn FieldFn>,
    bmin: Vec3,
    bmax: Vec3,

    // Grid cell size along each axis
    step: Vec3,
}

/// Creates a function surface.
///
/// `bounds` defaults to the cube `[-1, 1]³` and `steps`, the number of
/// search cells along each axis, to 32.
pub fn make_function(field: Box<dyn FieldFn>, bounds: Option<(Vec3, Vec3)>, steps: Option<Vec3>) -> Object {
    let (a, b) = bounds.unwrap_or((Vec3::splat(-1.0), Vec3::splat(1.0)));
    let (bmin, bmax) = (a.min(&b), a.max(&b));
    let steps = steps.unwrap_or(Vec3::splat(DEFAULT_STEPS));

    let mut step = Vec3::zero();
    for axis in 0..3 {
        step[axis] = (bmax[axis] - bmin[axis]) / steps[axis].max(1.0);
    }

    let f = FnXyz { field, bmin, bmax, step };
    Object::new(ObjectKind::Function(Rc::new(f)))
}

impl FnXyz {
    pub fn eval(&self, p: Vec3) -> f64 {
        self.field.eval(p)
    }

    /// Illinois regula falsi on `[a, b]` along the ray.
    fn find_root(&self, o: Vec3, d: Vec3, mut a: f64, mut b: f64) -> Option<f64> {
        let at = |t: f64| self.field.eval(o + d * t);

        let mut fa = at(a);
        if fa.abs() < REL_ERROR {
            return Some(a);
        }
        let mut fb = at(b);
        if fb.abs() < REL_ERROR {
            return Some(b);
        }
        if fa * fb > 0.0 {
            return None;
        }

        let mut last = fa;
        for _ in 0..MAX_ITER {
            let m = (fb * a - fa * b) / (fb - fa);
            let fm = at(m);

            let done = if m.abs() > REL_ERROR {
                (fm / m).abs() < REL_ERROR
            } else {
                fm.abs() < REL_ERROR
            };
            if done {
                return Some(m);
            }

            if fa * fm < 0.0 {
                b = m;
                fb = fm;
                if last * fm > 0.0 {
                    fa /= 2.0;
                }
            } else {
                a = m;
                fa = fm;
                if last * fm > 0.0 {
                    fb /= 2.0;
                }
            }
            last = fm;
        }

        None
    }

    /// The point where the field crosses zero on an edge of the probe cube,
    /// if it does.
    fn edge_root(&self, start: Vec3, axis: usize) -> Option<Vec3> {
        let mut d = Vec3::zero();
        d[axis] = 1.0;

        let (fa, fb) = (self.field.eval(start), self.field.eval(start + d * (2.0 * PROBE)));
        if fa * fb > 0.0 {
            return None;
        }

        let t = self.find_root(start, d, 0.0, 2.0 * PROBE).unwrap_or(PROBE);
        Some(start + d * t)
    }
}

impl Primitive for FnXyz {
    fn intersect<'a>(&'a self, ray: &Ray, hits: &mut HitSink<'_, 'a>, _scan: &Scan<'_, 'a>) {
        let (lo, hi) = match intersect_box(ray.origin, ray.dir, self.bmin, self.bmax) {
            Some((lo, hi)) if hi > ray.tmin && lo < ray.tmax => (lo.max(ray.tmin), hi.min(ray.tmax)),
            _ => return,
        };

        // Distance along the ray to cross one cell on each axis
        let mut size = [HUGE; 3];
        for axis in 0..3 {
            if ray.dir[axis].abs() > EPSILON {
                size[axis] = (self.step[axis] / ray.dir[axis]).abs();
            }
        }
        let mut next = [lo + size[0], lo + size[1], lo + size[2]];

        let mut a = lo;
        let mut previous: Option<f64> = None;

        while a < hi {
            let axis = (0..3).fold(0, |best, i| if next[i] < next[best] { i } else { best });
            let b = next[axis].min(hi);
            next[axis] += size[axis];

            if let Some(t) = self.find_root(ray.origin, ray.dir, a, b) {
                // A root on a step boundary shows up in both steps
                if previous.map_or(true, |p| (t - p).abs() > EPSILON) {
                    // Falling across the step means going inside
                    let entering = self.eval(ray.position(a)) > self.eval(ray.position(b));
                    hits.push(t, entering);
                    previous = Some(t);
                    if !hits.all {
                        break;
                    }
                }
            }
            a = b;
        }
    }

    /// Finds two zero crossings on the edges of one face of a small cube
    /// around `p` and takes the normal of the triangle they make with `p`.
    fn normal(&self, p: Vec3, _local: &HitLocal) -> Vec3 {
        for face in 0..6 {
            let (f, s) = (face / 2, if face % 2 == 0 { 1.0 } else { -1.0 });

            let mut points = Vec::with_capacity(2);
            for along in (0..3).filter(|a| *a != f) {
                let across = 3 - f - along;
                for side in [-1.0, 1.0].iter() {
                    let mut start = p;
                    start[f] += s * PROBE;
                    start[across] += side * PROBE;
                    start[along] -= PROBE;

                    if let Some(q) = self.edge_root(start, along) {
                        points.push(q);
                    }
                }
            }

            if points.len() >= 2 {
                let n = (points[0] - p).cross(&(points[1] - p));
                if n.is_zero() {
                    continue;
                }
                let n = n.normalize();
                let rising = self.field.eval(p + n * PROBE) >= self.field.eval(p - n * PROBE);
                return if rising { n } else { -n };
            }
        }

        Vec3::new(0.0, 0.0, 1.0)
    }

    fn is_inside(&self, p: Vec3) -> bool {
        self.field.eval(p) <= 0.0
    }

    fn uv(&self, _p: Vec3, _local: &HitLocal) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn extents(&self) -> (Vec3, Vec3) {
        (self.bmin, self.bmax)
    }
}

/* Tests */

#[cfg(test)]
use crate::stats::Stats;
#[cfg(test)]
use crate::shape::ObjectFlags;

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
#[derive(Debug)]
struct Floor;

#[cfg(test)]
impl FieldFn for Floor {
    fn eval(&self, p: Vec3) -> f64 {
        p.z
    }
}

#[test]
fn polynomial_terms() {
    let f = PolyField::new(vec![
        PolyTerm { coef: 2.0, x: 1, y: 0, z: 0 },
        PolyTerm { coef: -1.0, x: 0, y: 2, z: 1 },
        PolyTerm { coef: 3.0, x: 0, y: 0, z: 0 },
    ]);
    assert_eq!(f.eval(Vec3::new(1.0, 2.0, 3.0)), 2.0 - 12.0 + 3.0);
}

#[test]
fn sphere_field_hits() {
    let s = make_function(Box::new(PolyField::sphere(0.9)), Some((Vec3::splat(2.0), Vec3::splat(-2.0))), None);
    let r = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));

    let hits = hits_of(&s, &r);
    assert_eq!(hits.len(), 2);
    assert!((hits[0].0 - 4.1).abs() < 1e-6 && hits[0].1);
    assert!((hits[1].0 - 5.9).abs() < 1e-6 && !hits[1].1);
}

#[test]
fn first_hit_knows_it_enters() {
    let s = make_function(Box::new(PolyField::sphere(0.5)), None, None);
    let r = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));

    let first = hits_with(&s, &r, false);
    assert_eq!(first.len(), 1);
    assert!((first[0].0 - 4.5).abs() < 1e-6 && first[0].1);

    // From inside the only crossing is an exit
    let r = Ray::new(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0));
    let first = hits_with(&s, &r, false);
    assert!((first[0].0 - 0.5).abs() < 1e-6 && !first[0].1);

    let mut inverse = make_function(Box::new(PolyField::sphere(0.5)), None, None);
    inverse.flags.insert(ObjectFlags::INVERSE);
    assert!(hits_with(&inverse, &r, false)[0].1);
}

#[test]
fn ray_outside_the_box_misses() {
    let s = make_function(Box::new(PolyField::sphere(0.9)), None, None);
    let r = Ray::new(Vec3::new(-5.0, 3.0, 0.0), Vec3::new(1.0, 0.0, 0.0));

    assert!(hits_of(&s, &r).is_empty());
}

#[test]
fn custom_field_and_inside() {
    let f = make_function(Box::new(Floor), None, Some(Vec3::new(4.0, 4.0, 4.0)));
    let r = Ray::new(Vec3::new(0.2, 0.3, 5.0), Vec3::new(0.0, 0.0, -1.0));

    let hits = hits_of(&f, &r);
    assert_eq!(hits.len(), 1);
    assert!((hits[0].0 - 5.0).abs() < 1e-6);
    assert!(hits[0].1);

    assert!(f.is_inside(Vec3::new(0.0, 0.0, -0.5)));
    assert!(!f.is_inside(Vec3::new(0.0, 0.0, 0.5)));
}

#[test]
fn sampled_normal_points_out() {
    let s = make_function(Box::new(PolyField::sphere(0.9)), None, None);

    let n = s.normal(Vec3::new(0.9, 0.0, 0.0), &HitLocal::None);
    assert!(n.x > 0.999);
    assert!(n.y.abs() < 0.02 && n.z.abs() < 0.02);

    let n = s.normal(Vec3::new(0.0, 0.0, -0.9), &HitLocal::None);
    assert!(n.z < -0.999);
}

#[test]
fn clones_share_the_field() {
    let s = make_function(Box::new(PolyField::sphere(0.5)), None, None);
    let c = s.clone_object();

    match (&s.kind, &c.kind) {
        (ObjectKind::Function(a), ObjectKind::Function(b)) => assert!(Rc::ptr_eq(a, b)),
        _ => unreachable!(),
    }
    assert_eq!(c.extents(), (Vec3::splat(-1.0), Vec3::splat(1.0)));
}
