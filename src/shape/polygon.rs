use std::f64::consts::PI;

use crate::consts::EPSILON;
use crate::draw::{ polyline, LineSink };
use crate::error::{ RayError, Result };
use crate::intersect::{ HitLocal, HitSink, Scan };
use crate::ray::Ray;
use crate::shape::triangle::area_weights;
use crate::shape::{ dominant_axis, other_axes, pad, Object, ObjectFlags, ObjectKind, Primitive };
use crate::vector::Vec3;
use crate::xform::{ xform_vector, Action, Xform };

/// A flat polygon of three or more coplanar points.
///
/// Like triangles, polygons bake transforms into their vertices. The plane
/// comes from the first three points.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    pub points: Vec<Vec3>,
    normal: Vec3,
    axis: usize,
}

impl Polygon {
    /// A polygon with no points yet. Add at least three before `finish`.
    pub fn empty() -> Polygon {
        Polygon { points: Vec::new(), normal: Vec3::new(0.0, 0.0, 1.0), axis: 2 }
    }

    pub fn add_vertex(&mut self, p: Vec3) {
        self.points.push(p);
    }

    /// Computes the plane and wraps the polygon in an object.
    pub fn finish(mut self) -> Result<Object> {
        if self.points.len() < 3 {
            return Err(RayError::TooFewVertices("polygon", self.points.len()));
        }
        self.setup();

        Ok(Object::new(ObjectKind::Polygon(self)).with_flags(ObjectFlags::NO_SELF_INTERSECT))
    }

    fn setup(&mut self) {
        let (p1, p2, p3) = (self.points[0], self.points[1], self.points[2]);
        self.normal = (p2 - p1).cross(&(p3 - p1)).normalize();
        self.axis = dominant_axis(self.normal);
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn transform(&mut self, action: Action, params: Vec3) {
        for p in self.points.iter_mut() {
            *p = xform_vector(*p, params, action);
        }
        self.setup();
    }

    /// Moves the vertices into the space `t` maps to.
    pub fn bake(&mut self, t: &Xform) {
        for p in self.points.iter_mut() {
            *p = t.point_to_world(*p);
        }
        self.setup();
    }

    /// Even-odd test of a point already on the plane, in the dominant
    /// projection.
    fn encloses(&self, p: Vec3) -> bool {
        let (a, b) = other_axes(self.axis);
        let (x, y) = (p[a], p[b]);
        let n = self.points.len();

        let mut inside = false;
        for i in 0..n {
            let (v0, v1) = (self.points[i], self.points[(i + 1) % n]);
            let (x0, y0, x1, y1) = (v0[a], v0[b], v1[a], v1[b]);

            if (y0 < y && y1 < y) || (y0 > y && y1 > y) || (x0 < x && x1 < x) {
                continue;
            }
            if x0 > x && x1 > x {
                inside = !inside;
                continue;
            }

            let f = (y0 - y) / (y0 - y1);
            if x < x0 * (1.0 - f) + x1 * f {
                inside = !inside;
            }
        }

        inside
    }
}

/// Creates a polygon through `points` in order.
pub fn make_polygon(points: &[Vec3]) -> Result<Object> {
    let mut poly = Polygon::empty();
    for p in points.iter() {
        poly.add_vertex(*p);
    }
    poly.finish()
}

/// A regular `n` sided polygon of unit radius in the XY plane, centered at
/// the origin and facing +Z, with its first vertex on +Y.
pub fn make_npolygon(n: usize) -> Result<Object> {
    if n < 3 {
        return Err(RayError::TooFewVertices("polygon", n));
    }

    let step = 2.0 * PI / n as f64;
    let points: Vec<Vec3> = (0..n)
        .map(|i| {
            let theta = i as f64 * step;
            Vec3::new(-theta.sin(), theta.cos(), 0.0)
        })
        .collect();

    make_polygon(&points)
}

impl Primitive for Polygon {
    fn intersect<'a>(&'a self, ray: &Ray, hits: &mut HitSink<'_, 'a>, _scan: &Scan<'_, 'a>) {
        let denom = self.normal.dot(&ray.dir);
        if denom.abs() < EPSILON {
            return;
        }

        let t = -self.normal.dot(&(ray.origin - self.points[0])) / denom;
        if t < ray.tmin || t > ray.tmax {
            return;
        }

        if self.encloses(ray.position(t)) {
            hits.push(t, denom < 0.0);
        }
    }

    fn normal(&self, _p: Vec3, _local: &HitLocal) -> Vec3 {
        self.normal
    }

    fn is_inside(&self, p: Vec3) -> bool {
        (p - self.points[0]).dot(&self.normal) <= 0.0
    }

    /// Coordinates against the triangle of the first three points.
    fn uv(&self, p: Vec3, _local: &HitLocal) -> (f64, f64) {
        let first = [self.points[0], self.points[1], self.points[2]];
        let [w1, _, w3] = area_weights(p, &first, self.axis);
        (1.0 - w1, w3)
    }

    fn extents(&self) -> (Vec3, Vec3) {
        let first = self.points[0];
        let (bmin, bmax) = self.points.iter()
            .fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        pad(bmin, bmax)
    }

    fn draw(&self, sink: &mut dyn LineSink, to_world: &dyn Fn(Vec3) -> Vec3) {
        let points: Vec<Vec3> = self.points.iter().map(|p| to_world(*p)).collect();
        polyline(sink, &points, true);
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
fn down_at(x: f64, y: f64) -> Ray {
    Ray::new(Vec3::new(x, y, 5.0), Vec3::new(0.0, 0.0, -1.0))
}

#[test]
fn too_few_points() {
    let r = make_polygon(&[Vec3::zero(), Vec3::new(1.0, 0.0, 0.0)]);
    assert!(matches!(r, Err(RayError::TooFewVertices(_, 2))));
    assert!(make_npolygon(2).is_err());
}

#[test]
fn square_hits() {
    let sq = make_polygon(&[
        Vec3::new(-1.0, -1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(-1.0, 1.0, 0.0),
    ]).unwrap();

    assert!(sq.flags.contains(ObjectFlags::NO_SELF_INTERSECT));
    assert_eq!(hits_of(&sq, &down_at(0.5, 0.5)), vec![(5.0, true)]);
    assert!(hits_of(&sq, &down_at(1.5, 0.5)).is_empty());
}

#[test]
fn concave_notch_is_outside() {
    // An L shape missing its upper right quarter
    let l = make_polygon(&[
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(2.0, 0.0, 0.0),
        Vec3::new(2.0, 1.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(1.0, 2.0, 0.0),
        Vec3::new(0.0, 2.0, 0.0),
    ]).unwrap();

    assert_eq!(hits_of(&l, &down_at(0.5, 1.5)).len(), 1);
    assert_eq!(hits_of(&l, &down_at(1.5, 0.5)).len(), 1);
    assert!(hits_of(&l, &down_at(1.5, 1.5)).is_empty());
}

#[test]
fn regular_polygon_faces_up() {
    let hex = make_npolygon(6).unwrap();
    let poly = match &hex.kind {
        ObjectKind::Polygon(p) => p,
        _ => unreachable!(),
    };

    assert_eq!(poly.points.len(), 6);
    assert_eq!(poly.points[0], Vec3::new(0.0, 1.0, 0.0));
    assert_eq!(poly.normal(), Vec3::new(0.0, 0.0, 1.0));
    assert_eq!(hits_of(&hex, &down_at(0.0, 0.0)), vec![(5.0, true)]);
}

#[test]
fn polygon_moves_with_transform() {
    let mut tri = make_npolygon(3).unwrap();
    tri.transform(Action::Translate, Vec3::new(0.0, 0.0, 1.0));
    tri.transform(Action::Scale, Vec3::new(2.0, 2.0, 2.0));

    assert!(tri.transform.is_none());
    assert_eq!(hits_of(&tri, &down_at(0.0, 0.0)), vec![(3.0, true)]);
}

#[test]
fn uv_from_first_triangle() {
    let sq = Polygon {
        points: vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ],
        normal: Vec3::new(0.0, 0.0, 1.0),
        axis: 2,
    };

    assert_eq!(sq.uv(Vec3::zero(), &HitLocal::None), (0.0, 0.0));
    assert_eq!(sq.uv(Vec3::new(1.0, 1.0, 0.0), &HitLocal::None), (1.0, 1.0));
}
