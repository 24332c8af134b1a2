use crate::color::Color;
use crate::consts::EPSILON;
use crate::draw::{ polyline, LineSink };
use crate::intersect::{ HitLocal, HitSink, Scan };
use crate::ray::Ray;
use crate::shape::{ dominant_axis, other_axes, pad, Object, ObjectFlags, ObjectKind, Primitive };
use crate::vector::Vec3;
use crate::xform::{ xform_normal, xform_vector, Action, Xform };

const DEFAULT_UV: [(f64, f64); 3] = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)];

/// A single triangle.
///
/// The transform is baked into the vertices, so a triangle never carries an
/// `Xform` of its own.
#[derive(Clone, Debug, PartialEq)]
pub struct Triangle {
    pub points: [Vec3; 3],

    /// Unit vertex normals, all on the side of the plane normal.
    pub normals: [Vec3; 3],

    pub uv: [(f64, f64); 3],

    /// Per-vertex colors of a color triangle.
    pub colors: Option<[Color; 3]>,

    plane: Vec3,
    axis: usize,
}

impl Triangle {
    pub fn new(points: [Vec3; 3], normals: Option<[Vec3; 3]>, uv: Option<[(f64, f64); 3]>) -> Triangle {
        let mut tri = Triangle {
            points,
            normals: normals.unwrap_or([Vec3::zero(); 3]),
            uv: uv.unwrap_or(DEFAULT_UV),
            colors: None,
            plane: Vec3::zero(),
            axis: 2,
        };
        tri.setup();
        tri
    }

    /// Recomputes the plane and repairs the vertex normals after the
    /// vertices changed.
    fn setup(&mut self) {
        let [p1, p2, p3] = self.points;
        let plane = (p3 - p1).cross(&(p2 - p1)).normalize();

        for n in self.normals.iter_mut() {
            let flipped = if n.dot(&plane) < 0.0 { -*n } else { *n };
            *n = if flipped.magnitude() > EPSILON { flipped.normalize() } else { plane };
        }

        self.plane = plane;
        self.axis = dominant_axis(plane);
    }

    /// The plane normal.
    pub fn plane_normal(&self) -> Vec3 {
        self.plane
    }

    /// Applies one transform step to the vertices and their normals.
    pub fn transform(&mut self, action: Action, params: Vec3) {
        for p in self.points.iter_mut() {
            *p = xform_vector(*p, params, action);
        }
        for n in self.normals.iter_mut() {
            *n = xform_normal(*n, params, action);
        }
        self.setup();
    }

    /// Moves the vertices into the space `t` maps to.
    pub fn bake(&mut self, t: &Xform) {
        for p in self.points.iter_mut() {
            *p = t.point_to_world(*p);
        }
        for n in self.normals.iter_mut() {
            *n = t.norm_to_world(*n);
        }
        self.setup();
    }

    /// Barycentric weights of `p` from the projected areas.
    fn weights(&self, p: Vec3) -> [f64; 3] {
        area_weights(p, &self.points, self.axis)
    }

    /// Interpolated vertex color at `p`, for color triangles.
    pub fn color_at(&self, p: Vec3) -> Option<Color> {
        let colors = self.colors?;
        let [a, b, c] = self.weights(p);
        Some(colors[0] * a + colors[1] * b + colors[2] * c)
    }
}

/// Twice the area of a 2D triangle.
fn area2(x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) -> f64 {
    (x1 * (y2 - y3) + x2 * (y3 - y1) + x3 * (y1 - y2)).abs()
}

/// Barycentric weights of `p` against a triangle, from the areas of its
/// projection along `axis`.
pub(crate) fn area_weights(p: Vec3, pts: &[Vec3; 3], axis: usize) -> [f64; 3] {
    let (a, b) = other_axes(axis);
    let [p1, p2, p3] = pts;

    let area = area2(p1[a], p1[b], p2[a], p2[b], p3[a], p3[b]);
    if area < EPSILON {
        return [1.0, 0.0, 0.0];
    }

    let w1 = area2(p[a], p[b], p2[a], p2[b], p3[a], p3[b]) / area;
    let w2 = area2(p1[a], p1[b], p[a], p[b], p3[a], p3[b]) / area;
    [w1, w2, 1.0 - w1 - w2]
}

/// Ray against the triangle `p1, p2, p3` with the given unit plane normal.
///
/// Returns `t` and the weights of `p2` and `p3` at the hit.
pub(crate) fn hit_triangle(
    ray: &Ray,
    pts: [Vec3; 3],
    plane: Vec3,
    axis: usize
) -> Option<(f64, f64, f64)> {
    let [p1, p2, p3] = pts;

    let denom = plane.dot(&ray.dir);
    if denom.abs() < EPSILON {
        return None;
    }

    let o = ray.origin - p1;
    let t = -plane.dot(&o) / denom;
    if t < ray.tmin || t > ray.tmax {
        return None;
    }

    let (i, j) = other_axes(axis);
    let (u0, v0) = (o[i] + ray.dir[i] * t, o[j] + ray.dir[j] * t);
    let (u1, v1) = (p2[i] - p1[i], p2[j] - p1[j]);
    let (u2, v2) = (p3[i] - p1[i], p3[j] - p1[j]);

    let (a, b) = if u1.abs() < EPSILON {
        let b = u0 / u2;
        (if (0.0..=1.0).contains(&b) { (v0 - b * v2) / v1 } else { -1.0 }, b)
    } else {
        let b = (v0 * u1 - u0 * v1) / (v2 * u1 - u2 * v1);
        (if (0.0..=1.0).contains(&b) { (u0 - b * u2) / u1 } else { -1.0 }, b)
    };

    if a >= 0.0 && b >= 0.0 && a + b <= 1.0 {
        Some((t, a, b))
    } else {
        None
    }
}

/// Creates a triangle. Missing vertex normals take the plane normal and
/// missing texture coordinates default to `(0,0), (1,0), (0,1)`.
pub fn make_triangle(points: [Vec3; 3], normals: Option<[Vec3; 3]>, uv: Option<[(f64, f64); 3]>) -> Object {
    Object::new(ObjectKind::Triangle(Triangle::new(points, normals, uv)))
        .with_flags(ObjectFlags::NO_SELF_INTERSECT)
}

/// Creates a triangle whose vertex colors tint the surface color.
pub fn make_color_triangle(points: [Vec3; 3], normals: Option<[Vec3; 3]>, colors: [Color; 3]) -> Object {
    let mut tri = Triangle::new(points, normals, None);
    tri.colors = Some(colors);

    Object::new(ObjectKind::Triangle(tri)).with_flags(ObjectFlags::NO_SELF_INTERSECT)
}

impl Primitive for Triangle {
    fn intersect<'a>(&'a self, ray: &Ray, hits: &mut HitSink<'_, 'a>, _scan: &Scan<'_, 'a>) {
        if let Some((t, _, _)) = hit_triangle(ray, self.points, self.plane, self.axis) {
            hits.push(t, self.plane.dot(&ray.dir) < 0.0);
        }
    }

    /// Vertex normals blended by the barycentric weights of `p`.
    fn normal(&self, p: Vec3, _local: &HitLocal) -> Vec3 {
        let [a, b, c] = self.weights(p);
        self.normals[0] * a + self.normals[1] * b + self.normals[2] * c
    }

    /// The half space behind the plane.
    fn is_inside(&self, p: Vec3) -> bool {
        (p - self.points[0]).dot(&self.plane) <= 0.0
    }

    fn uv(&self, p: Vec3, _local: &HitLocal) -> (f64, f64) {
        let [a, b, c] = self.weights(p);
        let [w1, w2, w3] = self.uv;
        (w1.0 * a + w2.0 * b + w3.0 * c, w1.1 * a + w2.1 * b + w3.1 * c)
    }

    fn extents(&self) -> (Vec3, Vec3) {
        let [p1, p2, p3] = self.points;
        pad(p1.min(&p2).min(&p3), p1.max(&p2).max(&p3))
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
fn unit_corner() -> [Vec3; 3] {
    [Vec3::zero(), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)]
}

#[test]
fn plane_normal_winding() {
    let tri = Triangle::new(unit_corner(), None, None);
    assert_eq!(tri.plane_normal(), Vec3::new(0.0, 0.0, -1.0));
    assert_eq!(tri.normals[1], Vec3::new(0.0, 0.0, -1.0));
}

#[test]
fn ray_hits_inside_only() {
    let tri = make_triangle(unit_corner(), None, None);

    let up = Ray::new(Vec3::new(0.25, 0.25, -5.0), Vec3::new(0.0, 0.0, 1.0));
    assert_eq!(hits_of(&tri, &up), vec![(5.0, true)]);

    let down = Ray::new(Vec3::new(0.25, 0.25, 5.0), Vec3::new(0.0, 0.0, -1.0));
    assert_eq!(hits_of(&tri, &down), vec![(5.0, false)]);

    let outside = Ray::new(Vec3::new(0.75, 0.75, -5.0), Vec3::new(0.0, 0.0, 1.0));
    assert!(hits_of(&tri, &outside).is_empty());
}

#[test]
fn vertex_normals_face_the_plane() {
    let up = Vec3::new(0.0, 0.0, 1.0);
    let tri = Triangle::new(unit_corner(), Some([up, up * 2.0, Vec3::zero()]), None);

    for n in tri.normals.iter() {
        assert_eq!(*n, Vec3::new(0.0, 0.0, -1.0));
    }
}

#[test]
fn barycentric_uv_and_color() {
    let red = Color::rgb(1.0, 0.0, 0.0);
    let green = Color::rgb(0.0, 1.0, 0.0);
    let blue = Color::rgb(0.0, 0.0, 1.0);
    let obj = make_color_triangle(unit_corner(), None, [red, green, blue]);
    let p = Vec3::new(0.25, 0.25, 0.0);

    assert_eq!(obj.uv(p, &HitLocal::None), (0.25, 0.25));
    assert_eq!(obj.vertex_color(p, &HitLocal::None), Some(Color::rgb(0.5, 0.25, 0.25)));

    let plain = make_triangle(unit_corner(), None, None);
    assert_eq!(plain.vertex_color(p, &HitLocal::None), None);
}

#[test]
fn smooth_normal_blends_vertices() {
    let normals = [
        Vec3::new(0.0, 0.0, -1.0),
        Vec3::new(1.0, 0.0, -1.0),
        Vec3::new(0.0, 0.0, -1.0),
    ];
    let tri = Triangle::new(unit_corner(), Some(normals), None);

    let at_corner = tri.normal(Vec3::new(1.0, 0.0, 0.0), &HitLocal::None).normalize();
    assert_eq!(at_corner, Vec3::new(1.0, 0.0, -1.0).normalize());

    let at_origin = tri.normal(Vec3::zero(), &HitLocal::None).normalize();
    assert_eq!(at_origin, Vec3::new(0.0, 0.0, -1.0));
}

#[test]
fn transform_moves_vertices() {
    let mut tri = make_triangle(unit_corner(), None, None);
    tri.transform(Action::Translate, Vec3::new(0.0, 0.0, 2.0));
    assert!(tri.transform.is_none());

    let up = Ray::new(Vec3::new(0.25, 0.25, -5.0), Vec3::new(0.0, 0.0, 1.0));
    assert_eq!(hits_of(&tri, &up), vec![(7.0, true)]);
}

#[test]
fn triangle_extents_are_padded_evenly() {
    let tri = Triangle::new(unit_corner(), None, None);
    let (bmin, bmax) = tri.extents();

    assert!(bmin.x < 0.0 && bmin.z < 0.0);
    assert!(bmax.x > 1.0 && bmax.z > 0.0);
}
