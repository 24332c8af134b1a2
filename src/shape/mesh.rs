use std::mem::size_of;
use std::ops::Range;
use std::rc::Rc;

use crate::color::Color;
use crate::consts::{ EPSILON, HUGE, MAX_CLUSTER_SIZE };
use crate::draw::{ polyline, LineSink };
use crate::error::{ RayError, Result };
use crate::intersect::{ intersect_box, HitLocal, HitSink, Scan };
use crate::ray::Ray;
use crate::shape::triangle::hit_triangle;
use crate::shape::{ dominant_axis, Object, ObjectKind, Primitive };
use crate::vector::Vec3;

/// One mesh vertex as handed to the builder.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MeshVertex {
    pub point: Vec3,
    pub normal: Option<Vec3>,
    pub color: Option<Color>,
    pub uv: Option<(f64, f64)>,
}

impl MeshVertex {
    pub fn new(point: Vec3) -> MeshVertex {
        MeshVertex { point, normal: None, color: None, uv: None }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct Vertex {
    point: Vec3,
    normal: Vec3,
    color: Option<Color>,
    uv: (f64, f64),
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct Face {
    v: [usize; 3],
    normal: Vec3,
    axis: usize,
}

#[derive(Clone, Debug, PartialEq)]
enum NodeContent {
    /// Range of `Mesh::order` holding this leaf's faces.
    Leaf(Range<usize>),

    /// Indices of the two child nodes.
    Split(usize, usize),
}

#[derive(Clone, Debug, PartialEq)]
struct Node {
    bmin: Vec3,
    bmax: Vec3,
    content: NodeContent,
}

/// Collects vertices and index triangles for a mesh.
#[derive(Clone, Debug, Default)]
pub struct MeshBuilder {
    vertices: Vec<MeshVertex>,
    triangles: Vec<[usize; 3]>,
}

impl MeshBuilder {
    pub fn new() -> MeshBuilder {
        Default::default()
    }

    /// Adds a vertex and returns its index.
    pub fn add_vertex(&mut self, v: MeshVertex) -> usize {
        self.vertices.push(v);
        self.vertices.len() - 1
    }

    pub fn add_triangle(&mut self, a: usize, b: usize, c: usize) -> Result<()> {
        let n = self.vertices.len();
        if let Some(bad) = [a, b, c].iter().find(|i| **i >= n) {
            return Err(RayError::BadMeshIndex(*bad, n));
        }

        self.triangles.push([a, b, c]);
        Ok(())
    }

    /// Computes face normals, fills in missing vertex normals and builds the
    /// bounding tree.
    pub fn finish(self) -> Result<Object> {
        if self.triangles.is_empty() {
            return Err(RayError::EmptyMesh);
        }

        let faces: Vec<Face> = self.triangles.iter()
            .map(|v| {
                let p = |i: usize| self.vertices[v[i]].point;
                let normal = (p(1) - p(0)).cross(&(p(2) - p(0))).normalize();
                Face { v: *v, normal, axis: dominant_axis(normal) }
            })
            .collect();

        // A vertex without a usable normal takes the normal of the first
        // face that uses it
        let mut normals: Vec<Option<Vec3>> = self.vertices.iter()
            .map(|v| v.normal.filter(|n| n.magnitude_squared() >= EPSILON))
            .collect();
        for face in faces.iter() {
            for i in face.v.iter() {
                normals[*i].get_or_insert(face.normal);
            }
        }

        let fallback = faces[0].normal;
        let vertices = self.vertices.iter().zip(normals.iter())
            .map(|(v, n)| Vertex {
                point: v.point,
                normal: n.map_or(fallback, |n| n.normalize()),
                color: v.color,
                uv: v.uv.unwrap_or((0.0, 0.0)),
            })
            .collect();

        let mut mesh = Mesh { vertices, faces, order: Vec::new(), nodes: Vec::new() };
        let all: Vec<usize> = (0..mesh.faces.len()).collect();
        mesh.build(all);

        Ok(Object::new(ObjectKind::Mesh(Rc::new(mesh))))
    }
}

/// An indexed triangle mesh with its own bounding tree.
///
/// Mesh data is immutable once built and shared between clones.
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    faces: Vec<Face>,
    order: Vec<usize>,

    /// Tree nodes, root first.
    nodes: Vec<Node>,
}

impl Mesh {
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn centroid(&self, face: usize) -> Vec3 {
        let v = self.faces[face].v;
        (self.vertices[v[0]].point + self.vertices[v[1]].point + self.vertices[v[2]].point) / 3.0
    }

    /// Builds the subtree over `faces` and returns its node index.
    fn build(&mut self, faces: Vec<usize>) -> usize {
        let mut bmin = Vec3::splat(HUGE);
        let mut bmax = Vec3::splat(-HUGE);
        let mut cmin = Vec3::splat(HUGE);
        let mut cmax = Vec3::splat(-HUGE);
        let mut mean = Vec3::zero();

        for f in faces.iter() {
            for i in self.faces[*f].v.iter() {
                let p = self.vertices[*i].point;
                bmin = bmin.min(&p);
                bmax = bmax.max(&p);
            }
            let c = self.centroid(*f);
            cmin = cmin.min(&c);
            cmax = cmax.max(&c);
            mean += c;
        }
        let mean = mean / faces.len() as f64;
        let bmin = bmin - Vec3::splat(EPSILON);
        let bmax = bmax + Vec3::splat(EPSILON);

        let index = self.nodes.len();
        self.nodes.push(Node { bmin, bmax, content: NodeContent::Leaf(0..0) });

        let axis = dominant_axis(cmax - cmin);
        let (lo, hi): (Vec<usize>, Vec<usize>) = faces.iter().copied()
            .partition(|f| self.centroid(*f)[axis] < mean[axis]);

        self.nodes[index].content = if faces.len() <= MAX_CLUSTER_SIZE || lo.is_empty() || hi.is_empty() {
            let start = self.order.len();
            self.order.extend(faces.iter());
            NodeContent::Leaf(start..self.order.len())
        } else {
            let left = self.build(lo);
            let right = self.build(hi);
            NodeContent::Split(left, right)
        };

        index
    }

    fn face_points(&self, face: &Face) -> [Vec3; 3] {
        [
            self.vertices[face.v[0]].point,
            self.vertices[face.v[1]].point,
            self.vertices[face.v[2]].point,
        ]
    }

    fn walk<'a>(&'a self, node: usize, ray: &Ray, hits: &mut HitSink<'_, 'a>) {
        let n = &self.nodes[node];
        match intersect_box(ray.origin, ray.dir, n.bmin, n.bmax) {
            Some((t1, t2)) if t2 > ray.tmin && t1 < ray.tmax => {},
            _ => return,
        }

        match &n.content {
            NodeContent::Split(left, right) => {
                self.walk(*left, ray, hits);
                self.walk(*right, ray, hits);
            },
            NodeContent::Leaf(range) => {
                for f in self.order[range.clone()].iter() {
                    let face = &self.faces[*f];
                    let pts = self.face_points(face);
                    if let Some((t, a, b)) = hit_triangle(ray, pts, face.normal, face.axis) {
                        hits.push_local(t, false, HitLocal::Mesh { tri: *f, a, b });
                    }
                }
            },
        }
    }

    /// Vertex normals blended at the hit recorded in `local`.
    pub fn smooth_normal(&self, local: &HitLocal) -> Option<Vec3> {
        match local {
            HitLocal::Mesh { tri, a, b } => {
                let v = self.faces.get(*tri)?.v;
                let n = |i: usize| self.vertices[v[i]].normal;
                Some(n(0) * (1.0 - a - b) + n(1) * *a + n(2) * *b)
            },
            _ => None,
        }
    }

    /// Vertex colors blended at a hit, when all three vertices have one.
    pub fn color_at(&self, local: &HitLocal) -> Option<Color> {
        match local {
            HitLocal::Mesh { tri, a, b } => {
                let v = self.faces.get(*tri)?.v;
                let c = |i: usize| self.vertices[v[i]].color;
                Some(c(0)? * (1.0 - a - b) + c(1)? * *a + c(2)? * *b)
            },
            _ => None,
        }
    }

    pub fn mem_size(&self) -> usize {
        self.vertices.len() * size_of::<Vertex>()
            + self.faces.len() * size_of::<Face>()
            + self.order.len() * size_of::<usize>()
            + self.nodes.len() * size_of::<Node>()
    }
}

impl Primitive for Mesh {
    fn intersect<'a>(&'a self, ray: &Ray, hits: &mut HitSink<'_, 'a>, _scan: &Scan<'_, 'a>) {
        if self.nodes.is_empty() {
            return;
        }

        self.walk(0, ray, hits);
        hits.alternate();
    }

    /// The face normal of the triangle recorded in `local`.
    fn normal(&self, _p: Vec3, local: &HitLocal) -> Vec3 {
        match local {
            HitLocal::Mesh { tri, .. } => self.faces.get(*tri)
                .map_or(Vec3::new(0.0, 0.0, 1.0), |f| f.normal),
            _ => Vec3::new(0.0, 0.0, 1.0),
        }
    }

    /// A mesh is only known to be closed through hit parity, so every point
    /// counts as inside.
    fn is_inside(&self, _p: Vec3) -> bool {
        true
    }

    fn uv(&self, _p: Vec3, local: &HitLocal) -> (f64, f64) {
        match local {
            HitLocal::Mesh { tri, a, b } => match self.faces.get(*tri) {
                Some(face) => {
                    let uv = |i: usize| self.vertices[face.v[i]].uv;
                    let c = 1.0 - a - b;
                    (
                        uv(0).0 * c + uv(1).0 * a + uv(2).0 * b,
                        uv(0).1 * c + uv(1).1 * a + uv(2).1 * b,
                    )
                },
                None => (0.0, 0.0),
            },
            _ => (0.0, 0.0),
        }
    }

    fn extents(&self) -> (Vec3, Vec3) {
        self.nodes.first().map_or((Vec3::zero(), Vec3::zero()), |root| (root.bmin, root.bmax))
    }

    fn draw(&self, sink: &mut dyn LineSink, to_world: &dyn Fn(Vec3) -> Vec3) {
        for face in self.faces.iter() {
            let points: Vec<Vec3> = self.face_points(face).iter().map(|p| to_world(*p)).collect();
            polyline(sink, &points, true);
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
fn cube_mesh() -> Object {
    let mut b = MeshBuilder::new();
    for i in 0..8 {
        let c = |bit: usize| if i & bit != 0 { 1.0 } else { -1.0 };
        b.add_vertex(MeshVertex::new(Vec3::new(c(1), c(2), c(4))));
    }

    let quads = [[0, 1, 3, 2], [4, 6, 7, 5], [0, 4, 5, 1], [2, 3, 7, 6], [0, 2, 6, 4], [1, 5, 7, 3]];
    for q in quads.iter() {
        b.add_triangle(q[0], q[1], q[2]).unwrap();
        b.add_triangle(q[0], q[2], q[3]).unwrap();
    }
    b.finish().unwrap()
}

#[cfg(test)]
fn mesh_of(obj: &Object) -> &Mesh {
    match &obj.kind {
        ObjectKind::Mesh(m) => m,
        _ => unreachable!(),
    }
}

#[test]
fn builder_rejects_bad_input() {
    assert!(matches!(MeshBuilder::new().finish(), Err(RayError::EmptyMesh)));

    let mut b = MeshBuilder::new();
    b.add_vertex(MeshVertex::new(Vec3::zero()));
    assert!(matches!(b.add_triangle(0, 1, 0), Err(RayError::BadMeshIndex(1, 1))));
}

#[test]
fn closed_mesh_alternates() {
    let cube = cube_mesh();
    let r = Ray::new(Vec3::new(0.1, 0.2, -5.0), Vec3::new(0.0, 0.0, 1.0));

    assert_eq!(hits_of(&cube, &r), vec![(4.0, true), (6.0, false)]);

    let inside = Ray::new(Vec3::new(0.1, 0.2, 0.0), Vec3::new(0.0, 0.0, 1.0));
    assert_eq!(hits_of(&cube, &inside), vec![(1.0, false)]);
}

#[test]
fn large_grid_splits_into_nodes() {
    let mut b = MeshBuilder::new();
    let n = 10;
    for y in 0..=n {
        for x in 0..=n {
            b.add_vertex(MeshVertex::new(Vec3::new(x as f64, y as f64, 0.0)));
        }
    }
    for y in 0..n {
        for x in 0..n {
            let i = y * (n + 1) + x;
            b.add_triangle(i, i + 1, i + n + 2).unwrap();
            b.add_triangle(i, i + n + 2, i + n + 1).unwrap();
        }
    }
    let grid = b.finish().unwrap();
    let mesh = mesh_of(&grid);

    assert_eq!(mesh.num_faces(), 200);
    assert!(mesh.num_nodes() > 1);

    let r = Ray::new(Vec3::new(7.3, 2.6, 5.0), Vec3::new(0.0, 0.0, -1.0));
    let hits = hits_of(&grid, &r);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, 5.0);
}

#[test]
fn smooth_normal_and_uv_use_the_hit() {
    let mut b = MeshBuilder::new();
    let mut v = |p: Vec3, n: Vec3, uv: (f64, f64)| {
        b.add_vertex(MeshVertex { point: p, normal: Some(n), color: None, uv: Some(uv) })
    };
    let a = v(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0), (0.0, 0.0));
    let c = v(Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 1.0), (1.0, 0.0));
    let d = v(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 1.0), (0.0, 1.0));
    b.add_triangle(a, c, d).unwrap();
    let obj = b.finish().unwrap();
    let mesh = mesh_of(&obj);

    let local = HitLocal::Mesh { tri: 0, a: 1.0, b: 0.0 };
    let n = mesh.smooth_normal(&local).unwrap();
    assert_eq!(n.normalize(), Vec3::new(1.0, 0.0, 1.0).normalize());

    let local = HitLocal::Mesh { tri: 0, a: 0.25, b: 0.5 };
    assert_eq!(mesh.uv(Vec3::zero(), &local), (0.25, 0.5));
    assert_eq!(mesh.normal(Vec3::zero(), &local), Vec3::new(0.0, 0.0, 1.0));
    assert_eq!(mesh.color_at(&local), None);
}

#[test]
fn clones_share_mesh_data() {
    let cube = cube_mesh();
    let copy = cube.clone_object();

    match (&cube.kind, &copy.kind) {
        (ObjectKind::Mesh(a), ObjectKind::Mesh(b)) => assert!(Rc::ptr_eq(a, b)),
        _ => unreachable!(),
    }
}
