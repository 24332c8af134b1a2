use std::mem::size_of;
use std::rc::Rc;

use crate::consts::{ EPSILON, HUGE };
use crate::error::{ RayError, Result };
use crate::intersect::{ intersect_box, HitLocal, HitSink, Scan };
use crate::ray::Ray;
use crate::shape::{ pad, Object, ObjectKind, Primitive };
use crate::vector::Vec3;
use crate::xform::{ Action, Xform };

/// A grid of 16 bit height samples, row by row.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightMap {
    width: usize,
    height: usize,
    samples: Vec<u16>,
}

impl HeightMap {
    /// Needs at least two samples in each direction.
    pub fn new(width: usize, height: usize, samples: Vec<u16>) -> Result<HeightMap> {
        if width < 2 || height < 2 || samples.len() != width * height {
            return Err(RayError::BadHeightMap(width, height));
        }

        Ok(HeightMap { width, height, samples })
    }

    /// Builds a map by sampling `f(x, y)` in `[0, 1]` at every grid point.
    pub fn from_fn<F>(width: usize, height: usize, f: F) -> Result<HeightMap>
        where F: Fn(usize, usize) -> f64 {
        let mut samples = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let z = f(x, y).max(0.0).min(1.0);
                samples.push((z * u16::MAX as f64).round() as u16);
            }
        }

        HeightMap::new(width, height, samples)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Height in `[0, 1]` at a grid point, clamped to the edges.
    pub fn at(&self, x: isize, y: isize) -> f64 {
        let x = x.max(0).min(self.width as isize - 1) as usize;
        let y = y.max(0).min(self.height as isize - 1) as usize;
        self.samples[y * self.width + x] as f64 / u16::MAX as f64
    }

    /// The four corner heights of a cell: `(x, y)`, `(x+1, y)`, `(x, y+1)`
    /// and `(x+1, y+1)`.
    fn cell(&self, x: usize, y: usize) -> [f64; 4] {
        let (x, y) = (x as isize, y as isize);
        [self.at(x, y), self.at(x + 1, y), self.at(x, y + 1), self.at(x + 1, y + 1)]
    }
}

// Points closer than this to a cell edge count as on it
const EDGE: f64 = 1.0e-9;

/// State of a walk across the grid cells under a ray.
struct GridWalk {
    cell: [isize; 2],
    step: [isize; 2],

    // Distance along the ray to cross one cell, and to the next crossing
    delta: [f64; 2],
    next: [f64; 2],
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct QuadNode {
    // Cell range [x0, x1) x [y0, y1)
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,

    zmin: f64,
    zmax: f64,

    /// Index of the first child; children are stored together.
    first: usize,
    count: usize,
}

/// A height map surface.
///
/// Internally the field lives on the sample grid: x and y run over
/// `[0, width-1]` and `[0, height-1]` and z over `[0, 1]`. The object's
/// transform maps the grid onto `[-1, 1]` in x and y.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightField {
    map: HeightMap,
    nodes: Vec<QuadNode>,
}

/// Creates a height field object over `[-1, 1] x [-1, 1]`.
pub fn make_height_field(map: HeightMap) -> Object {
    let sx = 2.0 / (map.width - 1) as f64;
    let sy = 2.0 / (map.height - 1) as f64;

    let mut t = Xform::new();
    t.apply(Action::Scale, Vec3::new(sx, sy, 1.0));
    t.apply(Action::Translate, Vec3::new(-1.0, -1.0, 0.0));

    let mut obj = Object::new(ObjectKind::HeightField(Rc::new(HeightField::new(map))));
    obj.transform = Some(Rc::new(t));
    obj
}

impl HeightField {
    pub fn new(map: HeightMap) -> HeightField {
        let mut hf = HeightField { map, nodes: Vec::new() };
        let root = QuadNode {
            x0: 0,
            y0: 0,
            x1: hf.map.width - 1,
            y1: hf.map.height - 1,
            zmin: 0.0,
            zmax: 0.0,
            first: 0,
            count: 0,
        };
        hf.nodes.push(root);
        hf.build(0);
        hf
    }

    pub fn map(&self) -> &HeightMap {
        &self.map
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Splits node `i` into up to four quadrants and fills in its z range.
    fn build(&mut self, i: usize) {
        let n = self.nodes[i];

        if n.x1 - n.x0 == 1 && n.y1 - n.y0 == 1 {
            let z = self.map.cell(n.x0, n.y0);
            let zmin = z.iter().cloned().fold(f64::INFINITY, f64::min);
            let zmax = z.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            self.nodes[i].zmin = zmin;
            self.nodes[i].zmax = zmax;
            return;
        }

        let xm = (n.x0 + n.x1 + 1) / 2;
        let ym = (n.y0 + n.y1 + 1) / 2;
        let xs = if n.x1 - n.x0 > 1 { vec![(n.x0, xm), (xm, n.x1)] } else { vec![(n.x0, n.x1)] };
        let ys = if n.y1 - n.y0 > 1 { vec![(n.y0, ym), (ym, n.y1)] } else { vec![(n.y0, n.y1)] };

        let first = self.nodes.len();
        for (y0, y1) in ys.iter() {
            for (x0, x1) in xs.iter() {
                self.nodes.push(QuadNode {
                    x0: *x0,
                    y0: *y0,
                    x1: *x1,
                    y1: *y1,
                    zmin: 0.0,
                    zmax: 0.0,
                    first: 0,
                    count: 0,
                });
            }
        }
        let count = self.nodes.len() - first;

        let mut zmin = f64::INFINITY;
        let mut zmax = f64::NEG_INFINITY;
        for c in first..first + count {
            self.build(c);
            zmin = zmin.min(self.nodes[c].zmin);
            zmax = zmax.max(self.nodes[c].zmax);
        }

        let node = &mut self.nodes[i];
        node.first = first;
        node.count = count;
        node.zmin = zmin;
        node.zmax = zmax;
    }

    /// Distances over which `ray` is above the footprint of node `i`,
    /// whatever its height.
    fn footprint(&self, i: usize, ray: &Ray) -> Option<(f64, f64)> {
        let n = &self.nodes[i];
        let bmin = Vec3::new(n.x0 as f64, n.y0 as f64, -HUGE) - Vec3::splat(EPSILON);
        let bmax = Vec3::new(n.x1 as f64, n.y1 as f64, HUGE) + Vec3::splat(EPSILON);
        intersect_box(ray.origin, ray.dir, bmin, bmax)
    }

    /// Looks for the largest quad-tree node around cell `(x, y)` that the
    /// ray passes wholly above or below from `t` on, and returns where the
    /// ray leaves its footprint.
    fn skip_to(&self, x: usize, y: usize, ray: &Ray, t: f64) -> Option<f64> {
        let mut i = 0;
        loop {
            let n = &self.nodes[i];
            let (a, b) = self.footprint(i, ray)?;
            let a = a.max(t);
            if b > a {
                let (za, zb) = (ray.origin.z + ray.dir.z * a, ray.origin.z + ray.dir.z * b);
                if za.max(zb) < n.zmin - EPSILON || za.min(zb) > n.zmax + EPSILON {
                    return Some(b);
                }
            }

            if n.count == 0 {
                return None;
            }
            i = (n.first..n.first + n.count).find(|c| {
                let c = &self.nodes[*c];
                x >= c.x0 && x < c.x1 && y >= c.y0 && y < c.y1
            })?;
        }
    }

    /// Starts a grid walk at distance `t`. A point on a cell boundary
    /// belongs to the cell the ray is heading into.
    fn seed(&self, ray: &Ray, t: f64) -> GridWalk {
        let p = ray.position(t);
        let last = [self.map.width as isize - 2, self.map.height as isize - 2];
        let mut walk = GridWalk { cell: [0; 2], step: [0; 2], delta: [HUGE; 2], next: [HUGE; 2] };

        for axis in 0..2 {
            let d = ray.dir[axis];
            let mut c = p[axis].floor();
            if d < -EPSILON && p[axis] - c < EDGE {
                c -= 1.0;
            } else if d > EPSILON && c + 1.0 - p[axis] < EDGE {
                c += 1.0;
            }
            walk.cell[axis] = (c as isize).max(0).min(last[axis]);

            if d > EPSILON {
                walk.step[axis] = 1;
                walk.delta[axis] = 1.0 / d;
                walk.next[axis] = t + ((walk.cell[axis] + 1) as f64 - p[axis]).max(0.0) / d;
            } else if d < -EPSILON {
                walk.step[axis] = -1;
                walk.delta[axis] = -1.0 / d;
                walk.next[axis] = t + (walk.cell[axis] as f64 - p[axis]).min(0.0) / d;
            }
        }

        walk
    }

    /// Walks the cells under the ray in order, testing those whose height
    /// range it can meet.
    fn walk<'a>(&'a self, ray: &Ray, lo: f64, hi: f64, hits: &mut HitSink<'_, 'a>) {
        let last = [self.map.width as isize - 2, self.map.height as isize - 2];
        let mut t = lo;
        let mut walk = self.seed(ray, t);

        while t < hi {
            let [x, y] = walk.cell;
            if x < 0 || y < 0 || x > last[0] || y > last[1] {
                break;
            }
            let (x, y) = (x as usize, y as usize);

            match self.skip_to(x, y, ray, t) {
                Some(exit) if exit > t + EDGE => {
                    t = exit;
                    walk = self.seed(ray, t);
                    continue;
                },
                _ => self.intersect_cell(x, y, ray, hits),
            }

            let axis = if walk.next[0] < walk.next[1] { 0 } else { 1 };
            t = walk.next[axis];
            walk.cell[axis] += walk.step[axis];
            walk.next[axis] += walk.delta[axis];
        }
    }

    /// Tests the two triangles of cell `(x, y)`.
    fn intersect_cell<'a>(&'a self, x: usize, y: usize, ray: &Ray, hits: &mut HitSink<'_, 'a>) {
        let [z1, z2, z3, z4] = self.map.cell(x, y);
        let (fx, fy) = (x as f64, y as f64);

        // Lower left half, anchored at (x, y)
        let n = Vec3::new(z1 - z2, z1 - z3, 1.0).normalize();
        if let Some((t, u, v)) = plane_hit(ray, Vec3::new(fx, fy, z1), n) {
            if u >= 0.0 && v >= 0.0 && u + v <= 1.0 {
                hits.push_local(t, false, HitLocal::Cell { x, y, normal: n });
            }
        }

        // Upper right half, anchored at (x+1, y+1)
        let n = Vec3::new(z3 - z4, z2 - z4, 1.0).normalize();
        if let Some((t, u, v)) = plane_hit(ray, Vec3::new(fx + 1.0, fy + 1.0, z4), n) {
            if u <= 0.0 && v <= 0.0 && u + v >= -1.0 {
                hits.push_local(t, false, HitLocal::Cell { x, y, normal: n });
            }
        }
    }

    /// Clamps a grid point to its cell and the offset within it.
    fn locate(&self, p: Vec3) -> (usize, usize, f64, f64) {
        let x = (p.x.floor().max(0.0) as usize).min(self.map.width - 2);
        let y = (p.y.floor().max(0.0) as usize).min(self.map.height - 2);
        (x, y, p.x - x as f64, p.y - y as f64)
    }

    fn vertex_normal(&self, x: isize, y: isize) -> Vec3 {
        let z = self.map.at(x, y);
        Vec3::new(z - self.map.at(x + 1, y), z - self.map.at(x, y + 1), 1.0).normalize()
    }

    /// Corner normals blended across the triangle containing `p`.
    pub fn smooth_normal(&self, p: Vec3) -> Vec3 {
        let (x, y, u, v) = self.locate(p);
        let (x, y) = (x as isize, y as isize);
        let n1 = self.vertex_normal(x, y);
        let n2 = self.vertex_normal(x + 1, y);
        let n3 = self.vertex_normal(x, y + 1);
        let n4 = self.vertex_normal(x + 1, y + 1);

        if u + v < 1.0 {
            n1 * (1.0 - u - v) + n2 * u + n3 * v
        } else {
            n4 * (u + v - 1.0) + n3 * (1.0 - u) + n2 * (1.0 - v)
        }
    }

    pub fn mem_size(&self) -> usize {
        self.map.samples.len() * size_of::<u16>() + self.nodes.len() * size_of::<QuadNode>()
    }
}

/// Ray against the plane through `anchor` with normal `n`. Returns `t` and
/// the x and y offsets of the hit from the anchor.
fn plane_hit(ray: &Ray, anchor: Vec3, n: Vec3) -> Option<(f64, f64, f64)> {
    let d = n.dot(&ray.dir);
    if d.abs() <= EPSILON {
        return None;
    }

    let o = ray.origin - anchor;
    let t = -n.dot(&o) / d;
    if t <= ray.tmin || t >= ray.tmax {
        return None;
    }

    Some((t, o.x + ray.dir.x * t, o.y + ray.dir.y * t))
}

impl Primitive for HeightField {
    fn intersect<'a>(&'a self, ray: &Ray, hits: &mut HitSink<'_, 'a>, _scan: &Scan<'_, 'a>) {
        let (bmin, bmax) = self.extents();
        let (lo, hi) = match intersect_box(ray.origin, ray.dir, bmin, bmax) {
            Some((lo, hi)) if hi > ray.tmin && lo < ray.tmax => (lo.max(ray.tmin), hi.min(ray.tmax)),
            _ => return,
        };

        self.walk(ray, lo, hi, hits);
        hits.alternate();
    }

    /// The plane normal of the triangle recorded in `local`.
    fn normal(&self, p: Vec3, local: &HitLocal) -> Vec3 {
        match local {
            HitLocal::Cell { normal, .. } => *normal,
            _ => self.smooth_normal(p),
        }
    }

    /// Below the surface and inside the field's box.
    fn is_inside(&self, p: Vec3) -> bool {
        let (w, h) = ((self.map.width - 1) as f64, (self.map.height - 1) as f64);
        if p.x < 0.0 || p.x > w || p.y < 0.0 || p.y > h || p.z < -EPSILON || p.z > 1.0 + EPSILON {
            return false;
        }

        let (x, y, u, v) = self.locate(p);
        let [z1, z2, z3, z4] = self.map.cell(x, y);

        let surface = if u + v < 1.0 {
            z1 * (1.0 - u - v) + z2 * u + z3 * v
        } else {
            z4 * (u + v - 1.0) + z3 * (1.0 - u) + z2 * (1.0 - v)
        };

        p.z <= surface
    }

    fn uv(&self, p: Vec3, _local: &HitLocal) -> (f64, f64) {
        (p.x / self.map.width as f64, p.y / self.map.height as f64)
    }

    fn extents(&self) -> (Vec3, Vec3) {
        let w = (self.map.width - 1) as f64;
        let h = (self.map.height - 1) as f64;
        pad(Vec3::new(0.0, 0.0, -EPSILON), Vec3::new(w, h, 1.0 + EPSILON))
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
fn map_size_is_checked() {
    assert!(matches!(HeightMap::new(1, 4, vec![0; 4]), Err(RayError::BadHeightMap(1, 4))));
    assert!(HeightMap::new(3, 3, vec![0; 8]).is_err());
    assert!(HeightMap::new(2, 2, vec![0; 4]).is_ok());
}

#[test]
fn flat_field_hit_from_above() {
    let map = HeightMap::from_fn(3, 3, |_, _| 0.5).unwrap();
    let hf = make_height_field(map);

    let r = Ray::new(Vec3::new(0.3, 0.2, 5.0), Vec3::new(0.0, 0.0, -1.0));
    let hits = hits_of(&hf, &r);
    assert_eq!(hits.len(), 1);
    assert!((hits[0].0 - 4.5).abs() < 1e-4);

    let n = hf.normal(r.position(hits[0].0), &HitLocal::Cell { x: 1, y: 1, normal: Vec3::new(0.0, 0.0, 1.0) });
    assert_eq!(n, Vec3::new(0.0, 0.0, 1.0));
}

#[test]
fn ray_under_the_surface_misses() {
    let map = HeightMap::from_fn(5, 5, |_, _| 0.5).unwrap();
    let hf = make_height_field(map);

    let r = Ray::new(Vec3::new(-5.0, 0.1, 0.25), Vec3::new(1.0, 0.0, 0.0));
    assert!(hits_of(&hf, &r).is_empty());
}

#[test]
fn ray_across_a_ridge() {
    // Rises to 1 along the middle column and falls off to 0 at the sides
    let map = HeightMap::from_fn(5, 5, |x, _| 1.0 - (x as f64 - 2.0).abs() / 2.0).unwrap();
    let hf = make_height_field(map);

    let r = Ray::new(Vec3::new(-5.0, 0.1, 0.75), Vec3::new(1.0, 0.0, 0.0));
    let hits = hits_of(&hf, &r);
    assert_eq!(hits.len(), 2);
    assert!((hits[0].0 - 4.75).abs() < 1e-4);
    assert!((hits[1].0 - 5.25).abs() < 1e-4);
    assert!(hits[0].1 && !hits[1].1);
}

#[test]
fn grid_walk_finds_what_every_cell_finds() {
    let map = HeightMap::from_fn(17, 17, |x, y| 0.5 + 0.4 * (x as f64 * 0.9).sin() * (y as f64 * 0.7).cos())
        .unwrap();
    let obj = Object::new(ObjectKind::HeightField(Rc::new(HeightField::new(map))));
    let hf = match &obj.kind {
        ObjectKind::HeightField(h) => h,
        _ => unreachable!(),
    };

    let rays = [
        Ray::new(Vec3::new(-1.0, 0.37, 0.9), Vec3::new(1.0, 0.71, -0.043)),
        Ray::new(Vec3::new(17.5, 15.2, 0.95), Vec3::new(-0.83, -0.61, -0.031)),
        Ray::new(Vec3::new(3.3, -2.0, 0.6), Vec3::new(0.07, 1.0, 0.0)),
    ];

    let mut seen = 0;
    for ray in rays.iter() {
        let walked: Vec<f64> = hits_of(&obj, ray).iter().map(|h| h.0).collect();

        let mut pool = Vec::new();
        let mut sink = HitSink::new(&obj, &mut pool, true);
        for y in 0..16 {
            for x in 0..16 {
                hf.intersect_cell(x, y, ray, &mut sink);
            }
        }
        let mut every: Vec<f64> = pool.iter().map(|h| h.t).collect();
        every.sort_by(|a, b| a.partial_cmp(b).unwrap());

        assert_eq!(walked.len(), every.len());
        assert!(walked.iter().zip(every.iter()).all(|(a, b)| (a - b).abs() < 1e-9));
        seen += walked.len();
    }
    assert!(seen > 0);
}

#[test]
fn quad_tree_covers_all_cells() {
    let map = HeightMap::from_fn(9, 9, |x, y| (x + y) as f64 / 16.0).unwrap();
    let hf = HeightField::new(map);

    // 64 cells, 16 + 4 + 1 inner nodes
    assert_eq!(hf.num_nodes(), 85);
    assert_eq!(hf.nodes[0].zmin, 0.0);
    assert_eq!(hf.nodes[0].zmax, 1.0);
}

#[test]
fn inside_is_below_the_surface() {
    let map = HeightMap::from_fn(3, 3, |_, _| 0.5).unwrap();
    let hf = make_height_field(map);

    assert!(hf.is_inside(Vec3::new(0.0, 0.0, 0.25)));
    assert!(!hf.is_inside(Vec3::new(0.0, 0.0, 0.75)));
    assert!(!hf.is_inside(Vec3::new(2.0, 0.0, 0.25)));
}

#[test]
fn smooth_normal_on_a_slope() {
    let map = HeightMap::from_fn(4, 4, |x, _| x as f64 / 3.0).unwrap();
    let hf = HeightField::new(map);

    let n = hf.smooth_normal(Vec3::new(0.5, 0.5, 0.0)).normalize();
    assert_eq!(n, Vec3::new(-1.0 / 3.0, 0.0, 1.0).normalize());
}
