//! Scene objects.
//!
//! An `Object` pairs one primitive kind with the attributes every kind
//! shares: an optional surface, an optional transform and a flag set. The
//! per-kind geometry lives in the submodules; this module holds the
//! dispatch that carries rays and points between world and object space
//! around each kind's own code.

pub mod sphere;
pub mod cube;
pub mod cone;
pub mod disc;
pub mod torus;
pub mod triangle;
pub mod polygon;
pub mod mesh;
pub mod hfield;
pub mod blob;
pub mod fnxyz;
pub mod bbox;
pub mod csg;

use std::fmt;
use std::ops::BitOr;
use std::rc::Rc;

use crate::color::Color;
use crate::consts::{ EPSILON, HUGE };
use crate::draw::{ box_edges, LineSink };
use crate::intersect::{ Hit, HitLocal, HitSink, Scan };
use crate::ray::Ray;
use crate::stats::{ Counter, Stats };
use crate::surface::Surface;
use crate::vector::Vec3;
use crate::xform::{ Action, Xform };

pub use self::sphere::{ Sphere, make_sphere };
pub use self::cube::{ Cube, make_box };
pub use self::cone::{ Cone, make_cone };
pub use self::disc::{ Disc, make_disc };
pub use self::torus::{ Torus, make_torus };
pub use self::triangle::{ Triangle, make_triangle, make_color_triangle };
pub use self::polygon::{ Polygon, make_polygon, make_npolygon };
pub use self::mesh::{ Mesh, MeshBuilder, MeshVertex };
pub use self::hfield::{ HeightField, HeightMap, make_height_field };
pub use self::blob::{ Blob, BlobBuilder };
pub use self::fnxyz::{ FieldFn, FnXyz, PolyField, PolyTerm, make_function };
pub use self::bbox::{ BBox, make_bbox };
pub use self::csg::{ Csg, CsgBuilder, CsgOp, make_csg, post_process };

/// Per-object behavior switches.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct ObjectFlags(u32);

impl ObjectFlags {
    /// Never casts shadows.
    pub const NO_SHADOW: ObjectFlags = ObjectFlags(0x01);

    /// Shadow rays leaving this object never test against it.
    pub const NO_SELF_INTERSECT: ObjectFlags = ObjectFlags(0x02);

    /// Swaps inside and outside.
    pub const INVERSE: ObjectFlags = ObjectFlags(0x04);

    /// Texture coordinates are wanted for this object.
    pub const UV: ObjectFlags = ObjectFlags(0x08);

    /// A group nested only inside other groups.
    pub const GROUP_ONLY: ObjectFlags = ObjectFlags(0x10);

    /// Interpolate vertex normals.
    pub const SMOOTH: ObjectFlags = ObjectFlags(0x20);

    pub const fn empty() -> ObjectFlags {
        ObjectFlags(0)
    }

    pub fn contains(&self, other: ObjectFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: ObjectFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: ObjectFlags) {
        self.0 &= !other.0;
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl BitOr for ObjectFlags {
    type Output = ObjectFlags;

    fn bitor(self, rhs: ObjectFlags) -> ObjectFlags {
        ObjectFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for ObjectFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        const NAMES: [(ObjectFlags, &str); 6] = [
            (ObjectFlags::NO_SHADOW, "NO_SHADOW"),
            (ObjectFlags::NO_SELF_INTERSECT, "NO_SELF_INTERSECT"),
            (ObjectFlags::INVERSE, "INVERSE"),
            (ObjectFlags::UV, "UV"),
            (ObjectFlags::GROUP_ONLY, "GROUP_ONLY"),
            (ObjectFlags::SMOOTH, "SMOOTH"),
        ];

        let set: Vec<&str> = NAMES.iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "ObjectFlags({})", set.join(" | "))
    }
}

/// The geometry of one leaf primitive, in its own object space.
///
/// Implementors never see world space or the object's flags; `Object`
/// converts rays and points on the way in and normals on the way out, and
/// applies `INVERSE`.
pub trait Primitive: fmt::Debug {
    /// Pushes every crossing of `ray` inside `[ray.tmin, ray.tmax]` in
    /// ascending `t`.
    fn intersect<'a>(&'a self, ray: &Ray, hits: &mut HitSink<'_, 'a>, scan: &Scan<'_, 'a>);

    /// Outward normal at a point on the surface. Need not be unit length.
    fn normal(&self, p: Vec3, local: &HitLocal) -> Vec3;

    fn is_inside(&self, p: Vec3) -> bool;

    fn uv(&self, p: Vec3, local: &HitLocal) -> (f64, f64);

    /// Bounding box in object space.
    fn extents(&self) -> (Vec3, Vec3);

    /// Strokes a wireframe, passing every point through `to_world`.
    fn draw(&self, sink: &mut dyn LineSink, to_world: &dyn Fn(Vec3) -> Vec3) {
        let (bmin, bmax) = self.extents();
        box_edges(sink, bmin, bmax, to_world);
    }
}

#[derive(Clone, Debug)]
pub enum ObjectKind {
    /// A sphere with a center and radius.
    Sphere(Sphere),

    /// An axis aligned box between two corners.
    Cube(Cube),

    /// A cone frustum between two points, optionally capped. A cylinder is a
    /// cone with equal radii.
    Cone(Rc<Cone>),

    /// A flat disc, or an annulus when the inner radius is non-zero.
    Disc(Disc),

    /// A torus around the Z axis.
    Torus(Torus),

    /// A single triangle with its transform baked into its vertices. May
    /// carry per-vertex colors.
    Triangle(Triangle),

    /// A planar polygon with its transform baked into its vertices.
    Polygon(Polygon),

    /// An indexed triangle mesh with its own bounding tree.
    Mesh(Rc<Mesh>),

    /// A height map over the unit square.
    HeightField(Rc<HeightField>),

    /// A blobby surface summed from field elements.
    Blob(Rc<Blob>),

    /// The zero set of a function of x, y and z.
    Function(Rc<FnXyz>),

    /// A bounding node over a list of objects. Built by setup.
    BBox(BBox),

    /// A constructive solid geometry combination of child objects.
    Csg(Csg),
}

/// A node of the scene.
///
/// Surfaces and transforms are shared through `Rc`; changing either on one
/// object goes through `Rc::make_mut` and leaves other holders alone.
#[derive(Clone, Debug)]
pub struct Object {
    pub kind: ObjectKind,
    pub surface: Option<Rc<Surface>>,
    pub transform: Option<Rc<Xform>>,
    pub flags: ObjectFlags,

    /// Position in a pre-order walk of the bound scene. Set by
    /// `number_objects`.
    pub id: usize,
}

impl Object {
    pub fn new(kind: ObjectKind) -> Object {
        Object {
            kind,
            surface: None,
            transform: None,
            flags: ObjectFlags::empty(),
            id: 0,
        }
    }

    /// Child objects a ray can report hits from. Gating bounds are left out.
    fn members(&self) -> &[Object] {
        match &self.kind {
            ObjectKind::BBox(bb) => &bb.children,
            ObjectKind::Csg(csg) => &csg.children,
            _ => &[],
        }
    }

    fn members_mut(&mut self) -> &mut [Object] {
        match &mut self.kind {
            ObjectKind::BBox(bb) => &mut bb.children,
            ObjectKind::Csg(csg) => &mut csg.children,
            _ => &mut [],
        }
    }

    /// Same object with `flags` added.
    pub fn with_flags(mut self, flags: ObjectFlags) -> Object {
        self.flags.insert(flags);
        self
    }

    pub fn with_surface(mut self, surface: Rc<Surface>) -> Object {
        self.surface = Some(surface);
        self
    }

    pub fn is_bbox(&self) -> bool {
        matches!(self.kind, ObjectKind::BBox(_))
    }

    pub fn is_csg(&self) -> bool {
        matches!(self.kind, ObjectKind::Csg(_))
    }

    pub fn is_inverse(&self) -> bool {
        self.flags.contains(ObjectFlags::INVERSE)
    }

    /// The leaf geometry, if this is not a composite.
    pub fn primitive(&self) -> Option<&dyn Primitive> {
        match &self.kind {
            ObjectKind::Sphere(s) => Some(s),
            ObjectKind::Cube(c) => Some(c),
            ObjectKind::Cone(c) => Some(&**c),
            ObjectKind::Disc(d) => Some(d),
            ObjectKind::Torus(t) => Some(t),
            ObjectKind::Triangle(t) => Some(t),
            ObjectKind::Polygon(p) => Some(p),
            ObjectKind::Mesh(m) => Some(&**m),
            ObjectKind::HeightField(h) => Some(&**h),
            ObjectKind::Blob(b) => Some(&**b),
            ObjectKind::Function(f) => Some(&**f),
            ObjectKind::BBox(_) | ObjectKind::Csg(_) => None,
        }
    }

    fn counter<'s>(&self, stats: &'s Stats) -> &'s Counter {
        match &self.kind {
            ObjectKind::Sphere(_) => &stats.sphere,
            ObjectKind::Cube(_) => &stats.cube,
            ObjectKind::Cone(_) => &stats.cone,
            ObjectKind::Disc(_) => &stats.disc,
            ObjectKind::Torus(_) => &stats.torus,
            ObjectKind::Triangle(_) => &stats.triangle,
            ObjectKind::Polygon(_) => &stats.polygon,
            ObjectKind::Mesh(_) => &stats.mesh,
            ObjectKind::HeightField(_) => &stats.hfield,
            ObjectKind::Blob(_) => &stats.blob,
            ObjectKind::Function(_) => &stats.fnxyz,
            ObjectKind::BBox(_) => &stats.bbox,
            ObjectKind::Csg(_) => &stats.csg,
        }
    }

    fn to_local(&self, p: Vec3) -> Vec3 {
        match &self.transform {
            Some(t) => t.point_to_object(p),
            None => p,
        }
    }

    fn to_world(&self, p: Vec3) -> Vec3 {
        match &self.transform {
            Some(t) => t.point_to_world(p),
            None => p,
        }
    }

    /// Appends the crossings of a world space ray to `hits`.
    ///
    /// Hits come out in ascending `t`. Unless `scan.all` is set, an object
    /// may stop after its first crossing. Returns the number appended.
    pub fn intersect<'a>(&'a self, ray: &Ray, scan: &Scan<'_, 'a>, hits: &mut Vec<Hit<'a>>) -> usize {
        let local = match &self.transform {
            Some(t) => ray.to_object(t),
            None => *ray,
        };

        let count = match &self.kind {
            ObjectKind::Csg(csg) => csg.intersect(self, &local, scan, hits),
            ObjectKind::BBox(bb) => bb.intersect(&local, scan, hits),
            _ => {
                let mut sink = HitSink::new(self, hits, scan.all);
                if let Some(prim) = self.primitive() {
                    prim.intersect(&local, &mut sink, scan);
                }
                sink.count()
            },
        };

        self.counter(scan.stats).record(count > 0);
        count
    }

    /// Unit normal at world point `p`, facing out of the surface.
    ///
    /// Composites have no surface of their own; ask the hit's leaf.
    pub fn normal(&self, p: Vec3, local: &HitLocal) -> Vec3 {
        let lp = self.to_local(p);
        let smooth = self.flags.contains(ObjectFlags::SMOOTH);

        let n = match &self.kind {
            ObjectKind::Mesh(m) if smooth => m.smooth_normal(local)
                .unwrap_or_else(|| m.normal(lp, local)),
            ObjectKind::HeightField(h) if smooth => h.smooth_normal(lp),
            _ => match self.primitive() {
                Some(prim) => prim.normal(lp, local),
                None => return Vec3::new(0.0, 0.0, 1.0),
            },
        };

        match &self.transform {
            Some(t) => t.norm_to_world(n),
            None => n.normalize(),
        }
    }

    /// Whether world point `p` lies inside the object.
    pub fn is_inside(&self, p: Vec3) -> bool {
        let lp = self.to_local(p);

        let inside = match &self.kind {
            ObjectKind::Csg(csg) => {
                let inside = csg.is_inside(lp);
                if csg.op == CsgOp::Clip {
                    return inside;
                }
                inside
            },
            ObjectKind::BBox(bb) => return bb.is_inside(lp),
            ObjectKind::Cube(c) if self.is_inverse() => return !c.contains(lp, EPSILON),
            _ => self.primitive().map_or(false, |prim| prim.is_inside(lp)),
        };

        inside != self.is_inverse()
    }

    /// Texture coordinates at a point in texture space.
    pub fn uv(&self, p: Vec3, local: &HitLocal) -> (f64, f64) {
        self.primitive().map_or((0.0, 0.0), |prim| prim.uv(p, local))
    }

    /// World space bounding box.
    pub fn extents(&self) -> (Vec3, Vec3) {
        let (bmin, bmax) = match &self.kind {
            ObjectKind::Csg(csg) => csg.extents(),
            ObjectKind::BBox(bb) => (bb.bmin, bb.bmax),
            _ => match self.primitive() {
                Some(prim) => prim.extents(),
                None => (Vec3::splat(-HUGE), Vec3::splat(HUGE)),
            },
        };

        match &self.transform {
            Some(t) => t.bbox_to_world(bmin, bmax),
            None => (bmin, bmax),
        }
    }

    /// Composes a transform step onto the object.
    ///
    /// Triangles and polygons move their vertices instead of carrying a
    /// transform, and bounding nodes pass the step on to their children.
    pub fn transform(&mut self, action: Action, params: Vec3) {
        match &mut self.kind {
            ObjectKind::Triangle(t) => t.transform(action, params),
            ObjectKind::Polygon(p) => p.transform(action, params),
            ObjectKind::BBox(bb) => bb.transform(action, params),
            _ => {
                let t = self.transform.get_or_insert_with(|| Rc::new(Xform::new()));
                Rc::make_mut(t).apply(action, params);
            },
        }
    }

    /// Composes a whole parent transform onto the object.
    pub(crate) fn concat(&mut self, parent: &Xform) {
        match &mut self.kind {
            ObjectKind::Triangle(t) => t.bake(parent),
            ObjectKind::Polygon(p) => p.bake(parent),
            ObjectKind::BBox(bb) => {
                for child in bb.children.iter_mut() {
                    child.concat(parent);
                }
                bb.refit();
            },
            _ => match &mut self.transform {
                Some(t) => Rc::make_mut(t).concat(parent),
                None => self.transform = Some(Rc::new(*parent)),
            },
        }
    }

    /// A copy of the object.
    ///
    /// Bulky data (cone, mesh, height field, blob and function payloads) is
    /// shared with the original, as are the surface and transform. Both stay
    /// independent: any later change to a shared part copies it first.
    pub fn clone_object(&self) -> Object {
        self.clone()
    }

    /// Strokes a wireframe of the object in world space.
    pub fn draw(&self, sink: &mut dyn LineSink) {
        match &self.kind {
            ObjectKind::Csg(csg) => {
                for child in csg.visible() {
                    child.draw(sink);
                }
            },
            ObjectKind::BBox(bb) => {
                for child in bb.children.iter() {
                    child.draw(sink);
                }
            },
            _ => {
                if let Some(prim) = self.primitive() {
                    prim.draw(sink, &|p| self.to_world(p));
                }
            },
        }
    }

    /// The surface to shade a hit on this leaf with, and the transform that
    /// defines its texture space.
    pub fn texture_info(&self) -> (Option<&Rc<Surface>>, Option<&Rc<Xform>>) {
        (self.surface.as_ref(), self.transform.as_ref())
    }

    /// Interpolated vertex color at a hit, for kinds that carry one.
    pub fn vertex_color(&self, p: Vec3, local: &HitLocal) -> Option<Color> {
        match &self.kind {
            ObjectKind::Triangle(t) => t.color_at(p),
            ObjectKind::Mesh(m) => m.color_at(local),
            _ => None,
        }
    }

    /// Approximate bytes held by the object and its children.
    pub fn mem_size(&self) -> usize {
        let own = std::mem::size_of::<Object>();
        own + match &self.kind {
            ObjectKind::Polygon(p) => p.points.len() * std::mem::size_of::<Vec3>(),
            ObjectKind::Mesh(m) => m.mem_size(),
            ObjectKind::HeightField(h) => h.mem_size(),
            ObjectKind::Blob(b) => b.mem_size(),
            ObjectKind::BBox(bb) => bb.children.iter().map(Object::mem_size).sum(),
            ObjectKind::Csg(csg) => csg.children.iter()
                .chain(csg.bounds.iter())
                .map(Object::mem_size)
                .sum(),
            _ => 0,
        }
    }
}

/// Numbers `objects` and their members in pre-order, starting at 1.
///
/// Ids grow along every list, and an object's members take the ids between
/// its own and its next sibling's, which `find_object` relies on.
pub fn number_objects(objects: &mut [Object]) {
    fn walk(objects: &mut [Object], next: &mut usize) {
        for obj in objects.iter_mut() {
            obj.id = *next;
            *next += 1;
            walk(obj.members_mut(), next);
        }
    }

    let mut next = 1;
    walk(objects, &mut next);
}

/// The object numbered `id` by `number_objects`, found by descending
/// through the one member list that can hold it.
pub fn find_object(objects: &[Object], id: usize) -> Option<&Object> {
    let i = objects.partition_point(|o| o.id <= id);
    if i == 0 {
        return None;
    }

    let obj = &objects[i - 1];
    if obj.id == id {
        Some(obj)
    } else {
        find_object(obj.members(), id)
    }
}

/// Pads a box by `EPSILON` on every side.
pub(crate) fn pad(bmin: Vec3, bmax: Vec3) -> (Vec3, Vec3) {
    (bmin - Vec3::splat(EPSILON), bmax + Vec3::splat(EPSILON))
}

/// Axis of the largest component of `n`.
///
/// Ties go to z, then y.
pub(crate) fn dominant_axis(n: Vec3) -> usize {
    let (x, y, z) = (n.x.abs(), n.y.abs(), n.z.abs());
    if x > z && x > y {
        0
    } else if y > z {
        1
    } else {
        2
    }
}

/// The two axes left after dropping `axis`.
pub(crate) fn other_axes(axis: usize) -> (usize, usize) {
    match axis {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    }
}

/* Tests */

#[test]
fn flags_combine() {
    let mut f = ObjectFlags::NO_SHADOW | ObjectFlags::INVERSE;
    assert!(f.contains(ObjectFlags::NO_SHADOW));
    assert!(f.contains(ObjectFlags::INVERSE));
    assert!(!f.contains(ObjectFlags::SMOOTH));

    f.remove(ObjectFlags::INVERSE);
    assert!(!f.contains(ObjectFlags::INVERSE));
    assert_eq!(format!("{:?}", f), "ObjectFlags(NO_SHADOW)");
}

#[test]
fn transformed_sphere_normal() {
    let mut s = make_sphere(Vec3::zero(), 1.0);
    s.transform(Action::Translate, Vec3::new(0.0, 1.0, 0.0));

    let n = s.normal(Vec3::new(0.0, 1.70711, -0.70711), &HitLocal::None);
    assert_eq!(n, Vec3::new(0.0, 0.70711, -0.70711));
}

#[test]
fn transformed_extents() {
    let mut s = make_sphere(Vec3::zero(), 1.0);
    s.transform(Action::Scale, Vec3::new(2.0, 1.0, 1.0));
    s.transform(Action::Translate, Vec3::new(5.0, 0.0, 0.0));

    let (bmin, bmax) = s.extents();
    assert_eq!(bmin, Vec3::new(3.0, -1.0, -1.0));
    assert_eq!(bmax, Vec3::new(7.0, 1.0, 1.0));
}

#[test]
fn inverse_flips_inside() {
    let s = make_sphere(Vec3::zero(), 1.0);
    assert!(s.is_inside(Vec3::zero()));

    let s = s.with_flags(ObjectFlags::INVERSE);
    assert!(!s.is_inside(Vec3::zero()));
    assert!(s.is_inside(Vec3::new(2.0, 0.0, 0.0)));
}

#[test]
fn clone_shares_transform_until_changed() {
    let mut a = make_sphere(Vec3::zero(), 1.0);
    a.transform(Action::Translate, Vec3::new(1.0, 0.0, 0.0));
    let mut b = a.clone_object();

    assert!(Rc::ptr_eq(a.transform.as_ref().unwrap(), b.transform.as_ref().unwrap()));

    b.transform(Action::Translate, Vec3::new(1.0, 0.0, 0.0));
    assert!(!Rc::ptr_eq(a.transform.as_ref().unwrap(), b.transform.as_ref().unwrap()));
    assert_eq!(a.extents().0, Vec3::new(0.0, -1.0, -1.0));
    assert_eq!(b.extents().0, Vec3::new(1.0, -1.0, -1.0));
}

#[test]
fn dominant_axis_ties() {
    assert_eq!(dominant_axis(Vec3::new(2.0, 1.0, 1.0)), 0);
    assert_eq!(dominant_axis(Vec3::new(1.0, -2.0, 1.0)), 1);
    assert_eq!(dominant_axis(Vec3::new(1.0, 1.0, 1.0)), 2);
}

#[test]
fn numbered_objects_are_found_again() {
    let mut group = csg::make_csg(CsgOp::Union);
    group.add_child(make_sphere(Vec3::zero(), 1.0));
    group.add_child(make_sphere(Vec3::new(3.0, 0.0, 0.0), 1.0));

    let mut objects = vec![
        make_sphere(Vec3::new(-3.0, 0.0, 0.0), 1.0),
        group.finish().unwrap(),
        bbox::make_bbox(vec![make_box(Vec3::zero(), Vec3::splat(1.0))]),
    ];
    number_objects(&mut objects);

    let ids: Vec<usize> = objects.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![1, 2, 5]);

    for id in 1..=6 {
        assert_eq!(find_object(&objects, id).map(|o| o.id), Some(id));
    }
    assert!(matches!(find_object(&objects, 3).map(|o| &o.kind), Some(ObjectKind::Sphere(_))));
    assert!(matches!(find_object(&objects, 6).map(|o| &o.kind), Some(ObjectKind::Cube(_))));
    assert!(find_object(&objects, 0).is_none());
    assert!(find_object(&objects, 7).is_none());
}
