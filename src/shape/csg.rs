use std::mem;
use std::ptr;

use serde::{ Deserialize, Serialize };

use crate::bound::Bounding;
use crate::consts::HUGE;
use crate::error::{ RayError, Result };
use crate::intersect::{ find_all, find_closest, Hit, HitSink, Scan };
use crate::ray::Ray;
use crate::shape::{ Object, ObjectFlags, ObjectKind };
use crate::stats::Stats;
use crate::vector::Vec3;

/// How a CSG node combines its children.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsgOp {
    Union,

    /// The first child minus all the others.
    Difference,

    Intersection,

    /// The first child, kept only where it lies inside one of the others.
    Clip,

    /// The children side by side with no set algebra.
    Group,
}

/// A combination of child objects.
#[derive(Clone, Debug)]
pub struct Csg {
    pub op: CsgOp,
    pub children: Vec<Object>,

    /// Optional bounding objects. When there are some and the ray misses
    /// all of them, the node is missed.
    pub bounds: Vec<Object>,
}

/// Collects the children of a CSG node.
#[derive(Debug)]
pub struct CsgBuilder {
    csg: Csg,
}

pub fn make_csg(op: CsgOp) -> CsgBuilder {
    CsgBuilder::new(op)
}

impl CsgBuilder {
    pub fn new(op: CsgOp) -> CsgBuilder {
        CsgBuilder { csg: Csg { op, children: Vec::new(), bounds: Vec::new() } }
    }

    pub fn add_child(&mut self, child: Object) -> &mut Self {
        self.csg.children.push(child);
        self
    }

    pub fn add_bound(&mut self, bound: Object) -> &mut Self {
        self.csg.bounds.push(bound);
        self
    }

    /// A clip needs a clipped object and at least one clip object; every
    /// other kind needs one child.
    pub fn finish(self) -> Result<Object> {
        let needed = if self.csg.op == CsgOp::Clip { 2 } else { 1 };
        if self.csg.children.len() < needed {
            return Err(RayError::EmptyCsg);
        }
        Ok(Object::new(ObjectKind::Csg(self.csg)))
    }
}

impl Csg {
    /// Appends the node's hits along a ray in the node's space.
    ///
    /// The children's hits go on the pool first. Those that survive the
    /// combination are pushed again as hits on `obj`, and the children's
    /// run is drained.
    pub fn intersect<'a>(
        &'a self,
        obj: &'a Object,
        ray: &Ray,
        scan: &Scan<'_, 'a>,
        hits: &mut Vec<Hit<'a>>
    ) -> usize {
        if !self.bounds.is_empty() && !HitSink::new(obj, hits, false).probe(&self.bounds, ray, scan) {
            return 0;
        }

        if self.op == CsgOp::Group && !scan.all {
            return match find_closest(&self.children, ray, scan, hits) {
                Some(h) => {
                    hits.push(Hit { object: obj, ..h });
                    1
                },
                None => 0,
            };
        }

        let mark = hits.len();
        let n = match self.op {
            CsgOp::Clip => find_all(&self.children[..1], ray, scan, hits),
            CsgOp::Group => find_all(&self.children, ray, scan, hits),

            // Operands are classified from the ray start, so their hits
            // are gathered past the end of the window too
            _ => find_all(&self.children, &ray.with_range(ray.tmin, HUGE), scan, hits),
        };
        if n == 0 {
            return 0;
        }

        let mut entering = self.initial_entering(&hits[mark..mark + n], ray, obj.is_inverse());

        for i in mark..mark + n {
            let h = hits[i];
            if h.t > ray.tmax {
                break;
            }

            let q = ray.position(h.t);
            let keep = match self.op {
                CsgOp::Union => !self.children.iter()
                    .any(|c| !ptr::eq(c, h.object) && c.is_inside(q)),
                CsgOp::Difference => {
                    let first = &self.children[0];
                    if ptr::eq(first, h.object) {
                        !self.children[1..].iter().any(|c| c.is_inside(q))
                    } else {
                        first.is_inside(q) && !self.children[1..].iter()
                            .any(|c| !ptr::eq(c, h.object) && c.is_inside(q))
                    }
                },
                CsgOp::Intersection => self.children.iter()
                    .all(|c| ptr::eq(c, h.object) || c.is_inside(q)),
                CsgOp::Clip => self.children[1..].iter().any(|c| c.is_inside(q)),
                CsgOp::Group => true,
            };
            if !keep {
                continue;
            }

            let e = match self.op {
                CsgOp::Clip | CsgOp::Group => h.entering,
                _ => {
                    let e = entering;
                    entering = !entering;
                    e
                },
            };

            hits.push(Hit { t: h.t, entering: e, object: obj, leaf: h.leaf, local: h.local });
            if !scan.all {
                break;
            }
        }

        hits.drain(mark..mark + n);
        hits.len() - mark
    }

    /// Whether the first surviving hit enters the combined solid.
    ///
    /// An operand holds the ray start when its first crossing is an exit,
    /// or, when it is not crossed at all, when it contains the start point.
    fn initial_entering(&self, hits: &[Hit], ray: &Ray, inverse: bool) -> bool {
        let start = ray.position(ray.tmin);
        let holds = |c: &Object| match hits.iter().find(|h| ptr::eq(h.object, c)) {
            Some(h) => !h.entering,
            None => c.is_inside(start),
        };

        let inside = match self.op {
            CsgOp::Union => self.children.iter().any(holds),
            CsgOp::Intersection => self.children.iter().all(holds),
            CsgOp::Difference => holds(&self.children[0])
                && !self.children[1..].iter().any(holds),
            CsgOp::Clip | CsgOp::Group => false,
        };

        !inside != inverse
    }

    /// Point containment in the node's space.
    pub fn is_inside(&self, p: Vec3) -> bool {
        match self.op {
            CsgOp::Union | CsgOp::Group => self.children.iter().any(|c| c.is_inside(p)),
            CsgOp::Difference => self.children[0].is_inside(p)
                && !self.children[1..].iter().any(|c| c.is_inside(p)),
            CsgOp::Intersection => self.children.iter().all(|c| c.is_inside(p)),
            CsgOp::Clip => self.children[0].is_inside(p),
        }
    }

    /// Union of the children's boxes.
    pub fn extents(&self) -> (Vec3, Vec3) {
        let mut bmin = Vec3::splat(HUGE);
        let mut bmax = Vec3::splat(-HUGE);

        for child in self.children.iter() {
            let (lo, hi) = child.extents();
            bmin = bmin.min(&lo);
            bmax = bmax.max(&hi);
        }

        (bmin, bmax)
    }

    /// The children that make up the visible shape. Clip objects only cut.
    pub fn visible(&self) -> &[Object] {
        match self.op {
            CsgOp::Clip => &self.children[..1],
            _ => &self.children,
        }
    }
}

/// Readies an object tree for tracing.
///
/// Every CSG node pushes its transform down into its children and bound
/// objects, lends its surface to children without one and gets bounding
/// trees over the lists that allow them. Union, difference and
/// intersection operands stay as they are since hits are matched against
/// them.
pub fn post_process(obj: &mut Object, bounding: &Bounding, stats: &Stats) {
    process(obj, 0, bounding, stats);
}

fn process(obj: &mut Object, non_group: usize, bounding: &Bounding, stats: &Stats) {
    match &mut obj.kind {
        ObjectKind::Csg(csg) => {
            let non_group = non_group + (csg.op != CsgOp::Group) as usize;
            if non_group == 0 {
                obj.flags.insert(ObjectFlags::GROUP_ONLY);
            }

            let transform = obj.transform.take();
            for child in csg.children.iter_mut().chain(csg.bounds.iter_mut()) {
                if let Some(t) = &transform {
                    child.concat(t);
                }
                process(child, non_group, bounding, stats);
            }
            for child in csg.children.iter_mut() {
                if child.surface.is_none() {
                    child.surface = obj.surface.clone();
                }
            }

            match csg.op {
                CsgOp::Group => {
                    let children = mem::take(&mut csg.children);
                    csg.children = bounding.build(children, stats);
                },
                CsgOp::Clip => {
                    let clips = csg.children.split_off(1);
                    let clips = bounding.build(clips, stats);
                    csg.children.extend(clips);
                },
                _ => (),
            }
        },
        ObjectKind::BBox(bb) => {
            for child in bb.children.iter_mut() {
                process(child, non_group, bounding, stats);
            }
            bb.refit();
        },
        _ => (),
    }
}

/* Tests */

#[cfg(test)]
use std::rc::Rc;
#[cfg(test)]
use crate::shape::{ make_box, make_sphere };
#[cfg(test)]
use crate::surface::Surface;
#[cfg(test)]
use crate::xform::Action;

#[cfg(test)]
fn csg_of(op: CsgOp, children: Vec<Object>) -> Object {
    let mut b = make_csg(op);
    for c in children {
        b.add_child(c);
    }
    b.finish().unwrap()
}

#[cfg(test)]
fn hits_of(obj: &Object, ray: &Ray, all: bool) -> Vec<(f64, bool)> {
    let stats = Stats::new();
    let scan = Scan::new(&stats).with_all(all);
    let mut pool = Vec::new();
    obj.intersect(ray, &scan, &mut pool);
    pool.iter().map(|h| (h.t, h.entering)).collect()
}

#[cfg(test)]
fn along_x() -> Ray {
    Ray::new(Vec3::new(-10.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0))
}

#[cfg(test)]
fn close(hits: &[(f64, bool)], want: &[(f64, bool)]) -> bool {
    hits.len() == want.len()
        && hits.iter().zip(want.iter()).all(|(h, w)| (h.0 - w.0).abs() < 1e-9 && h.1 == w.1)
}

#[test]
fn empty_nodes_are_errors() {
    assert!(matches!(make_csg(CsgOp::Union).finish(), Err(RayError::EmptyCsg)));

    let mut clip = make_csg(CsgOp::Clip);
    clip.add_child(make_sphere(Vec3::zero(), 1.0));
    assert!(matches!(clip.finish(), Err(RayError::EmptyCsg)));
}

#[test]
fn union_of_disjoint_spheres() {
    let u = csg_of(CsgOp::Union, vec![
        make_sphere(Vec3::new(-3.0, 0.0, 0.0), 1.0),
        make_sphere(Vec3::new(3.0, 0.0, 0.0), 1.0),
    ]);

    let hits = hits_of(&u, &along_x(), true);
    assert!(close(&hits, &[(6.0, true), (8.0, false), (12.0, true), (14.0, false)]));

    let first = hits_of(&u, &along_x(), false);
    assert!(close(&first, &[(6.0, true)]));
}

#[test]
fn union_drops_inner_surfaces() {
    let u = csg_of(CsgOp::Union, vec![
        make_sphere(Vec3::new(-0.5, 0.0, 0.0), 1.0),
        make_sphere(Vec3::new(0.5, 0.0, 0.0), 1.0),
    ]);

    let hits = hits_of(&u, &along_x(), true);
    assert!(close(&hits, &[(8.5, true), (11.5, false)]));
    assert!(u.is_inside(Vec3::new(1.2, 0.0, 0.0)));
}

#[test]
fn intersection_needs_both() {
    let a = make_sphere(Vec3::zero(), 1.0);
    let b = make_sphere(Vec3::new(0.0, 5.0, 0.0), 1.0);
    let i = csg_of(CsgOp::Intersection, vec![a, b]);
    assert!(hits_of(&i, &along_x(), true).is_empty());

    let lens = csg_of(CsgOp::Intersection, vec![
        make_sphere(Vec3::new(-0.5, 0.0, 0.0), 1.0),
        make_sphere(Vec3::new(0.5, 0.0, 0.0), 1.0),
    ]);
    let hits = hits_of(&lens, &along_x(), true);
    assert!(close(&hits, &[(9.5, true), (10.5, false)]));
}

#[test]
fn difference_inside_a_container_is_empty() {
    let d = csg_of(CsgOp::Difference, vec![
        make_sphere(Vec3::zero(), 1.0),
        make_sphere(Vec3::zero(), 3.0),
    ]);
    assert!(hits_of(&d, &along_x(), true).is_empty());
}

#[test]
fn difference_carves_a_hole() {
    let d = csg_of(CsgOp::Difference, vec![
        make_box(Vec3::splat(-2.0), Vec3::splat(2.0)),
        make_sphere(Vec3::zero(), 1.0),
    ]);

    let hits = hits_of(&d, &along_x(), true);
    assert!(close(&hits, &[(8.0, true), (9.0, false), (11.0, true), (12.0, false)]));
    assert!(!d.is_inside(Vec3::zero()));
    assert!(d.is_inside(Vec3::new(1.5, 0.0, 0.0)));
}

#[test]
fn ray_starting_inside_a_union() {
    let u = csg_of(CsgOp::Union, vec![
        make_sphere(Vec3::zero(), 2.0),
        make_sphere(Vec3::new(5.0, 0.0, 0.0), 1.0),
    ]);
    let ray = Ray::new(Vec3::zero(), Vec3::new(1.0, 0.0, 0.0));

    let hits = hits_of(&u, &ray, true);
    assert!(close(&hits, &[(2.0, false), (4.0, true), (6.0, false)]));
}

#[test]
fn ray_starting_inside_a_difference() {
    let d = csg_of(CsgOp::Difference, vec![
        make_box(Vec3::splat(-2.0), Vec3::splat(2.0)),
        make_sphere(Vec3::zero(), 1.0),
    ]);
    let ray = Ray::new(Vec3::new(-1.5, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));

    let hits = hits_of(&d, &ray, true);
    assert!(close(&hits, &[(0.5, false), (2.5, true), (3.5, false)]));
}

#[test]
fn window_end_limits_the_output() {
    let u = csg_of(CsgOp::Union, vec![make_sphere(Vec3::zero(), 1.0)]);
    let ray = along_x().with_range(0.0, 10.0);

    let hits = hits_of(&u, &ray, true);
    assert!(close(&hits, &[(9.0, true)]));
}

#[test]
fn clip_keeps_hits_inside_the_clip_object() {
    let c = csg_of(CsgOp::Clip, vec![
        make_sphere(Vec3::zero(), 2.0),
        make_box(Vec3::new(-3.0, -3.0, -3.0), Vec3::new(0.0, 3.0, 3.0)),
    ]);

    let hits = hits_of(&c, &along_x(), true);
    assert!(close(&hits, &[(8.0, true)]));
    assert!(c.is_inside(Vec3::new(1.0, 0.0, 0.0)));
}

#[test]
fn group_passes_hits_through() {
    let g = csg_of(CsgOp::Group, vec![
        make_sphere(Vec3::new(-3.0, 0.0, 0.0), 1.0),
        make_sphere(Vec3::new(-3.0, 0.0, 0.0), 0.5),
    ]);

    let hits = hits_of(&g, &along_x(), true);
    assert!(close(&hits, &[(6.0, true), (6.5, true), (7.5, false), (8.0, false)]));
}

#[test]
fn missed_bound_object_skips_children() {
    let mut b = make_csg(CsgOp::Union);
    b.add_child(make_sphere(Vec3::zero(), 1.0));
    b.add_bound(make_box(Vec3::new(-1.0, 4.0, -1.0), Vec3::new(1.0, 6.0, 1.0)));
    let u = b.finish().unwrap();

    assert!(hits_of(&u, &along_x(), true).is_empty());
}

#[test]
fn hits_name_the_node_and_the_leaf() {
    let u = csg_of(CsgOp::Union, vec![make_sphere(Vec3::zero(), 1.0)]);
    let stats = Stats::new();
    let mut pool = Vec::new();
    u.intersect(&along_x(), &Scan::new(&stats), &mut pool);

    assert_eq!(pool.len(), 1);
    assert!(ptr::eq(pool[0].object, &u));
    match &u.kind {
        ObjectKind::Csg(csg) => assert!(ptr::eq(pool[0].leaf, &csg.children[0])),
        _ => unreachable!(),
    }
    assert_eq!(stats.csg.hits.get(), 1);
}

#[test]
fn post_process_pushes_down_transform_and_surface() {
    let mut u = csg_of(CsgOp::Union, vec![make_sphere(Vec3::zero(), 1.0)]);
    u.transform(Action::Translate, Vec3::new(0.0, 5.0, 0.0));
    u.surface = Some(Rc::new(Surface::new(1.0)));

    post_process(&mut u, &Bounding::default(), &Stats::new());

    assert!(u.transform.is_none());
    assert!(!u.flags.contains(ObjectFlags::GROUP_ONLY));
    match &u.kind {
        ObjectKind::Csg(csg) => {
            let child = &csg.children[0];
            assert!(Rc::ptr_eq(child.surface.as_ref().unwrap(), u.surface.as_ref().unwrap()));
            assert_eq!(child.extents().0, Vec3::new(-1.0, 4.0, -1.0));
        },
        _ => unreachable!(),
    }
    assert!(u.is_inside(Vec3::new(0.0, 5.0, 0.0)));
}

#[test]
fn nested_groups_are_group_only() {
    let inner = csg_of(CsgOp::Group, vec![make_sphere(Vec3::zero(), 1.0)]);
    let mut outer = csg_of(CsgOp::Group, vec![inner]);
    post_process(&mut outer, &Bounding::default(), &Stats::new());

    assert!(outer.flags.contains(ObjectFlags::GROUP_ONLY));
    match &outer.kind {
        ObjectKind::Csg(csg) => assert!(csg.children[0].flags.contains(ObjectFlags::GROUP_ONLY)),
        _ => unreachable!(),
    }

    let inner = csg_of(CsgOp::Group, vec![make_sphere(Vec3::zero(), 1.0)]);
    let mut outer = csg_of(CsgOp::Union, vec![inner]);
    post_process(&mut outer, &Bounding::default(), &Stats::new());
    match &outer.kind {
        ObjectKind::Csg(csg) => assert!(!csg.children[0].flags.contains(ObjectFlags::GROUP_ONLY)),
        _ => unreachable!(),
    }
}

#[test]
fn large_group_gets_bounded() {
    let spheres = (0..20).map(|i| make_sphere(Vec3::new(3.0 * i as f64, 0.0, 0.0), 1.0)).collect();
    let mut g = csg_of(CsgOp::Group, spheres);
    let stats = Stats::new();
    post_process(&mut g, &Bounding::new(4, 4), &stats);

    match &g.kind {
        ObjectKind::Csg(csg) => assert!(csg.children.iter().any(|c| c.is_bbox())),
        _ => unreachable!(),
    }

    let ray = along_x();
    assert_eq!(hits_of(&g, &ray, true).len(), 40);
    assert!(close(&hits_of(&g, &ray, false), &[(9.0, true)]));
}
