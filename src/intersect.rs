//! Hit records and the scene walk that finds them.
//!
//! All hits of one query live in a single `Vec<Hit>` used as a stack. An
//! object appends its hits in ascending `t`; composite objects append their
//! children's hits past a mark, merge them into new hits at the top and then
//! drain the middle. The vector is parked in the renderer between samples, so a
//! query does not allocate once the pool has grown to the scene's depth.

use std::ptr;

use crate::consts::{ EPSILON, HUGE };
use crate::ray::Ray;
use crate::shape::{ Object, ObjectFlags, ObjectKind };
use crate::stats::Stats;
use crate::vector::Vec3;

/// Per-hit data a primitive needs again when the hit is shaded.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum HitLocal {
    None,

    /// Mesh triangle index and barycentric weights of its second and third
    /// vertex.
    Mesh { tri: usize, a: f64, b: f64 },

    /// Height field cell and the object space normal of the triangle hit.
    Cell { x: usize, y: usize, normal: Vec3 },
}

/// A boundary crossing at distance `t` along a ray.
///
/// `object` is the object at the level the hit was reported from (a CSG
/// reports itself), while `leaf` is always the primitive whose surface was
/// crossed. Normals and texture coordinates come from the leaf.
#[derive(Copy, Clone, Debug)]
pub struct Hit<'a> {
    pub t: f64,
    pub entering: bool,
    pub object: &'a Object,
    pub leaf: &'a Object,
    pub local: HitLocal,
}

/// Two hits are equal when they share a distance, a direction and the same
/// leaf object.
impl<'a> PartialEq for Hit<'a> {
    fn eq(&self, other: &Hit<'a>) -> bool {
        self.t == other.t
            && self.entering == other.entering
            && ptr::eq(self.leaf, other.leaf)
    }
}

/// Query parameters that ride along the scene walk.
#[derive(Copy, Clone)]
pub struct Scan<'s, 'a> {
    pub stats: &'s Stats,

    /// Skip objects flagged `NO_SHADOW`.
    pub shadow: bool,

    /// Report every crossing instead of stopping at the first one where a
    /// primitive can tell.
    pub all: bool,

    /// The object a shadow ray leaves from. Skipped when it is flagged
    /// `NO_SELF_INTERSECT`.
    pub base: Option<&'a Object>,
}

impl<'s, 'a> Scan<'s, 'a> {
    pub fn new(stats: &'s Stats) -> Scan<'s, 'a> {
        Scan { stats, shadow: false, all: false, base: None }
    }

    pub fn with_all(&self, all: bool) -> Scan<'s, 'a> {
        Scan { all, ..*self }
    }

    /// Whether a list walk should skip `obj` for this query.
    ///
    /// Only shadow rays skip anything.
    pub fn skips(&self, obj: &Object) -> bool {
        if !self.shadow {
            return false;
        }
        if obj.flags.contains(ObjectFlags::NO_SHADOW) {
            return true;
        }

        match self.base {
            Some(base) => ptr::eq(base, obj)
                && obj.flags.contains(ObjectFlags::NO_SELF_INTERSECT),
            None => false,
        }
    }
}

/// Appends one object's hits to the pool.
///
/// Applies the object's `INVERSE` flag to every `entering` value so the
/// primitives never look at it.
pub struct HitSink<'v, 'a> {
    object: &'a Object,
    hits: &'v mut Vec<Hit<'a>>,
    start: usize,
    pub all: bool,
}

impl<'v, 'a> HitSink<'v, 'a> {
    pub fn new(object: &'a Object, hits: &'v mut Vec<Hit<'a>>, all: bool) -> HitSink<'v, 'a> {
        let start = hits.len();
        HitSink { object, hits, start, all }
    }

    pub fn push(&mut self, t: f64, entering: bool) {
        self.push_local(t, entering, HitLocal::None);
    }

    pub fn push_local(&mut self, t: f64, entering: bool, local: HitLocal) {
        let inverse = self.object.flags.contains(ObjectFlags::INVERSE);
        self.hits.push(Hit {
            t,
            entering: entering != inverse,
            object: self.object,
            leaf: self.object,
            local,
        });
    }

    /// Whether `ray` hits any of `objects`. Leaves no hits behind.
    pub fn probe(&mut self, objects: &'a [Object], ray: &Ray, scan: &Scan<'_, 'a>) -> bool {
        let mark = self.hits.len();
        let scan = scan.with_all(false);

        let mut hit = false;
        for obj in objects.iter() {
            if obj.intersect(ray, &scan, self.hits) > 0 {
                hit = true;
                break;
            }
        }

        self.hits.truncate(mark);
        hit
    }

    /// Number of hits pushed through this sink.
    pub fn count(&self) -> usize {
        self.hits.len() - self.start
    }

    /// Sorts the pushed hits and assigns `entering` by parity.
    ///
    /// The last crossing is always an exit, so with an odd count the ray
    /// starts inside.
    pub fn alternate(&mut self) {
        let inverse = self.object.flags.contains(ObjectFlags::INVERSE);
        let hits = &mut self.hits[self.start..];
        sort_hits(hits);

        let n = hits.len();
        for (i, h) in hits.iter_mut().enumerate() {
            h.entering = ((n - i) % 2 == 0) != inverse;
        }
    }
}

/// Stable insertion sort on `t`.
///
/// Hit lists are short and usually nearly sorted already, and sorting in
/// place keeps the pool free of scratch allocations.
pub fn sort_hits(hits: &mut [Hit]) {
    for i in 1..hits.len() {
        let mut j = i;
        while j > 0 && hits[j - 1].t > hits[j].t {
            hits.swap(j - 1, j);
            j -= 1;
        }
    }
}

/// Slab test against an axis aligned box.
///
/// Returns the entry and exit distances when the ray crosses the box and
/// the box is not entirely behind the origin. A ray parallel to a slab must
/// start between its planes.
pub fn intersect_box(origin: Vec3, dir: Vec3, bmin: Vec3, bmax: Vec3) -> Option<(f64, f64)> {
    let mut t1 = -HUGE;
    let mut t2 = HUGE;

    for axis in 0..3 {
        if dir[axis].abs() > EPSILON {
            let a = (bmin[axis] - origin[axis]) / dir[axis];
            let b = (bmax[axis] - origin[axis]) / dir[axis];
            if a < EPSILON && b < EPSILON {
                return None;
            }
            t1 = t1.max(a.min(b));
            t2 = t2.min(a.max(b));
        } else if origin[axis] < bmin[axis] || origin[axis] > bmax[axis] {
            return None;
        }
    }

    if t1 < t2 { Some((t1, t2)) } else { None }
}

/// Entry distance of a ray into a bounding node, clipped to the ray window.
fn bbox_entry(obj: &Object, ray: &Ray) -> Option<f64> {
    match &obj.kind {
        ObjectKind::BBox(bb) => bb.entry(ray),
        _ => None,
    }
}

/// Finds the nearest hit along `ray` among `objects`.
///
/// Bounding nodes are set aside during the walk and visited afterwards, in
/// list order, only while their entry point is still closer than the best
/// hit so far. The pool is left as it was found.
pub fn find_closest<'a>(
    objects: &'a [Object],
    ray: &Ray,
    scan: &Scan<'_, 'a>,
    hits: &mut Vec<Hit<'a>>
) -> Option<Hit<'a>> {
    let mut closest: Option<Hit<'a>> = None;
    let mut window = *ray;

    closest_in_list(objects, &mut window, scan, hits, &mut closest);
    closest
}

fn closest_in_list<'a>(
    objects: &'a [Object],
    window: &mut Ray,
    scan: &Scan<'_, 'a>,
    hits: &mut Vec<Hit<'a>>,
    closest: &mut Option<Hit<'a>>
) {
    let mark = hits.len();

    for obj in objects.iter().filter(|o| !o.is_bbox() && !scan.skips(o)) {
        if obj.intersect(window, scan, hits) > 0 {
            let first = hits[mark];
            if first.t < window.tmax {
                window.tmax = first.t;
                *closest = Some(first);
            }
        }
        hits.truncate(mark);
    }

    for obj in objects.iter().filter(|o| o.is_bbox() && !scan.skips(o)) {
        let entered = bbox_entry(obj, window);
        scan.stats.bbox.record(entered.is_some());

        if entered.is_some() {
            if let ObjectKind::BBox(bb) = &obj.kind {
                closest_in_list(&bb.children, window, scan, hits, closest);
            }
        }
    }
}

/// Appends every hit along `ray` among `objects` to the pool, sorted.
///
/// Returns the number of hits appended.
pub fn find_all<'a>(
    objects: &'a [Object],
    ray: &Ray,
    scan: &Scan<'_, 'a>,
    hits: &mut Vec<Hit<'a>>
) -> usize {
    let mark = hits.len();
    let scan = scan.with_all(true);

    all_in_list(objects, ray, &scan, hits);
    sort_hits(&mut hits[mark..]);
    hits.len() - mark
}

fn all_in_list<'a>(objects: &'a [Object], ray: &Ray, scan: &Scan<'_, 'a>, hits: &mut Vec<Hit<'a>>) {
    for obj in objects.iter().filter(|o| !scan.skips(o)) {
        match &obj.kind {
            ObjectKind::BBox(bb) => {
                let entered = bbox_entry(obj, ray).is_some();
                scan.stats.bbox.record(entered);
                if entered {
                    all_in_list(&bb.children, ray, scan, hits);
                }
            },
            _ => { obj.intersect(ray, scan, hits); },
        }
    }
}

/* Tests */

#[cfg(test)]
use crate::shape::{ make_sphere, make_box };

#[test]
fn sort_is_stable() {
    let a = make_sphere(Vec3::zero(), 1.0);
    let b = make_sphere(Vec3::zero(), 2.0);
    let hit = |t, o| Hit { t, entering: true, object: o, leaf: o, local: HitLocal::None };

    let mut hits = vec![hit(3.0, &a), hit(1.0, &a), hit(3.0, &b), hit(2.0, &b)];
    sort_hits(&mut hits);

    let ts: Vec<f64> = hits.iter().map(|h| h.t).collect();
    assert_eq!(ts, vec![1.0, 2.0, 3.0, 3.0]);
    assert!(ptr::eq(hits[2].leaf, &a));
    assert!(ptr::eq(hits[3].leaf, &b));
}

#[test]
fn box_slabs() {
    let bmin = Vec3::new(-1.0, -1.0, -1.0);
    let bmax = Vec3::new(1.0, 1.0, 1.0);

    let hit = intersect_box(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0), bmin, bmax);
    assert_eq!(hit, Some((4.0, 6.0)));

    // Parallel to the x slabs but outside them
    let miss = intersect_box(Vec3::new(2.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0), bmin, bmax);
    assert_eq!(miss, None);

    // Entirely behind the origin
    let behind = intersect_box(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, 1.0), bmin, bmax);
    assert_eq!(behind, None);
}

#[test]
fn closest_of_two() {
    let stats = Stats::new();
    let objects = vec![
        make_sphere(Vec3::new(0.0, 0.0, 10.0), 1.0),
        make_sphere(Vec3::new(0.0, 0.0, 4.0), 1.0),
    ];
    let ray = Ray::new(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0));
    let mut pool = Vec::new();

    let hit = find_closest(&objects, &ray, &Scan::new(&stats), &mut pool).unwrap();
    assert!((hit.t - 3.0).abs() < 1e-9);
    assert!(hit.entering);
    assert!(ptr::eq(hit.object, &objects[1]));
    assert!(pool.is_empty());
}

#[test]
fn all_hits_sorted() {
    let stats = Stats::new();
    let objects = vec![
        make_sphere(Vec3::new(0.0, 0.0, 10.0), 1.0),
        make_box(Vec3::new(-1.0, -1.0, 3.0), Vec3::new(1.0, 1.0, 5.0)),
    ];
    let ray = Ray::new(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0));
    let mut pool = Vec::new();

    let n = find_all(&objects, &ray, &Scan::new(&stats), &mut pool);
    assert_eq!(n, 4);
    let ts: Vec<f64> = pool.iter().map(|h| h.t).collect();
    for (t, want) in ts.iter().zip([3.0, 5.0, 9.0, 11.0].iter()) {
        assert!((t - want).abs() < 1e-9);
    }
    assert!(pool[0].entering && !pool[1].entering);
}

#[test]
fn shadow_scan_skips_flagged() {
    let stats = Stats::new();
    let mut blocker = make_sphere(Vec3::new(0.0, 0.0, 4.0), 1.0);
    blocker.flags.insert(ObjectFlags::NO_SHADOW);
    let objects = vec![blocker];
    let ray = Ray::new(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0));
    let mut pool = Vec::new();

    let mut scan = Scan::new(&stats);
    assert!(find_closest(&objects, &ray, &scan, &mut pool).is_some());

    scan.shadow = true;
    assert!(find_closest(&objects, &ray, &scan, &mut pool).is_none());
}
