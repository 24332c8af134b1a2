use crate::consts::{ EPSILON, HUGE };
use crate::intersect::{ find_all, find_closest, intersect_box, Hit, Scan };
use crate::ray::Ray;
use crate::shape::{ Object, ObjectKind };
use crate::vector::Vec3;
use crate::xform::Action;

/// An axis aligned box around a list of objects.
///
/// Children are kept in world space; the box never carries a transform of
/// its own and hands transform steps down to its children instead.
#[derive(Clone, Debug)]
pub struct BBox {
    pub bmin: Vec3,
    pub bmax: Vec3,
    pub children: Vec<Object>,
}

/// Wraps `children` in a bounding node fitted to their extents.
pub fn make_bbox(children: Vec<Object>) -> Object {
    Object::new(ObjectKind::BBox(BBox::new(children)))
}

impl BBox {
    pub fn new(children: Vec<Object>) -> BBox {
        let mut bb = BBox { bmin: Vec3::zero(), bmax: Vec3::zero(), children };
        bb.refit();
        bb
    }

    /// Fits the box to the children's current extents.
    pub fn refit(&mut self) {
        let mut bmin = Vec3::splat(HUGE);
        let mut bmax = Vec3::splat(-HUGE);

        for child in self.children.iter() {
            let (lo, hi) = child.extents();
            bmin = bmin.min(&lo);
            bmax = bmax.max(&hi);
        }

        self.bmin = bmin - Vec3::splat(EPSILON);
        self.bmax = bmax + Vec3::splat(EPSILON);
    }

    pub fn transform(&mut self, action: Action, params: Vec3) {
        for child in self.children.iter_mut() {
            child.transform(action, params);
        }
        self.refit();
    }

    /// Distance at which `ray` enters the box, clipped to the ray window.
    pub fn entry(&self, ray: &Ray) -> Option<f64> {
        let (t1, _) = intersect_box(ray.origin, ray.dir, self.bmin, self.bmax)?;
        if t1 >= ray.tmax {
            return None;
        }

        let t1 = if t1 < ray.tmin { ray.tmin + EPSILON } else { t1 };
        if t1 < ray.tmax { Some(t1) } else { None }
    }

    /// Appends the children's hits when the ray enters the box: all of them
    /// for a full scan, otherwise just the nearest.
    pub fn intersect<'a>(&'a self, ray: &Ray, scan: &Scan<'_, 'a>, hits: &mut Vec<Hit<'a>>) -> usize {
        if self.entry(ray).is_none() {
            return 0;
        }

        if scan.all {
            return find_all(&self.children, ray, scan, hits);
        }

        match find_closest(&self.children, ray, scan, hits) {
            Some(hit) => {
                hits.push(hit);
                1
            },
            None => 0,
        }
    }

    /// Inside the box and inside at least one child.
    pub fn is_inside(&self, p: Vec3) -> bool {
        for axis in 0..3 {
            if p[axis] < self.bmin[axis] || p[axis] > self.bmax[axis] {
                return false;
            }
        }

        self.children.iter().any(|c| c.is_inside(p))
    }
}

/* Tests */

#[cfg(test)]
use crate::shape::make_sphere;
#[cfg(test)]
use crate::stats::Stats;

#[test]
fn box_fits_children() {
    let bb = BBox::new(vec![
        make_sphere(Vec3::new(-2.0, 0.0, 0.0), 1.0),
        make_sphere(Vec3::new(3.0, 1.0, 0.0), 0.5),
    ]);

    assert_eq!(bb.bmin, Vec3::new(-3.0, -1.0, -1.0));
    assert_eq!(bb.bmax, Vec3::new(3.5, 1.5, 1.0));
}

#[test]
fn nearest_and_all_children() {
    let stats = Stats::new();
    let node = make_bbox(vec![
        make_sphere(Vec3::new(0.0, 0.0, 10.0), 1.0),
        make_sphere(Vec3::new(0.0, 0.0, 4.0), 1.0),
    ]);
    let ray = Ray::new(Vec3::zero(), Vec3::new(0.0, 0.0, 1.0));

    let mut pool = Vec::new();
    assert_eq!(node.intersect(&ray, &Scan::new(&stats), &mut pool), 1);
    assert!((pool[0].t - 3.0).abs() < 1e-9);

    pool.clear();
    assert_eq!(node.intersect(&ray, &Scan::new(&stats).with_all(true), &mut pool), 4);
    assert!((pool[3].t - 11.0).abs() < 1e-9);
}

#[test]
fn missing_the_box_skips_children() {
    let stats = Stats::new();
    let node = make_bbox(vec![make_sphere(Vec3::new(0.0, 0.0, 4.0), 1.0)]);
    let ray = Ray::new(Vec3::new(5.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0));

    let mut pool = Vec::new();
    assert_eq!(node.intersect(&ray, &Scan::new(&stats), &mut pool), 0);
    assert_eq!(stats.sphere.tests.get(), 0);
}

#[test]
fn transform_moves_children() {
    let mut node = make_bbox(vec![make_sphere(Vec3::zero(), 1.0)]);
    node.transform(Action::Translate, Vec3::new(0.0, 5.0, 0.0));

    assert!(node.transform.is_none());
    assert!(node.is_inside(Vec3::new(0.0, 5.0, 0.0)));
    assert!(!node.is_inside(Vec3::zero()));
    assert_eq!(node.extents().0, Vec3::new(-1.0, 4.0, -1.0));
}
